/// Category, city and brand endpoints
use crate::{
    auth::AdminAuthContext,
    context::AppContext,
    error::MarketResult,
    taxonomy::{
        Brand, Category, CategoryUpdate, City, CityUpdate, ManagedCategory, ManagedCity,
        NewCategory, NewCity,
    },
};
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Build taxonomy routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/categories", get(categories))
        .route("/api/cities", get(cities))
        .route("/api/car-brands", get(car_brands))
        .route("/api/moto-brands", get(moto_brands))
        .route(
            "/api/admin/categories",
            get(list_managed_categories).post(create_category),
        )
        .route(
            "/api/admin/categories/:id",
            put(update_category).delete(delete_category),
        )
        .route("/api/admin/cities", get(list_managed_cities).post(create_city))
        .route("/api/admin/cities/:id", put(update_city).delete(delete_city))
}

async fn categories(State(ctx): State<AppContext>) -> MarketResult<Json<Vec<Category>>> {
    Ok(Json(ctx.taxonomy.categories().await?))
}

async fn cities(State(ctx): State<AppContext>) -> MarketResult<Json<Vec<City>>> {
    Ok(Json(ctx.taxonomy.cities().await?))
}

async fn car_brands(State(ctx): State<AppContext>) -> Json<BTreeMap<String, Brand>> {
    Json(ctx.taxonomy.car_brands().clone())
}

async fn moto_brands(State(ctx): State<AppContext>) -> Json<BTreeMap<String, Brand>> {
    Json(ctx.taxonomy.moto_brands().clone())
}

async fn list_managed_categories(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> MarketResult<Json<Vec<ManagedCategory>>> {
    Ok(Json(ctx.taxonomy.managed().list_categories().await?))
}

async fn create_category(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Json(req): Json<NewCategory>,
) -> MarketResult<Json<Value>> {
    let id = ctx.taxonomy.managed().create_category(req).await?;
    tracing::info!("Admin {} created category {}", admin.user.user_id, id);

    Ok(Json(json!({ "message": "Category created", "id": id })))
}

async fn update_category(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<CategoryUpdate>,
) -> MarketResult<Json<Value>> {
    ctx.taxonomy.managed().update_category(&id, req).await?;
    Ok(Json(json!({ "message": "Category updated" })))
}

async fn delete_category(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(id): Path<String>,
) -> MarketResult<Json<Value>> {
    ctx.taxonomy.managed().delete_category(&id).await?;
    tracing::info!("Admin {} deleted category {}", admin.user.user_id, id);

    Ok(Json(json!({ "message": "Category deleted" })))
}

async fn list_managed_cities(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> MarketResult<Json<Vec<ManagedCity>>> {
    Ok(Json(ctx.taxonomy.managed().list_cities().await?))
}

async fn create_city(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Json(req): Json<NewCity>,
) -> MarketResult<Json<Value>> {
    let id = ctx.taxonomy.managed().create_city(req).await?;
    tracing::info!("Admin {} created city {}", admin.user.user_id, id);

    Ok(Json(json!({ "message": "City created", "id": id })))
}

async fn update_city(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<CityUpdate>,
) -> MarketResult<Json<Value>> {
    ctx.taxonomy.managed().update_city(&id, req).await?;
    Ok(Json(json!({ "message": "City updated" })))
}

async fn delete_city(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(id): Path<String>,
) -> MarketResult<Json<Value>> {
    ctx.taxonomy.managed().delete_city(&id).await?;
    tracing::info!("Admin {} deleted city {}", admin.user.user_id, id);

    Ok(Json(json!({ "message": "City deleted" })))
}
