/// Banner endpoints
use crate::{
    auth::AdminAuthContext,
    banners::{Banner, BannerQuery, BannerUpdate, CreateBannerResponse, NewBanner, DEFAULT_POSITION},
    context::AppContext,
    error::MarketResult,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

/// Build banner routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/banners", get(active_banners))
        .route("/api/admin/banners", get(list_banners).post(create_banner))
        .route(
            "/api/admin/banners/:banner_id",
            put(update_banner).delete(delete_banner),
        )
}

/// Active banners for a page position
async fn active_banners(
    State(ctx): State<AppContext>,
    Query(query): Query<BannerQuery>,
) -> MarketResult<Json<Vec<Banner>>> {
    let position = query.position.as_deref().unwrap_or(DEFAULT_POSITION);
    Ok(Json(ctx.banner_manager.active(position).await?))
}

async fn list_banners(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> MarketResult<Json<Vec<Banner>>> {
    Ok(Json(ctx.banner_manager.list_all().await?))
}

async fn create_banner(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Json(req): Json<NewBanner>,
) -> MarketResult<Json<CreateBannerResponse>> {
    let banner = ctx.banner_manager.create(req).await?;
    tracing::info!("Admin {} created banner {}", admin.user.user_id, banner.banner_id);

    Ok(Json(CreateBannerResponse {
        banner_id: banner.banner_id,
    }))
}

async fn update_banner(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Path(banner_id): Path<String>,
    Json(req): Json<BannerUpdate>,
) -> MarketResult<Json<Value>> {
    ctx.banner_manager.update(&banner_id, req).await?;
    Ok(Json(json!({ "message": "Banner updated" })))
}

async fn delete_banner(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Path(banner_id): Path<String>,
) -> MarketResult<Json<Value>> {
    ctx.banner_manager.delete(&banner_id).await?;
    Ok(Json(json!({ "message": "Banner deleted" })))
}
