/// Saved-ad endpoints
use crate::{
    ads::PageQuery,
    auth::AuthContext,
    context::AppContext,
    error::MarketResult,
    favorites::{AddFavoriteResponse, FavoriteCheckResponse, FavoritePage},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

/// Build favorites routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/favorites", get(list_favorites))
        .route(
            "/api/favorites/:ad_id",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/api/favorites/check/:ad_id", get(check_favorite))
}

async fn add_favorite(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(ad_id): Path<String>,
) -> MarketResult<Json<AddFavoriteResponse>> {
    let favorite = ctx.favorite_manager.add(&auth.user.user_id, &ad_id).await?;

    Ok(Json(AddFavoriteResponse {
        message: "Added to favorites".to_string(),
        favorite_id: favorite.favorite_id,
    }))
}

async fn remove_favorite(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(ad_id): Path<String>,
) -> MarketResult<Json<Value>> {
    ctx.favorite_manager
        .remove(&auth.user.user_id, &ad_id)
        .await?;

    Ok(Json(json!({ "message": "Removed from favorites" })))
}

async fn list_favorites(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> MarketResult<Json<FavoritePage>> {
    let page = ctx
        .favorite_manager
        .list(&auth.user.user_id, query.page, query.limit)
        .await?;

    Ok(Json(page))
}

async fn check_favorite(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(ad_id): Path<String>,
) -> MarketResult<Json<FavoriteCheckResponse>> {
    let is_favorite = ctx
        .favorite_manager
        .is_favorite(&auth.user.user_id, &ad_id)
        .await?;

    Ok(Json(FavoriteCheckResponse { is_favorite }))
}
