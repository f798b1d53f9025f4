/// Seller analytics endpoints
use crate::{
    analytics::{Overview, PerformanceReport, ViewsQuery, ViewsReport},
    auth::AuthContext,
    context::AppContext,
    error::MarketResult,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;

/// Build analytics routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/analytics/overview", get(overview))
        .route("/api/analytics/views", get(views))
        .route("/api/analytics/ads-performance", get(ads_performance))
}

async fn overview(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> MarketResult<Json<Overview>> {
    Ok(Json(ctx.analytics_manager.overview(&auth.user.user_id).await?))
}

async fn views(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<ViewsQuery>,
) -> MarketResult<Json<ViewsReport>> {
    let report = ctx
        .analytics_manager
        .views(&auth.user.user_id, query.days.unwrap_or(30), Utc::now())
        .await?;

    Ok(Json(report))
}

async fn ads_performance(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> MarketResult<Json<PerformanceReport>> {
    Ok(Json(
        ctx.analytics_manager
            .ads_performance(&auth.user.user_id)
            .await?,
    ))
}
