/// Ad listing endpoints
use crate::{
    ads::{
        Ad, AdPage, AdStatus, AdView, AutoTopupRequest, AutoTopupResponse, CreateAdRequest,
        CreateAdResponse, ListQuery, PageQuery, TopupResponse, UpdateAdRequest,
    },
    auth::AuthContext,
    context::AppContext,
    error::MarketResult,
    mailer::Notification,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Build ad routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/ads", get(list_ads).post(create_ad))
        .route("/api/ads/promoted", get(promoted_ads))
        .route(
            "/api/ads/:ad_id",
            get(get_ad).put(update_ad).delete(delete_ad),
        )
        .route("/api/ads/:ad_id/topup", post(topup))
        .route("/api/ads/:ad_id/auto-topup", post(auto_topup))
        .route("/api/my-ads", get(my_ads))
}

#[derive(Debug, Deserialize)]
struct PromotedQuery {
    limit: Option<i64>,
}

/// Create an ad in pending state
async fn create_ad(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateAdRequest>,
) -> MarketResult<Json<CreateAdResponse>> {
    let ad = ctx.ad_manager.create(&auth.user, req).await?;

    Ok(Json(CreateAdResponse {
        ad_id: ad.ad_id,
        status: AdStatus::Pending,
        message: "Ad created. It will be visible after approval.".to_string(),
    }))
}

/// Search active ads
async fn list_ads(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> MarketResult<Json<AdPage<AdView>>> {
    let snapshot = ctx.taxonomy.snapshot().await?;
    Ok(Json(ctx.ad_manager.list(&query, &snapshot).await?))
}

async fn promoted_ads(
    State(ctx): State<AppContext>,
    Query(query): Query<PromotedQuery>,
) -> MarketResult<Json<Vec<AdView>>> {
    let snapshot = ctx.taxonomy.snapshot().await?;
    let ads = ctx
        .ad_manager
        .promoted(query.limit.unwrap_or(10), &snapshot)
        .await?;

    Ok(Json(ads))
}

/// Ad detail; every fetch counts as a view
async fn get_ad(
    State(ctx): State<AppContext>,
    Path(ad_id): Path<String>,
) -> MarketResult<Json<AdView>> {
    let outcome = ctx.ad_manager.record_view(&ad_id).await?;
    let owner = ctx.account_manager.find_user(&outcome.ad.user_id).await?;

    if let (Some(milestone), Some(owner)) = (outcome.milestone, owner.as_ref()) {
        ctx.notifier.enqueue(
            owner.email.clone(),
            Notification::ViewsMilestone {
                user_name: owner.name.clone(),
                ad_id: outcome.ad.ad_id.clone(),
                ad_title: outcome.ad.title.clone(),
                milestone,
            },
        );
    }

    let snapshot = ctx.taxonomy.snapshot().await?;
    let (owner_name, owner_picture) = match owner {
        Some(owner) => (Some(owner.name), owner.picture),
        None => (None, None),
    };

    Ok(Json(AdView::detailed(
        outcome.ad,
        &snapshot,
        owner_name,
        owner_picture,
    )))
}

async fn update_ad(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(ad_id): Path<String>,
    Json(req): Json<UpdateAdRequest>,
) -> MarketResult<Json<Value>> {
    ctx.ad_manager.update(&ad_id, &auth.user, req).await?;
    Ok(Json(json!({ "message": "Ad updated" })))
}

async fn delete_ad(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(ad_id): Path<String>,
) -> MarketResult<Json<Value>> {
    ctx.ad_manager.delete(&ad_id, &auth.user).await?;
    Ok(Json(json!({ "message": "Ad deleted" })))
}

/// The caller's own ads, newest first
async fn my_ads(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> MarketResult<Json<AdPage<Ad>>> {
    let page = ctx
        .ad_manager
        .list_for_user(&auth.user.user_id, query.page, query.limit)
        .await?;

    Ok(Json(page))
}

async fn topup(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(ad_id): Path<String>,
) -> MarketResult<Json<TopupResponse>> {
    let cooldown = ctx.ad_manager.topup(&ad_id, &auth.user).await?;

    Ok(Json(TopupResponse {
        message: "TopUp successful".to_string(),
        next_topup_available_in: cooldown,
    }))
}

async fn auto_topup(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(ad_id): Path<String>,
    Json(req): Json<AutoTopupRequest>,
) -> MarketResult<Json<AutoTopupResponse>> {
    let enabled = req.enabled.unwrap_or(true);
    ctx.ad_manager
        .set_auto_topup(&ad_id, &auth.user, enabled)
        .await?;

    let message = if enabled {
        "Auto-topup enabled"
    } else {
        "Auto-topup disabled"
    };

    Ok(Json(AutoTopupResponse {
        message: message.to_string(),
        auto_topup: enabled,
    }))
}
