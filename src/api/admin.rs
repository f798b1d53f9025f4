/// Admin API Endpoints
/// User management, ad moderation and site statistics
use crate::{
    account::UserUpdate,
    ads::{Ad, AdPage, AdStatus, StatusUpdateRequest},
    auth::AdminAuthContext,
    context::AppContext,
    db::{self, account::User},
    error::{MarketError, MarketResult},
    mailer::Notification,
    payments::to_major_units,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/stats", get(get_stats))
        // Users
        .route("/api/admin/users", get(list_users))
        .route(
            "/api/admin/users/:user_id",
            put(update_user).delete(delete_user),
        )
        // Moderation
        .route("/api/admin/ads", get(list_ads))
        .route("/api/admin/ads/:ad_id/status", put(update_ad_status))
}

#[derive(Debug, Deserialize)]
struct UserListQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AdListQuery {
    status: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct UserPage {
    users: Vec<User>,
    total: i64,
    page: i64,
    pages: i64,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    total_users: i64,
    total_ads: i64,
    pending_ads: i64,
    active_ads: i64,
    total_payments: i64,
    /// Major units
    total_revenue: f64,
}

/// Site-wide counters
async fn get_stats(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> MarketResult<Json<StatsResponse>> {
    let (total_payments, revenue) = ctx.payment_manager.completed_totals().await?;

    Ok(Json(StatsResponse {
        total_users: ctx.account_manager.count_users().await?,
        total_ads: ctx.ad_manager.count(None).await?,
        pending_ads: ctx.ad_manager.count(Some(AdStatus::Pending)).await?,
        active_ads: ctx.ad_manager.count(Some(AdStatus::Active)).await?,
        total_payments,
        total_revenue: to_major_units(revenue),
    }))
}

/// List users; password hashes never serialize
async fn list_users(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Query(query): Query<UserListQuery>,
) -> MarketResult<Json<UserPage>> {
    let (page, limit, offset) = db::paginate(query.page, query.limit, 50);
    let (users, total) = ctx.account_manager.list_users(offset, limit).await?;

    Ok(Json(UserPage {
        users,
        total,
        page,
        pages: db::page_count(total, limit),
    }))
}

async fn update_user(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(user_id): Path<String>,
    Json(req): Json<UserUpdate>,
) -> MarketResult<Json<Value>> {
    let user = ctx.account_manager.update_user(&user_id, req).await?;
    tracing::info!("Admin {} updated user {}", admin.user.user_id, user.user_id);

    Ok(Json(json!({ "message": "User updated" })))
}

/// Delete a user with their ads and sessions
async fn delete_user(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(user_id): Path<String>,
) -> MarketResult<Json<Value>> {
    if user_id == admin.user.user_id {
        return Err(MarketError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }

    let (ads, _sessions) = ctx.account_manager.delete_user_cascade(&user_id).await?;
    tracing::info!(
        "Admin {} deleted user {} and {} ads",
        admin.user.user_id,
        user_id,
        ads
    );

    Ok(Json(json!({ "message": "User deleted" })))
}

/// All ads for moderation
async fn list_ads(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Query(query): Query<AdListQuery>,
) -> MarketResult<Json<AdPage<Ad>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(AdStatus::from_str)
        .transpose()?;
    let (page, limit, offset) = db::paginate(query.page, query.limit, 50);
    let (ads, total) = ctx.ad_manager.list_all(status, offset, limit).await?;

    Ok(Json(AdPage {
        ads,
        total,
        page,
        pages: db::page_count(total, limit),
    }))
}

/// Set an ad's moderation status and notify the owner of approvals and rejections
async fn update_ad_status(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(ad_id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> MarketResult<Json<Value>> {
    let status = AdStatus::from_str(&req.status)?;
    let ad = ctx.ad_manager.set_status(&ad_id, status).await?;
    tracing::info!(
        "Admin {} set ad {} to {}",
        admin.user.user_id,
        ad_id,
        status.as_str()
    );

    let owner = ctx
        .account_manager
        .find_user(&ad.user_id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Could not load owner of ad {} for notification: {}", ad_id, e);
            None
        });

    if let Some(owner) = owner {
        let notification = match status {
            AdStatus::Active => Some(Notification::AdApproved {
                user_name: owner.name,
                ad_id: ad.ad_id,
                ad_title: ad.title,
                price: ad.price,
            }),
            AdStatus::Rejected => Some(Notification::AdRejected {
                user_name: owner.name,
                ad_id: ad.ad_id,
                ad_title: ad.title,
            }),
            _ => None,
        };

        if let Some(notification) = notification {
            ctx.notifier.enqueue(owner.email, notification);
        }
    }

    Ok(Json(json!({ "message": format!("Ad status updated to {}", status.as_str()) })))
}
