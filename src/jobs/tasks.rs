/// Background task implementations
use crate::{context::AppContext, error::MarketResult};
use chrono::Utc;

/// Cleanup expired sessions
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> MarketResult<u64> {
    ctx.account_manager.cleanup_expired_sessions().await
}

/// Clear boost and promote flags whose paid window has passed
///
/// Returns (boosts cleared, promotions cleared).
pub async fn expire_paid_visibility(ctx: &AppContext) -> MarketResult<(u64, u64)> {
    ctx.ad_manager.clear_expired_visibility(Utc::now()).await
}
