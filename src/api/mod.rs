/// API routes and handlers
pub mod account;
pub mod admin;
pub mod ads;
pub mod analytics;
pub mod banners;
pub mod favorites;
pub mod health;
pub mod messaging;
pub mod middleware;
pub mod payments;
pub mod taxonomy;
pub mod uploads;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(account::routes())
        .merge(taxonomy::routes())
        .merge(ads::routes())
        .merge(payments::routes())
        .merge(uploads::routes())
        .merge(favorites::routes())
        .merge(messaging::routes())
        .merge(analytics::routes())
        .merge(banners::routes())
        .merge(admin::routes())
}
