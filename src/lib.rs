//! x67 - classifieds marketplace backend
//!
//! Ads with moderation, paid boosts and promotions through a hosted checkout
//! gateway, favorites, buyer/seller messaging, seller analytics, banners and
//! email notifications, served as a JSON HTTP API.

pub mod account;
pub mod ads;
pub mod analytics;
pub mod api;
pub mod auth;
pub mod banners;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod favorites;
pub mod jobs;
pub mod mailer;
pub mod media_store;
pub mod messaging;
pub mod metrics;
pub mod payments;
pub mod rate_limit;
pub mod server;
pub mod taxonomy;

pub use context::AppContext;
pub use error::{MarketError, MarketResult};
