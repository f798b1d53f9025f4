use crate::metrics;
use std::{sync::Arc, time::Instant};
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::visibility_expiry_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Cleanup expired sessions (runs every hour)
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600)); // Every hour

        loop {
            interval.tick().await;
            info!("Running expired session cleanup");

            let start = Instant::now();
            match tasks::cleanup_expired_sessions(&scheduler.context).await {
                Ok(count) => {
                    metrics::record_background_job(
                        "session_cleanup",
                        "success",
                        start.elapsed().as_secs_f64(),
                    );
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    } else {
                        info!("Session cleanup: no expired sessions found");
                    }
                }
                Err(e) => {
                    metrics::record_background_job(
                        "session_cleanup",
                        "failure",
                        start.elapsed().as_secs_f64(),
                    );
                    error!("Failed to cleanup expired sessions: {}", e);
                }
            }
        }
    }

    /// Drop lapsed boost and promote flags (runs every 5 minutes)
    async fn visibility_expiry_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300)); // Every 5 minutes

        loop {
            interval.tick().await;

            let start = Instant::now();
            match tasks::expire_paid_visibility(&scheduler.context).await {
                Ok((boosts, promotions)) => {
                    metrics::record_background_job(
                        "visibility_expiry",
                        "success",
                        start.elapsed().as_secs_f64(),
                    );
                    if boosts + promotions > 0 {
                        info!(
                            "Expired {} boosts and {} promotions",
                            boosts, promotions
                        );
                    }
                }
                Err(e) => {
                    metrics::record_background_job(
                        "visibility_expiry",
                        "failure",
                        start.elapsed().as_secs_f64(),
                    );
                    error!("Failed to expire paid visibility: {}", e);
                }
            }
        }
    }
}
