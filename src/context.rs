/// Application context and dependency injection
use crate::{
    account::AccountManager,
    ads::AdManager,
    analytics::AnalyticsManager,
    banners::BannerManager,
    config::ServerConfig,
    db,
    error::{MarketError, MarketResult},
    favorites::FavoriteManager,
    mailer::{Mailer, NotificationQueue, NotificationWorker, RetryPolicy},
    media_store::MediaStore,
    messaging::MessageManager,
    payments::{PaymentGateway, PaymentManager, VivaGateway},
    rate_limit::RateLimiter,
    taxonomy::{ReferenceData, TaxonomyProvider},
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub ad_manager: Arc<AdManager>,
    pub payment_manager: Arc<PaymentManager>,
    pub favorite_manager: Arc<FavoriteManager>,
    pub message_manager: Arc<MessageManager>,
    pub analytics_manager: Arc<AnalyticsManager>,
    pub banner_manager: Arc<BannerManager>,
    pub taxonomy: TaxonomyProvider,
    pub media_store: MediaStore,
    // Payment gateway
    pub gateway: Arc<dyn PaymentGateway>,
    // Notification producer; the worker owns the receiving end
    pub notifier: NotificationQueue,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> MarketResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        // Initialize database
        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;

        // Run migrations
        db::run_migrations(&db).await?;

        // Test connection
        db::test_connection(&db).await?;

        // Initialize mailer and the notification worker behind it
        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        if !mailer.is_configured() {
            tracing::warn!("SMTP not configured - notifications will be logged and dropped");
        }

        let (notifier, receiver) = NotificationQueue::bounded(config.notifications.queue_capacity);
        let policy = RetryPolicy {
            max_attempts: config.notifications.max_attempts,
            initial_backoff: Duration::from_millis(config.notifications.retry_backoff_ms),
        };
        NotificationWorker::new(receiver, mailer, config.service.site_url.clone(), policy).spawn();

        // Initialize payment gateway
        let gateway: Arc<dyn PaymentGateway> = Arc::new(VivaGateway::new(config.payments.clone())?);
        tracing::info!(
            "Payment gateway configured for {:?} environment",
            config.payments.environment
        );

        let reference = ReferenceData::load(config.taxonomy.reference_path.as_deref()).await?;

        Ok(Self::assemble(config, db, reference, gateway, notifier))
    }

    /// Context over an existing pool with injected gateway and notifier
    ///
    /// Uses the built-in reference data. Intended for tests and tooling.
    pub fn from_parts(
        config: ServerConfig,
        db: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        notifier: NotificationQueue,
    ) -> MarketResult<Self> {
        let reference = ReferenceData::builtin()?;
        Ok(Self::assemble(config, db, reference, gateway, notifier))
    }

    fn assemble(
        config: ServerConfig,
        db: SqlitePool,
        reference: ReferenceData,
        gateway: Arc<dyn PaymentGateway>,
        notifier: NotificationQueue,
    ) -> Self {
        let config = Arc::new(config);

        Self {
            account_manager: Arc::new(AccountManager::new(db.clone(), config.clone())),
            ad_manager: Arc::new(AdManager::new(db.clone())),
            payment_manager: Arc::new(PaymentManager::new(db.clone())),
            favorite_manager: Arc::new(FavoriteManager::new(db.clone())),
            message_manager: Arc::new(MessageManager::new(db.clone())),
            analytics_manager: Arc::new(AnalyticsManager::new(db.clone())),
            banner_manager: Arc::new(BannerManager::new(db.clone())),
            taxonomy: TaxonomyProvider::new(reference, db.clone()),
            media_store: MediaStore::from_config(&config.storage),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            gateway,
            notifier,
            db,
            config,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> MarketResult<()> {
        let dirs = vec![
            &config.storage.data_directory,
            &config.storage.upload_directory,
        ];

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    MarketError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
