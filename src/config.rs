/// Configuration management for the marketplace server
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub notifications: NotificationConfig,
    pub payments: PaymentConfig,
    pub taxonomy: TaxonomyConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Public site used for links inside notifications
    pub site_url: String,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub upload_directory: PathBuf,
    /// Maximum size of a listing image upload, in bytes
    pub image_upload_limit: usize,
    /// Maximum size of a banner video upload, in bytes
    pub video_upload_limit: usize,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub session_lifetime_days: i64,
    /// Whether the session cookie carries the Secure attribute
    pub secure_cookies: bool,
    /// Emails that receive the admin role when they register
    pub admin_emails: Vec<String>,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Notification queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

/// Payment gateway environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    Demo,
    Live,
}

impl GatewayEnvironment {
    pub fn from_str(s: &str) -> MarketResult<Self> {
        match s.to_lowercase().as_str() {
            "demo" => Ok(GatewayEnvironment::Demo),
            "live" => Ok(GatewayEnvironment::Live),
            _ => Err(MarketError::Validation(format!(
                "Invalid payment environment: {}",
                s
            ))),
        }
    }

    pub fn api_base(&self) -> &'static str {
        match self {
            GatewayEnvironment::Demo => "https://demo-api.vivapayments.com",
            GatewayEnvironment::Live => "https://api.vivapayments.com",
        }
    }

    pub fn accounts_base(&self) -> &'static str {
        match self {
            GatewayEnvironment::Demo => "https://demo-accounts.vivapayments.com",
            GatewayEnvironment::Live => "https://accounts.vivapayments.com",
        }
    }

    pub fn checkout_base(&self) -> &'static str {
        match self {
            GatewayEnvironment::Demo => "https://demo.vivapayments.com",
            GatewayEnvironment::Live => "https://www.vivapayments.com",
        }
    }
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub environment: GatewayEnvironment,
    pub client_id: String,
    pub client_secret: String,
    pub source_code: String,
    /// Shared secret for HMAC-signed webhook deliveries
    pub webhook_secret: Option<String>,
    /// Key echoed back when the gateway verifies the webhook URL
    pub webhook_verification_key: Option<String>,
    pub request_timeout_secs: u64,
}

/// Reference data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// Optional JSON file replacing the built-in reference data
    pub reference_path: Option<PathBuf>,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub anonymous_rps: u32,
    pub authenticated_rps: u32,
    pub admin_rps: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MarketResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env_or("X67_HOSTNAME", "0.0.0.0");
        let port = env_or("X67_PORT", "8001")
            .parse()
            .map_err(|_| MarketError::Validation("Invalid port number".to_string()))?;
        let site_url = env_or("X67_SITE_URL", "https://x67digital.com");
        let version = env!("CARGO_PKG_VERSION").to_string();

        let data_directory: PathBuf = env_or("X67_DATA_DIRECTORY", "./data").into();
        let database = env::var("X67_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("market.sqlite"));
        let upload_directory = env::var("X67_UPLOAD_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("uploads"));
        let image_upload_limit = env_parse("X67_IMAGE_UPLOAD_LIMIT", 10 * 1024 * 1024);
        let video_upload_limit = env_parse("X67_VIDEO_UPLOAD_LIMIT", 50 * 1024 * 1024);

        let session_lifetime_days = env_parse("X67_SESSION_LIFETIME_DAYS", 7);
        let secure_cookies = env_parse("X67_SECURE_COOKIES", true);
        let admin_emails = env_or("X67_ADMIN_EMAILS", "")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<String>>();

        let email = if let Ok(smtp_url) = env::var("X67_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("X67_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "noreply@x67digital.com".to_string()),
            })
        } else {
            None
        };

        let notifications = NotificationConfig {
            queue_capacity: env_parse("X67_NOTIFICATION_QUEUE_CAPACITY", 1024),
            max_attempts: env_parse("X67_NOTIFICATION_MAX_ATTEMPTS", 3),
            retry_backoff_ms: env_parse("X67_NOTIFICATION_RETRY_BACKOFF_MS", 500),
        };

        let payments = PaymentConfig {
            environment: GatewayEnvironment::from_str(&env_or("VIVA_ENVIRONMENT", "demo"))?,
            client_id: env_or("VIVA_CLIENT_ID", ""),
            client_secret: env_or("VIVA_CLIENT_SECRET", ""),
            source_code: env_or("VIVA_SOURCE_CODE", "9570"),
            webhook_secret: env::var("VIVA_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            webhook_verification_key: env::var("VIVA_WEBHOOK_VERIFICATION_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            request_timeout_secs: env_parse("VIVA_REQUEST_TIMEOUT_SECS", 15),
        };

        let taxonomy = TaxonomyConfig {
            reference_path: env::var("X67_TAXONOMY_PATH").ok().map(PathBuf::from),
        };

        let rate_limit = RateLimitConfig {
            enabled: env_parse("X67_RATE_LIMITS_ENABLED", true),
            anonymous_rps: env_parse("X67_RATE_LIMIT_ANONYMOUS_RPS", 20),
            authenticated_rps: env_parse("X67_RATE_LIMIT_AUTHENTICATED_RPS", 100),
            admin_rps: env_parse("X67_RATE_LIMIT_ADMIN_RPS", 500),
            burst_size: env_parse("X67_RATE_LIMIT_BURST", 50),
        };

        let logging = LoggingConfig {
            level: env_or("RUST_LOG", "info"),
            json: env_or("X67_LOG_FORMAT", "text") == "json",
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                site_url,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
                upload_directory,
                image_upload_limit,
                video_upload_limit,
            },
            authentication: AuthConfig {
                session_lifetime_days,
                secure_cookies,
                admin_emails,
            },
            email,
            notifications,
            payments,
            taxonomy,
            rate_limit,
            logging,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> MarketResult<()> {
        if self.service.hostname.is_empty() {
            return Err(MarketError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.session_lifetime_days <= 0 {
            return Err(MarketError::Validation(
                "Session lifetime must be at least one day".to_string(),
            ));
        }

        if self.notifications.queue_capacity == 0 {
            return Err(MarketError::Validation(
                "Notification queue capacity must be positive".to_string(),
            ));
        }

        if self.storage.image_upload_limit == 0
            || self.storage.video_upload_limit < self.storage.image_upload_limit
        {
            return Err(MarketError::Validation(
                "Upload limits must be positive and the video limit at least the image limit"
                    .to_string(),
            ));
        }

        if self.payments.environment == GatewayEnvironment::Live
            && (self.payments.client_id.is_empty() || self.payments.client_secret.is_empty())
        {
            return Err(MarketError::Validation(
                "Live payment environment requires client credentials".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration suitable for tests: temporary paths, no SMTP, no rate limits
    pub fn for_tests(data_directory: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                site_url: "https://x67digital.test".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                database: data_directory.join("market.sqlite"),
                upload_directory: data_directory.join("uploads"),
                data_directory,
                image_upload_limit: 10 * 1024 * 1024,
                video_upload_limit: 50 * 1024 * 1024,
            },
            authentication: AuthConfig {
                session_lifetime_days: 7,
                secure_cookies: false,
                admin_emails: vec![],
            },
            email: None,
            notifications: NotificationConfig {
                queue_capacity: 64,
                max_attempts: 3,
                retry_backoff_ms: 1,
            },
            payments: PaymentConfig {
                environment: GatewayEnvironment::Demo,
                client_id: String::new(),
                client_secret: String::new(),
                source_code: "9570".to_string(),
                webhook_secret: None,
                webhook_verification_key: None,
                request_timeout_secs: 5,
            },
            taxonomy: TaxonomyConfig {
                reference_path: None,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                anonymous_rps: 20,
                authenticated_rps: 100,
                admin_rps: 500,
                burst_size: 50,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}
