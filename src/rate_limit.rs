/// Rate Limiting System
use crate::{
    api::middleware::extract_session_token,
    config::RateLimitConfig,
    context::AppContext,
    error::{MarketError, MarketResult},
};
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Traffic classes with separate quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficClass {
    Anonymous,
    Authenticated,
    Admin,
}

impl TrafficClass {
    /// Classify a request by path and the presence of a session token
    pub fn classify(path: &str, has_session: bool) -> Self {
        if !has_session {
            TrafficClass::Anonymous
        } else if path.starts_with("/api/admin") {
            TrafficClass::Admin
        } else {
            TrafficClass::Authenticated
        }
    }
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    config: RateLimitConfig,
    anonymous: Arc<DirectLimiter>,
    authenticated: Arc<DirectLimiter>,
    admin: Arc<DirectLimiter>,
}

fn quota(rps: u32, burst: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN))
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        // Anonymous traffic gets a fifth of the burst, admins double
        let anonymous = quota(config.anonymous_rps, config.burst_size / 5);
        let authenticated = quota(config.authenticated_rps, config.burst_size);
        let admin = quota(config.admin_rps, config.burst_size.saturating_mul(2));

        Self {
            enabled: config.enabled,
            anonymous: Arc::new(GovernorLimiter::direct(anonymous)),
            authenticated: Arc::new(GovernorLimiter::direct(authenticated)),
            admin: Arc::new(GovernorLimiter::direct(admin)),
            config,
        }
    }

    /// Take one cell from the class's bucket
    pub fn check(&self, class: TrafficClass) -> MarketResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = match class {
            TrafficClass::Anonymous => &self.anonymous,
            TrafficClass::Authenticated => &self.authenticated,
            TrafficClass::Admin => &self.admin,
        };

        limiter.check().map_err(|_| MarketError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }

    /// Configured requests per second for a class
    pub fn limit(&self, class: TrafficClass) -> u32 {
        match class {
            TrafficClass::Anonymous => self.config.anonymous_rps,
            TrafficClass::Authenticated => self.config.authenticated_rps,
            TrafficClass::Admin => self.config.admin_rps,
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, MarketError> {
    let has_session = extract_session_token(request.headers()).is_some();
    let class = TrafficClass::classify(request.uri().path(), has_session);

    if let Err(e) = ctx.rate_limiter.check(class) {
        tracing::warn!("Rate limit exceeded for {:?} traffic on {}", class, request.uri().path());
        return Err(e);
    }

    let mut response = next.run(request).await;
    if ctx.rate_limiter.enabled {
        response.headers_mut().insert(
            "X-RateLimit-Limit",
            HeaderValue::from(ctx.rate_limiter.limit(class)),
        );
    }

    Ok(response)
}
