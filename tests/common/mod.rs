//! Shared harness for the HTTP-level tests
//!
//! Every test gets its own in-memory database, a stub payment gateway and
//! the receiving end of the notification queue so it can inspect what would
//! have been emailed.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};
use tempfile::TempDir;
use tokio::sync::mpsc::Receiver;
use tower::ServiceExt;
use x67_market::{
    ads::AdStatus,
    config::ServerConfig,
    db,
    mailer::{Envelope, NotificationQueue},
    payments::{OrderRequest, PaymentGateway},
    server, AppContext, MarketResult,
};

pub const ADMIN_EMAIL: &str = "admin@x67.test";

/// Gateway that hands out sequential order codes without any network
pub struct StubGateway {
    next_code: AtomicI64,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(&self, _order: &OrderRequest) -> MarketResult<i64> {
        Ok(self.next_code.fetch_add(1, Ordering::SeqCst))
    }

    fn checkout_url(&self, order_code: i64) -> String {
        format!("https://checkout.test/web/checkout?ref={}", order_code)
    }
}

pub struct TestApp {
    pub ctx: AppContext,
    pub router: Router,
    pub notifications: Receiver<Envelope>,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Build an app after letting the caller adjust the test configuration
    pub async fn with_config(adjust: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = ServerConfig::for_tests(dir.path().to_path_buf());
        config.authentication.admin_emails = vec![ADMIN_EMAIL.to_string()];
        adjust(&mut config);

        let pool = db::create_memory_pool().await.unwrap();
        let (notifier, notifications) = NotificationQueue::bounded(64);
        let gateway = Arc::new(StubGateway {
            next_code: AtomicI64::new(7_001_000_000_000_001),
        });

        let ctx = AppContext::from_parts(config, pool, gateway, notifier).unwrap();
        let router = server::build_router(ctx.clone());

        Self {
            ctx,
            router,
            notifications,
            _dir: dir,
        }
    }

    /// Send a request with an optional bearer token and JSON body
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, path, token, Some(body)).await
    }

    /// Register an account and return its session token and user id
    pub async fn register(&self, email: &str, name: &str) -> (String, String) {
        let response = self
            .post(
                "/api/auth/register",
                None,
                serde_json::json!({
                    "email": email,
                    "password": "parola-sigura",
                    "name": name,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "register failed: {}", response.body);

        (
            response.body["session_token"].as_str().unwrap().to_string(),
            response.body["user_id"].as_str().unwrap().to_string(),
        )
    }

    pub async fn admin(&self) -> String {
        self.register(ADMIN_EMAIL, "Admin").await.0
    }

    /// Create an ad through the API and return its id
    pub async fn create_ad(&self, token: &str, title: &str) -> String {
        let response = self
            .post(
                "/api/ads",
                Some(token),
                serde_json::json!({
                    "title": title,
                    "description": "Stare foarte buna",
                    "category_id": "cars",
                    "city_id": "bucuresti",
                    "price": 1500.0,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "create failed: {}", response.body);
        response.body["ad_id"].as_str().unwrap().to_string()
    }

    /// Create an ad and approve it directly
    pub async fn create_active_ad(&self, token: &str, title: &str) -> String {
        let ad_id = self.create_ad(token, title).await;
        self.ctx
            .ad_manager
            .set_status(&ad_id, AdStatus::Active)
            .await
            .unwrap();
        ad_id
    }

    /// Everything queued for delivery so far
    pub fn drain_notifications(&mut self) -> Vec<Envelope> {
        let mut queued = Vec::new();
        while let Ok(envelope) = self.notifications.try_recv() {
            queued.push(envelope);
        }
        queued
    }
}
