/// Hosted checkout gateway
use super::Correlation;
use crate::{
    config::PaymentConfig,
    error::{MarketError, MarketResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Order details sent to the gateway
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Minor units
    pub amount: i64,
    pub customer_email: String,
    pub customer_name: String,
    pub correlation: Correlation,
}

/// Payment gateway seam; tests substitute a stub
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout order and return its order code
    async fn create_order(&self, order: &OrderRequest) -> MarketResult<i64>;

    /// Checkout page for an order
    fn checkout_url(&self, order_code: i64) -> String;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderCustomer<'a> {
    email: &'a str,
    full_name: &'a str,
    request_lang: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderPayload<'a> {
    amount: i64,
    customer_trns: String,
    customer: OrderCustomer<'a>,
    source_code: &'a str,
    merchant_trns: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_code: i64,
}

/// Viva Wallet smart checkout
pub struct VivaGateway {
    http_client: reqwest::Client,
    config: PaymentConfig,
}

impl VivaGateway {
    pub fn new(config: PaymentConfig) -> MarketResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("x67-market/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MarketError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Client-credentials access token
    async fn access_token(&self) -> MarketResult<String> {
        let url = format!("{}/connect/token", self.config.environment.accounts_base());

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gateway token request failed: {}", e);
                MarketError::Gateway("Payment service unavailable".to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!("Gateway token request returned {}", response.status());
            return Err(MarketError::Gateway("Payment service unavailable".to_string()));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!("Invalid gateway token response: {}", e);
            MarketError::Gateway("Payment service unavailable".to_string())
        })?;

        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for VivaGateway {
    async fn create_order(&self, order: &OrderRequest) -> MarketResult<i64> {
        let token = self.access_token().await?;

        let merchant_trns = serde_json::to_string(&order.correlation)
            .map_err(|e| MarketError::Internal(format!("Failed to encode correlation: {}", e)))?;

        let payload = OrderPayload {
            amount: order.amount,
            customer_trns: format!(
                "X67 - {} - {}",
                order.correlation.payment_type, order.correlation.ad_id
            ),
            customer: OrderCustomer {
                email: &order.customer_email,
                full_name: &order.customer_name,
                request_lang: "ro",
            },
            source_code: &self.config.source_code,
            merchant_trns,
        };

        let url = format!("{}/checkout/v2/orders", self.config.environment.api_base());
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gateway order request failed: {}", e);
                MarketError::Gateway("Failed to create payment order".to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gateway order error {}: {}", status, body);
            return Err(MarketError::Gateway("Failed to create payment order".to_string()));
        }

        let created: OrderResponse = response.json().await.map_err(|e| {
            tracing::error!("Invalid gateway order response: {}", e);
            MarketError::Gateway("Failed to create payment order".to_string())
        })?;

        tracing::info!(
            "Created gateway order {} for ad {}",
            created.order_code,
            order.correlation.ad_id
        );

        Ok(created.order_code)
    }

    fn checkout_url(&self, order_code: i64) -> String {
        format!(
            "{}/web/checkout?ref={}&lang=ro",
            self.config.environment.checkout_base(),
            order_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::path::PathBuf;

    #[test]
    fn test_checkout_url() {
        let config = ServerConfig::for_tests(PathBuf::from("./data")).payments;
        let gateway = VivaGateway::new(config).unwrap();
        assert_eq!(
            gateway.checkout_url(42),
            "https://demo.vivapayments.com/web/checkout?ref=42&lang=ro"
        );
    }

    #[test]
    fn test_order_payload_shape() {
        let payload = OrderPayload {
            amount: 700,
            customer_trns: "X67 - boost - ad_1".to_string(),
            customer: OrderCustomer {
                email: "a@x67.ro",
                full_name: "Ana",
                request_lang: "ro",
            },
            source_code: "9570",
            merchant_trns: "{}".to_string(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["customerTrns"], "X67 - boost - ad_1");
        assert_eq!(json["customer"]["fullName"], "Ana");
        assert_eq!(json["customer"]["requestLang"], "ro");
        assert_eq!(json["sourceCode"], "9570");
    }
}
