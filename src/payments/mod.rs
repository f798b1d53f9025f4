/// Paid ad actions: order creation through the gateway and webhook completion
mod gateway;
mod manager;
pub mod signature;

pub use gateway::{OrderRequest, PaymentGateway, VivaGateway};
pub use manager::PaymentManager;

use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gateway status code meaning the transaction finished successfully
pub const STATUS_FINISHED: &str = "F";

/// What a payment buys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    PostAd,
    Boost,
    Promote,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::PostAd => "post_ad",
            PaymentType::Boost => "boost",
            PaymentType::Promote => "promote",
        }
    }

    pub fn from_str(s: &str) -> MarketResult<Self> {
        match s {
            "post_ad" => Ok(PaymentType::PostAd),
            "boost" => Ok(PaymentType::Boost),
            "promote" => Ok(PaymentType::Promote),
            _ => Err(MarketError::Validation("Invalid payment type".to_string())),
        }
    }

    /// Price in minor currency units
    pub fn amount(&self) -> i64 {
        match self {
            PaymentType::PostAd => 1140,
            PaymentType::Boost => 700,
            PaymentType::Promote => 2999,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> MarketResult<Self> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            _ => Err(MarketError::Validation(format!("Invalid payment status: {}", s))),
        }
    }
}

/// Stored payment record, one per gateway order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    pub order_code: i64,
    pub ad_id: String,
    pub user_id: String,
    pub payment_type: PaymentType,
    pub amount: i64,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Convert minor units to major units
pub fn to_major_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

/// Application data round-tripped through the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub ad_id: String,
    pub payment_type: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub ad_id: String,
    pub payment_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_code: i64,
    pub checkout_url: String,
    /// Major units
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub order_code: i64,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub ad_id: String,
}

/// Webhook body as posted by the gateway
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "EventData", default)]
    pub event_data: WebhookEventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookEventData {
    pub transaction_id: Option<String>,
    pub order_code: Option<i64>,
    pub status_id: Option<String>,
    pub merchant_trns: Option<String>,
}

impl WebhookEventData {
    pub fn is_finished(&self) -> bool {
        self.status_id.as_deref() == Some(STATUS_FINISHED)
    }

    /// Decode the echoed correlation blob; malformed blobs decode to `None`
    pub fn correlation(&self) -> Option<Correlation> {
        self.merchant_trns
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_type_amounts() {
        assert_eq!(PaymentType::from_str("post_ad").unwrap().amount(), 1140);
        assert_eq!(PaymentType::from_str("boost").unwrap().amount(), 700);
        assert_eq!(PaymentType::from_str("promote").unwrap().amount(), 2999);
        assert_eq!(to_major_units(2999), 29.99);

        match PaymentType::from_str("gift").unwrap_err() {
            MarketError::Validation(msg) => assert_eq!(msg, "Invalid payment type"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_webhook_payload_parsing() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"EventData": {"TransactionId": "tx-1", "OrderCode": 1234567890123456,
                "StatusId": "F",
                "MerchantTrns": "{\"ad_id\":\"ad_1\",\"payment_type\":\"boost\",\"user_id\":\"user_1\"}"}}"#,
        )
        .unwrap();

        let event = payload.event_data;
        assert!(event.is_finished());
        assert_eq!(event.order_code, Some(1234567890123456));
        assert_eq!(event.correlation().unwrap().payment_type, "boost");
    }

    #[test]
    fn test_webhook_tolerates_missing_fields() {
        let payload: WebhookPayload = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!payload.event_data.is_finished());

        let bad_blob = WebhookEventData {
            merchant_trns: Some("not json".to_string()),
            ..Default::default()
        };
        assert_eq!(bad_blob.correlation(), None);
    }
}
