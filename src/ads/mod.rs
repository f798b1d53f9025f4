/// Ad lifecycle: creation, moderation status, visibility windows and ranking
mod manager;
pub mod ranking;

pub use manager::{AdManager, ViewOutcome, BOOST_DURATION_HOURS, PROMOTE_DURATION_DAYS};
pub(crate) use manager::ad_from_row;
pub use ranking::SortMode;

use crate::{
    error::{MarketError, MarketResult},
    taxonomy::TaxonomySnapshot,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Pending,
    Active,
    Rejected,
    Expired,
}

impl AdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdStatus::Pending => "pending",
            AdStatus::Active => "active",
            AdStatus::Rejected => "rejected",
            AdStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> MarketResult<Self> {
        match s {
            "pending" => Ok(AdStatus::Pending),
            "active" => Ok(AdStatus::Active),
            "rejected" => Ok(AdStatus::Rejected),
            "expired" => Ok(AdStatus::Expired),
            _ => Err(MarketError::Validation("Invalid status".to_string())),
        }
    }
}

/// How the price should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Fixed,
    Negotiable,
    Free,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Fixed => "fixed",
            PriceType::Negotiable => "negotiable",
            PriceType::Free => "free",
        }
    }

    pub fn from_str(s: &str) -> MarketResult<Self> {
        match s {
            "fixed" => Ok(PriceType::Fixed),
            "negotiable" => Ok(PriceType::Negotiable),
            "free" => Ok(PriceType::Free),
            _ => Err(MarketError::Validation(format!("Invalid price type: {}", s))),
        }
    }
}

/// Stored ad record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub ad_id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub city_id: String,
    /// `None` means "price on request"
    pub price: Option<f64>,
    pub price_type: PriceType,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub images: Vec<String>,
    pub details: serde_json::Value,
    pub status: AdStatus,
    pub is_boosted: bool,
    pub boost_expires_at: Option<DateTime<Utc>>,
    pub is_promoted: bool,
    pub promote_expires_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub favorites_count: i64,
    pub is_paid: bool,
    pub auto_topup: bool,
    pub topup_rank: f64,
    pub last_topup: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ad with display names resolved; nothing here is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdView {
    #[serde(flatten)]
    pub ad: Ad,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_picture: Option<String>,
}

impl AdView {
    /// Attach category, subcategory and city names
    pub fn enrich(ad: Ad, taxonomy: &TaxonomySnapshot) -> Self {
        let category = taxonomy.category(&ad.category_id);
        let subcategory_name = match (category, ad.subcategory_id.as_deref()) {
            (Some(category), Some(sub_id)) => category.subcategory(sub_id).map(|s| s.name.clone()),
            _ => None,
        };
        let city = taxonomy.city(&ad.city_id);

        AdView {
            category_name: category.map(|c| c.name.clone()),
            category_color: category.map(|c| c.color.clone()),
            subcategory_name,
            city_name: city.map(|c| c.name.clone()),
            city_county: None,
            user_name: None,
            user_picture: None,
            ad,
        }
    }

    /// Detail view: also carries county and owner profile
    pub fn detailed(
        ad: Ad,
        taxonomy: &TaxonomySnapshot,
        owner_name: Option<String>,
        owner_picture: Option<String>,
    ) -> Self {
        let city_county = taxonomy.city(&ad.city_id).map(|c| c.county.clone());
        let mut view = Self::enrich(ad, taxonomy);
        view.city_county = city_county;
        view.user_name = owner_name;
        view.user_picture = owner_picture;
        view
    }
}

/// Create ad request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAdRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 10000))]
    pub description: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub category_id: String,
    pub subcategory_id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub city_id: String,
    pub price: Option<f64>,
    pub price_type: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub details: Option<serde_json::Value>,
}

/// Partial update; only present fields are replaced
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAdRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Explicit `null` clears the price
    #[serde(default, deserialize_with = "deserialize_present")]
    pub price: Option<Option<f64>>,
    pub price_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub contact_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub contact_email: Option<Option<String>>,
    pub details: Option<serde_json::Value>,
    pub images: Option<Vec<String>>,
}

/// Distinguish a field set to `null` from an absent field
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdResponse {
    pub ad_id: String,
    pub status: AdStatus,
    pub message: String,
}

/// Public listing query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub city_id: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Paginated list of ads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdPage<T> {
    pub ads: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupResponse {
    pub message: String,
    pub next_topup_available_in: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoTopupRequest {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTopupResponse {
    pub message: String,
    pub auto_topup: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(AdStatus::from_str("active").unwrap(), AdStatus::Active);
        match AdStatus::from_str("archived").unwrap_err() {
            MarketError::Validation(msg) => assert_eq!(msg, "Invalid status"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let cleared: UpdateAdRequest = serde_json::from_str(r#"{"price": null}"#).unwrap();
        assert_eq!(cleared.price, Some(None));

        let absent: UpdateAdRequest = serde_json::from_str(r#"{"title": "Nou"}"#).unwrap();
        assert_eq!(absent.price, None);
        assert_eq!(absent.title.as_deref(), Some("Nou"));
    }

    #[test]
    fn test_create_request_requires_core_fields() {
        let req: CreateAdRequest =
            serde_json::from_str(r#"{"title": "Golf 7", "description": "", "city_id": "cluj"}"#)
                .unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("description"));
        assert!(fields.contains_key("category_id"));
        assert!(!fields.contains_key("title"));
    }
}
