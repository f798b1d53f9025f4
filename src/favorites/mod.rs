/// Saved ads
///
/// A favorite snapshots the ad's price when it is saved so a later listing
/// can flag price drops. The ad's `favorites_count` is kept in step with the
/// favorites table.
mod manager;

pub use manager::FavoriteManager;

use crate::ads::Ad;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored favorite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub favorite_id: String,
    pub user_id: String,
    pub ad_id: String,
    /// Price at the time the ad was saved
    pub ad_price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A saved ad as listed back to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteAd {
    #[serde(flatten)]
    pub ad: Ad,
    pub favorited_at: DateTime<Utc>,
    pub original_price: Option<f64>,
    pub price_dropped: bool,
}

impl FavoriteAd {
    pub fn new(ad: Ad, favorite: &Favorite) -> Self {
        let price_dropped = price_dropped(favorite.ad_price, ad.price);
        Self {
            ad,
            favorited_at: favorite.created_at,
            original_price: favorite.ad_price,
            price_dropped,
        }
    }
}

/// True when both prices are known and non-zero and the current one is lower
pub fn price_dropped(original: Option<f64>, current: Option<f64>) -> bool {
    match (original, current) {
        (Some(original), Some(current)) if original != 0.0 && current != 0.0 => current < original,
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddFavoriteResponse {
    pub message: String,
    pub favorite_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritePage {
    pub favorites: Vec<FavoriteAd>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteCheckResponse {
    pub is_favorite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_dropped() {
        assert!(price_dropped(Some(1000.0), Some(900.0)));
        assert!(!price_dropped(Some(1000.0), Some(1000.0)));
        assert!(!price_dropped(Some(1000.0), Some(1100.0)));
        assert!(!price_dropped(None, Some(900.0)));
        assert!(!price_dropped(Some(1000.0), None));
        assert!(!price_dropped(Some(1000.0), Some(0.0)));
    }
}
