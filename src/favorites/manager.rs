/// Favorite manager implementation
use super::{Favorite, FavoriteAd, FavoritePage};
use crate::{
    ads::ad_from_row,
    db,
    error::{MarketError, MarketResult},
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Favorite manager
pub struct FavoriteManager {
    db: SqlitePool,
}

impl FavoriteManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Save an ad for a user and bump the ad's counter
    pub async fn add(&self, user_id: &str, ad_id: &str) -> MarketResult<Favorite> {
        let ad_price: Option<Option<f64>> =
            sqlx::query_scalar("SELECT price FROM ads WHERE ad_id = ?1")
                .bind(ad_id)
                .fetch_optional(&self.db)
                .await?;
        let ad_price = ad_price.ok_or_else(|| MarketError::NotFound("Ad not found".to_string()))?;

        let favorite = Favorite {
            favorite_id: db::generate_id("fav", 12),
            user_id: user_id.to_string(),
            ad_id: ad_id.to_string(),
            ad_price,
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO favorites (favorite_id, user_id, ad_id, ad_price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&favorite.favorite_id)
        .bind(&favorite.user_id)
        .bind(&favorite.ad_id)
        .bind(favorite.ad_price)
        .bind(favorite.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                MarketError::Validation("Already in favorites".to_string())
            }
            other => MarketError::Database(other),
        })?;

        sqlx::query("UPDATE ads SET favorites_count = favorites_count + 1 WHERE ad_id = ?1")
            .bind(ad_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("User {} saved ad {}", user_id, ad_id);
        Ok(favorite)
    }

    /// Remove a saved ad and drop the ad's counter
    pub async fn remove(&self, user_id: &str, ad_id: &str) -> MarketResult<()> {
        let mut tx = self.db.begin().await?;

        let deleted = sqlx::query("DELETE FROM favorites WHERE user_id = ?1 AND ad_id = ?2")
            .bind(user_id)
            .bind(ad_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(MarketError::NotFound("Favorite not found".to_string()));
        }

        sqlx::query("UPDATE ads SET favorites_count = favorites_count - 1 WHERE ad_id = ?1")
            .bind(ad_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// A user's saved ads, most recently saved first
    ///
    /// Favorites whose ad has since been deleted are counted in `total` but
    /// not listed.
    pub async fn list(
        &self,
        user_id: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> MarketResult<FavoritePage> {
        let (page, limit, offset) = db::paginate(page, limit, 20);

        let rows = sqlx::query(
            "SELECT a.*, f.favorite_id AS fav_id, f.ad_price AS fav_price, f.created_at AS fav_created_at
             FROM favorites f
             JOIN ads a ON a.ad_id = f.ad_id
             WHERE f.user_id = ?1
             ORDER BY f.created_at DESC
             LIMIT ?2 OFFSET ?3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let mut favorites = Vec::with_capacity(rows.len());
        for row in &rows {
            let ad = ad_from_row(row)?;
            let favorite = Favorite {
                favorite_id: row.try_get("fav_id")?,
                user_id: user_id.to_string(),
                ad_id: ad.ad_id.clone(),
                ad_price: row.try_get("fav_price")?,
                created_at: row.try_get("fav_created_at")?,
            };
            favorites.push(FavoriteAd::new(ad, &favorite));
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok(FavoritePage {
            favorites,
            total,
            page,
            pages: db::page_count(total, limit),
        })
    }

    pub async fn is_favorite(&self, user_id: &str, ad_id: &str) -> MarketResult<bool> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM favorites WHERE user_id = ?1 AND ad_id = ?2")
                .bind(user_id)
                .bind(ad_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(exists.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::{AdManager, CreateAdRequest, UpdateAdRequest};
    use crate::{account::Role, db::account::User};

    fn owner() -> User {
        User {
            user_id: "user_owner".to_string(),
            email: "owner@x67.ro".to_string(),
            password_hash: None,
            name: "Owner".to_string(),
            phone: None,
            picture: None,
            role: Role::User,
            is_blocked: false,
            referral_code: None,
            referral_count: 0,
            created_at: Utc::now(),
        }
    }

    async fn setup() -> (FavoriteManager, AdManager, String) {
        let pool = db::create_memory_pool().await.unwrap();
        let ads = AdManager::new(pool.clone());
        let ad = ads
            .create(
                &owner(),
                CreateAdRequest {
                    title: "Golf 7".to_string(),
                    description: "Stare foarte buna".to_string(),
                    category_id: "auto".to_string(),
                    subcategory_id: None,
                    city_id: "cluj".to_string(),
                    price: Some(9500.0),
                    price_type: None,
                    contact_phone: None,
                    contact_email: None,
                    images: vec![],
                    details: None,
                },
            )
            .await
            .unwrap();
        (FavoriteManager::new(pool), ads, ad.ad_id)
    }

    #[tokio::test]
    async fn test_add_twice_is_rejected() {
        let (favorites, ads, ad_id) = setup().await;

        let favorite = favorites.add("user_a", &ad_id).await.unwrap();
        assert!(favorite.favorite_id.starts_with("fav_"));
        assert_eq!(favorite.ad_price, Some(9500.0));

        match favorites.add("user_a", &ad_id).await.unwrap_err() {
            MarketError::Validation(msg) => assert_eq!(msg, "Already in favorites"),
            other => panic!("Expected validation error, got {:?}", other),
        }

        assert_eq!(ads.get(&ad_id).await.unwrap().favorites_count, 1);
    }

    #[tokio::test]
    async fn test_add_unknown_ad() {
        let (favorites, _, _) = setup().await;
        assert!(matches!(
            favorites.add("user_a", "ad_missing").await,
            Err(MarketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_counter_follows_add_and_remove() {
        let (favorites, ads, ad_id) = setup().await;

        favorites.add("user_a", &ad_id).await.unwrap();
        favorites.add("user_b", &ad_id).await.unwrap();
        assert_eq!(ads.get(&ad_id).await.unwrap().favorites_count, 2);

        favorites.remove("user_a", &ad_id).await.unwrap();
        assert_eq!(ads.get(&ad_id).await.unwrap().favorites_count, 1);

        match favorites.remove("user_a", &ad_id).await.unwrap_err() {
            MarketError::NotFound(msg) => assert_eq!(msg, "Favorite not found"),
            other => panic!("Expected not found, got {:?}", other),
        }
        assert_eq!(ads.get(&ad_id).await.unwrap().favorites_count, 1);

        assert!(favorites.is_favorite("user_b", &ad_id).await.unwrap());
        assert!(!favorites.is_favorite("user_a", &ad_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_flags_price_drop() {
        let (favorites, ads, ad_id) = setup().await;
        favorites.add("user_a", &ad_id).await.unwrap();

        ads.update(
            &ad_id,
            &owner(),
            UpdateAdRequest {
                price: Some(Some(8000.0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let page = favorites.list("user_a", None, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.pages, 1);
        let saved = &page.favorites[0];
        assert_eq!(saved.ad.ad_id, ad_id);
        assert_eq!(saved.original_price, Some(9500.0));
        assert!(saved.price_dropped);
    }
}
