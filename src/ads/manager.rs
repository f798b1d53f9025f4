/// Ad manager implementation
use super::{
    ranking::{self, SortMode},
    Ad, AdPage, AdStatus, AdView, CreateAdRequest, ListQuery, PriceType, UpdateAdRequest,
};
use crate::{
    db::{self, account::User},
    error::{MarketError, MarketResult},
    metrics,
    payments::PaymentType,
    taxonomy::TaxonomySnapshot,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use validator::Validate;

const AD_COLUMNS: &str = "ad_id, user_id, title, description, category_id, subcategory_id, city_id,
     price, price_type, contact_phone, contact_email, images, details, status, is_boosted,
     boost_expires_at, is_promoted, promote_expires_at, views, favorites_count, is_paid,
     auto_topup, topup_rank, last_topup, created_at, updated_at";

/// How long a completed boost payment keeps an ad boosted
pub const BOOST_DURATION_HOURS: i64 = 24;

/// How long a completed promote payment keeps an ad featured
pub const PROMOTE_DURATION_DAYS: i64 = 7;

/// Result of a detail fetch
#[derive(Debug, Clone)]
pub struct ViewOutcome {
    /// The ad with the incremented view count
    pub ad: Ad,
    /// Milestone crossed by this view, if any
    pub milestone: Option<i64>,
}

/// Ad manager
pub struct AdManager {
    db: SqlitePool,
}

impl AdManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create an ad in `pending` state
    pub async fn create(&self, owner: &User, req: CreateAdRequest) -> MarketResult<Ad> {
        req.validate()?;

        let price_type = match req.price_type.as_deref() {
            Some(s) => PriceType::from_str(s)?,
            None => PriceType::Fixed,
        };
        let details = req
            .details
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        let now = Utc::now();

        let ad = Ad {
            ad_id: db::generate_id("ad", 12),
            user_id: owner.user_id.clone(),
            title: req.title,
            description: req.description,
            category_id: req.category_id,
            subcategory_id: req.subcategory_id.filter(|s| !s.is_empty()),
            city_id: req.city_id,
            price: req.price,
            price_type,
            contact_phone: req.contact_phone,
            contact_email: req.contact_email.or_else(|| Some(owner.email.clone())),
            images: req.images,
            details,
            status: AdStatus::Pending,
            is_boosted: false,
            boost_expires_at: None,
            is_promoted: false,
            promote_expires_at: None,
            views: 0,
            favorites_count: 0,
            is_paid: false,
            auto_topup: true,
            topup_rank: 0.0,
            last_topup: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO ads (ad_id, user_id, title, description, category_id, subcategory_id, city_id,
                 price, price_type, contact_phone, contact_email, images, details, status,
                 is_boosted, is_promoted, views, favorites_count, is_paid, auto_topup, topup_rank,
                 created_at, updated_at, search_text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                 0, 0, 0, 0, 0, 1, 0, ?15, ?15, ?16)",
        )
        .bind(&ad.ad_id)
        .bind(&ad.user_id)
        .bind(&ad.title)
        .bind(&ad.description)
        .bind(&ad.category_id)
        .bind(&ad.subcategory_id)
        .bind(&ad.city_id)
        .bind(ad.price)
        .bind(ad.price_type.as_str())
        .bind(&ad.contact_phone)
        .bind(&ad.contact_email)
        .bind(encode_json(&ad.images)?)
        .bind(encode_json(&ad.details)?)
        .bind(ad.status.as_str())
        .bind(now)
        .bind(search_text(&ad.title, &ad.description))
        .execute(&self.db)
        .await?;

        metrics::record_ad_created();
        tracing::info!("Created ad {} for user {}", ad.ad_id, ad.user_id);

        Ok(ad)
    }

    /// Find an ad by id
    pub async fn find(&self, ad_id: &str) -> MarketResult<Option<Ad>> {
        let row = sqlx::query(&format!("SELECT {} FROM ads WHERE ad_id = ?1", AD_COLUMNS))
            .bind(ad_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(ad_from_row).transpose()
    }

    /// Get an ad by id, 404 when missing
    pub async fn get(&self, ad_id: &str) -> MarketResult<Ad> {
        self.find(ad_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Ad not found".to_string()))
    }

    /// Count one view atomically and report any milestone it crossed
    pub async fn record_view(&self, ad_id: &str) -> MarketResult<ViewOutcome> {
        let row = sqlx::query(&format!(
            "UPDATE ads SET views = views + 1 WHERE ad_id = ?1 RETURNING {}",
            AD_COLUMNS
        ))
        .bind(ad_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| MarketError::NotFound("Ad not found".to_string()))?;

        let ad = ad_from_row(&row)?;
        let milestone = ranking::crossed_milestone(ad.views - 1, ad.views);

        metrics::record_ad_view();
        if let Some(milestone) = milestone {
            tracing::info!("Ad {} reached {} views", ad_id, milestone);
        }

        Ok(ViewOutcome { ad, milestone })
    }

    /// Replace the fields present in `req`; owner or admin only
    pub async fn update(&self, ad_id: &str, actor: &User, req: UpdateAdRequest) -> MarketResult<()> {
        let mut ad = self.get(ad_id).await?;
        ensure_owner_or_admin(&ad, actor)?;

        if let Some(title) = req.title {
            ad.title = title;
        }
        if let Some(description) = req.description {
            ad.description = description;
        }
        if let Some(price) = req.price {
            ad.price = price;
        }
        if let Some(price_type) = req.price_type.as_deref() {
            ad.price_type = PriceType::from_str(price_type)?;
        }
        if let Some(contact_phone) = req.contact_phone {
            ad.contact_phone = contact_phone;
        }
        if let Some(contact_email) = req.contact_email {
            ad.contact_email = contact_email;
        }
        if let Some(details) = req.details {
            ad.details = details;
        }
        if let Some(images) = req.images {
            ad.images = images;
        }

        sqlx::query(
            "UPDATE ads SET title = ?1, description = ?2, price = ?3, price_type = ?4,
                 contact_phone = ?5, contact_email = ?6, details = ?7, images = ?8, updated_at = ?9,
                 search_text = ?10
             WHERE ad_id = ?11",
        )
        .bind(&ad.title)
        .bind(&ad.description)
        .bind(ad.price)
        .bind(ad.price_type.as_str())
        .bind(&ad.contact_phone)
        .bind(&ad.contact_email)
        .bind(encode_json(&ad.details)?)
        .bind(encode_json(&ad.images)?)
        .bind(Utc::now())
        .bind(search_text(&ad.title, &ad.description))
        .bind(ad_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Hard delete; owner or admin only
    pub async fn delete(&self, ad_id: &str, actor: &User) -> MarketResult<()> {
        let ad = self.get(ad_id).await?;
        ensure_owner_or_admin(&ad, actor)?;

        sqlx::query("DELETE FROM ads WHERE ad_id = ?1")
            .bind(ad_id)
            .execute(&self.db)
            .await?;

        tracing::info!("Deleted ad {} (by {})", ad_id, actor.user_id);
        Ok(())
    }

    /// Public search over active ads
    pub async fn list(
        &self,
        query: &ListQuery,
        taxonomy: &TaxonomySnapshot,
    ) -> MarketResult<AdPage<AdView>> {
        let (page, limit, offset) = db::paginate(query.page, query.limit, 20);
        let sort = SortMode::parse(query.sort.as_deref());
        let keys = ranking::sort_keys(sort, query.category_id.as_deref());

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM ads", AD_COLUMNS));
        push_listing_filters(&mut select, query);
        select.push(" ");
        select.push(ranking::order_by_clause(&keys));
        select.push(" LIMIT ");
        select.push_bind(limit);
        select.push(" OFFSET ");
        select.push_bind(offset);

        let rows = select.build().fetch_all(&self.db).await?;
        let ads = rows
            .iter()
            .map(|row| ad_from_row(row).map(|ad| AdView::enrich(ad, taxonomy)))
            .collect::<MarketResult<Vec<_>>>()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ads");
        push_listing_filters(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        Ok(AdPage {
            ads,
            total,
            page,
            pages: db::page_count(total, limit),
        })
    }

    /// Active promoted ads, latest-expiring promotion first
    pub async fn promoted(&self, limit: i64, taxonomy: &TaxonomySnapshot) -> MarketResult<Vec<AdView>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ads WHERE status = 'active' AND is_promoted = 1
             ORDER BY promote_expires_at DESC LIMIT ?1",
            AD_COLUMNS
        ))
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| ad_from_row(row).map(|ad| AdView::enrich(ad, taxonomy)))
            .collect()
    }

    /// Ads owned by a user, newest first
    pub async fn list_for_user(
        &self,
        user_id: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> MarketResult<AdPage<Ad>> {
        let (page, limit, offset) = db::paginate(page, limit, 20);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM ads WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            AD_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let ads = rows.iter().map(ad_from_row).collect::<MarketResult<Vec<_>>>()?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok(AdPage {
            ads,
            total,
            page,
            pages: db::page_count(total, limit),
        })
    }

    /// Move an active ad to the front of its listings, subject to cooldown
    ///
    /// The cooldown check and the rank update are one conditional UPDATE, so
    /// at most one top-up succeeds per window. Returns the cooldown in
    /// minutes that now applies.
    pub async fn topup(&self, ad_id: &str, owner: &User) -> MarketResult<i64> {
        let ad = self.get(ad_id).await?;
        if ad.user_id != owner.user_id {
            metrics::record_topup("rejected");
            return Err(MarketError::Authorization("Not your ad".to_string()));
        }
        if ad.status != AdStatus::Active {
            metrics::record_topup("rejected");
            return Err(MarketError::Validation("Ad must be active to topup".to_string()));
        }

        let cooldown = ranking::topup_cooldown_minutes(owner.referral_count);
        let now = Utc::now();
        let boundary = ranking::rank_for(now - Duration::minutes(cooldown));

        let result = sqlx::query(
            "UPDATE ads SET last_topup = ?1, topup_rank = ?2
             WHERE ad_id = ?3 AND user_id = ?4 AND status = 'active' AND topup_rank <= ?5",
        )
        .bind(now)
        .bind(ranking::rank_for(now))
        .bind(ad_id)
        .bind(&owner.user_id)
        .bind(boundary)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 1 {
            metrics::record_topup("success");
            tracing::info!("Topped up ad {}", ad_id);
            return Ok(cooldown);
        }

        // Lost the conditional update: report why from the current state
        let current = self.get(ad_id).await?;
        if current.status != AdStatus::Active {
            metrics::record_topup("rejected");
            return Err(MarketError::Validation("Ad must be active to topup".to_string()));
        }

        metrics::record_topup("cooldown");
        let last_topup = current.last_topup.unwrap_or(now);
        let remaining = ranking::remaining_cooldown_minutes(last_topup, Utc::now(), cooldown);
        Err(MarketError::Validation(format!(
            "Top-up available again in {} minutes",
            remaining
        )))
    }

    /// Store the auto-topup preference; owner only
    pub async fn set_auto_topup(&self, ad_id: &str, owner: &User, enabled: bool) -> MarketResult<()> {
        let ad = self.get(ad_id).await?;
        if ad.user_id != owner.user_id {
            return Err(MarketError::Authorization("Not your ad".to_string()));
        }

        sqlx::query("UPDATE ads SET auto_topup = ?1 WHERE ad_id = ?2")
            .bind(enabled)
            .bind(ad_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Apply the effect of a completed payment; false when the ad is gone
    pub async fn apply_payment_effect(
        &self,
        ad_id: &str,
        payment_type: PaymentType,
        now: DateTime<Utc>,
    ) -> MarketResult<bool> {
        let mut conn = self.db.acquire().await?;
        Self::apply_payment_effect_on(&mut *conn, ad_id, payment_type, now).await
    }

    /// [`AdManager::apply_payment_effect`] on a caller-owned connection
    pub async fn apply_payment_effect_on(
        conn: &mut SqliteConnection,
        ad_id: &str,
        payment_type: PaymentType,
        now: DateTime<Utc>,
    ) -> MarketResult<bool> {
        let result = match payment_type {
            PaymentType::PostAd => {
                sqlx::query("UPDATE ads SET is_paid = 1, status = 'pending' WHERE ad_id = ?1")
                    .bind(ad_id)
                    .execute(&mut *conn)
                    .await?
            }
            PaymentType::Boost => {
                sqlx::query("UPDATE ads SET is_boosted = 1, boost_expires_at = ?1 WHERE ad_id = ?2")
                    .bind(now + Duration::hours(BOOST_DURATION_HOURS))
                    .bind(ad_id)
                    .execute(&mut *conn)
                    .await?
            }
            PaymentType::Promote => {
                sqlx::query(
                    "UPDATE ads SET is_promoted = 1, promote_expires_at = ?1 WHERE ad_id = ?2",
                )
                .bind(now + Duration::days(PROMOTE_DURATION_DAYS))
                .bind(ad_id)
                .execute(&mut *conn)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    /// Admin status change; returns the ad as it was before the change
    pub async fn set_status(&self, ad_id: &str, status: AdStatus) -> MarketResult<Ad> {
        let ad = self.get(ad_id).await?;

        sqlx::query("UPDATE ads SET status = ?1, updated_at = ?2 WHERE ad_id = ?3")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(ad_id)
            .execute(&self.db)
            .await?;

        metrics::record_moderation_action(status.as_str());
        tracing::info!(
            "Ad {} status {} -> {}",
            ad_id,
            ad.status.as_str(),
            status.as_str()
        );

        Ok(ad)
    }

    /// All ads for moderation, optionally filtered by status
    pub async fn list_all(
        &self,
        status: Option<AdStatus>,
        offset: i64,
        limit: i64,
    ) -> MarketResult<(Vec<Ad>, i64)> {
        let status = status.map(|s| s.as_str());

        let rows = sqlx::query(&format!(
            "SELECT {} FROM ads WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            AD_COLUMNS
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let ads = rows.iter().map(ad_from_row).collect::<MarketResult<Vec<_>>>()?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ads WHERE (?1 IS NULL OR status = ?1)")
                .bind(status)
                .fetch_one(&self.db)
                .await?;

        Ok((ads, total))
    }

    /// Count ads, optionally by status
    pub async fn count(&self, status: Option<AdStatus>) -> MarketResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ads WHERE (?1 IS NULL OR status = ?1)")
                .bind(status.map(|s| s.as_str()))
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }

    /// Drop boost and promote flags whose windows have passed
    pub async fn clear_expired_visibility(&self, now: DateTime<Utc>) -> MarketResult<(u64, u64)> {
        let boosts = sqlx::query(
            "UPDATE ads SET is_boosted = 0
             WHERE is_boosted = 1 AND boost_expires_at IS NOT NULL AND boost_expires_at < ?1",
        )
        .bind(now)
        .execute(&self.db)
        .await?
        .rows_affected();

        let promotions = sqlx::query(
            "UPDATE ads SET is_promoted = 0
             WHERE is_promoted = 1 AND promote_expires_at IS NOT NULL AND promote_expires_at < ?1",
        )
        .bind(now)
        .execute(&self.db)
        .await?
        .rows_affected();

        Ok((boosts, promotions))
    }
}

fn ensure_owner_or_admin(ad: &Ad, actor: &User) -> MarketResult<()> {
    if ad.user_id == actor.user_id || actor.is_admin() {
        Ok(())
    } else {
        Err(MarketError::Authorization("Not authorized".to_string()))
    }
}

/// WHERE clause shared by the listing and its count
fn push_listing_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ListQuery) {
    builder.push(" WHERE status = 'active'");

    if let Some(category_id) = query.category_id.as_ref().filter(|s| !s.is_empty()) {
        builder.push(" AND category_id = ").push_bind(category_id.clone());
    }
    if let Some(subcategory_id) = query.subcategory_id.as_ref().filter(|s| !s.is_empty()) {
        builder.push(" AND subcategory_id = ").push_bind(subcategory_id.clone());
    }
    if let Some(city_id) = query.city_id.as_ref().filter(|s| !s.is_empty()) {
        builder.push(" AND city_id = ").push_bind(city_id.clone());
    }
    if let Some(search) = query.search.as_ref().filter(|s| !s.trim().is_empty()) {
        // SQLite LOWER() only folds ASCII, so both sides are folded in Rust
        let pattern = format!("%{}%", escape_like(&search.trim().to_lowercase()));
        builder
            .push(" AND search_text LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'");
    }
    if let Some(min_price) = query.min_price {
        builder.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        builder.push(" AND price <= ").push_bind(max_price);
    }
}

/// Lowercased title and description as matched by listing search
fn search_text(title: &str, description: &str) -> String {
    format!("{}\n{}", title.to_lowercase(), description.to_lowercase())
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn encode_json<T: serde::Serialize>(value: &T) -> MarketResult<String> {
    serde_json::to_string(value)
        .map_err(|e| MarketError::Internal(format!("Failed to encode ad field: {}", e)))
}

pub(crate) fn ad_from_row(row: &SqliteRow) -> MarketResult<Ad> {
    let status: String = row.try_get("status")?;
    let price_type: String = row.try_get("price_type")?;
    let images: String = row.try_get("images")?;
    let details: String = row.try_get("details")?;

    Ok(Ad {
        ad_id: row.try_get("ad_id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category_id: row.try_get("category_id")?,
        subcategory_id: row.try_get("subcategory_id")?,
        city_id: row.try_get("city_id")?,
        price: row.try_get("price")?,
        price_type: PriceType::from_str(&price_type)?,
        contact_phone: row.try_get("contact_phone")?,
        contact_email: row.try_get("contact_email")?,
        images: serde_json::from_str(&images).unwrap_or_default(),
        details: serde_json::from_str(&details)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
        status: AdStatus::from_str(&status)?,
        is_boosted: row.try_get("is_boosted")?,
        boost_expires_at: row.try_get("boost_expires_at")?,
        is_promoted: row.try_get("is_promoted")?,
        promote_expires_at: row.try_get("promote_expires_at")?,
        views: row.try_get("views")?,
        favorites_count: row.try_get("favorites_count")?,
        is_paid: row.try_get("is_paid")?,
        auto_topup: row.try_get("auto_topup")?,
        topup_rank: row.try_get("topup_rank")?,
        last_topup: row.try_get("last_topup")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
