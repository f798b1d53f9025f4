/// Seller dashboard figures computed from a user's ads
///
/// Individual view events are not stored, so the daily series is an even
/// split of the total over the requested window.
use crate::{ads::AdStatus, error::MarketResult};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

const TOP_ADS: i64 = 5;
const MAX_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overview {
    pub total_ads: i64,
    pub active_ads: i64,
    pub total_views: i64,
    pub total_favorites: i64,
    pub total_messages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopAd {
    pub ad_id: String,
    pub title: String,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsReport {
    pub top_ads: Vec<TopAd>,
    pub daily_views: Vec<DailyViews>,
    pub total_views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdPerformance {
    pub ad_id: String,
    pub title: String,
    pub status: AdStatus,
    pub views: i64,
    pub favorites: i64,
    pub conversations: i64,
    pub messages: i64,
    pub created_at: DateTime<Utc>,
    pub last_topup: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub ads: Vec<AdPerformance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewsQuery {
    pub days: Option<i64>,
}

/// Analytics queries
pub struct AnalyticsManager {
    db: SqlitePool,
}

impl AnalyticsManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn overview(&self, user_id: &str) -> MarketResult<Overview> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total_ads,
                    COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0) AS active_ads,
                    COALESCE(SUM(views), 0) AS total_views,
                    COALESCE(SUM(favorites_count), 0) AS total_favorites
             FROM ads WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let total_messages: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE receiver_id = ?1")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;

        Ok(Overview {
            total_ads: row.try_get("total_ads")?,
            active_ads: row.try_get("active_ads")?,
            total_views: row.try_get("total_views")?,
            total_favorites: row.try_get("total_favorites")?,
            total_messages,
        })
    }

    /// Top ads by views plus a daily series over the last `days` days
    pub async fn views(&self, user_id: &str, days: i64, now: DateTime<Utc>) -> MarketResult<ViewsReport> {
        let days = days.clamp(1, MAX_DAYS);

        let rows = sqlx::query(
            "SELECT ad_id, title, views, created_at FROM ads
             WHERE user_id = ?1 ORDER BY views DESC, created_at DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(TOP_ADS)
        .fetch_all(&self.db)
        .await?;

        let top_ads = rows
            .iter()
            .map(|row| {
                Ok(TopAd {
                    ad_id: row.try_get("ad_id")?,
                    title: row.try_get("title")?,
                    views: row.try_get("views")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<MarketResult<Vec<_>>>()?;

        let total_views: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(views), 0) FROM ads WHERE user_id = ?1")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;

        Ok(ViewsReport {
            top_ads,
            daily_views: daily_estimate(total_views, days, now),
            total_views,
        })
    }

    /// Per-ad engagement, most viewed first
    pub async fn ads_performance(&self, user_id: &str) -> MarketResult<PerformanceReport> {
        let rows = sqlx::query(
            "SELECT a.ad_id, a.title, a.status, a.views, a.favorites_count, a.created_at, a.last_topup,
                    (SELECT COUNT(*) FROM conversations c
                      WHERE c.ad_id = a.ad_id AND (c.participant_a = ?1 OR c.participant_b = ?1))
                        AS conversations,
                    (SELECT COUNT(*) FROM messages m
                      JOIN conversations c ON c.conversation_id = m.conversation_id
                      WHERE c.ad_id = a.ad_id AND m.receiver_id = ?1) AS messages
             FROM ads a
             WHERE a.user_id = ?1
             ORDER BY a.views DESC, a.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let ads = rows
            .iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                Ok(AdPerformance {
                    ad_id: row.try_get("ad_id")?,
                    title: row.try_get("title")?,
                    status: AdStatus::from_str(&status)?,
                    views: row.try_get("views")?,
                    favorites: row.try_get("favorites_count")?,
                    conversations: row.try_get("conversations")?,
                    messages: row.try_get("messages")?,
                    created_at: row.try_get("created_at")?,
                    last_topup: row.try_get("last_topup")?,
                })
            })
            .collect::<MarketResult<Vec<_>>>()?;

        Ok(PerformanceReport { ads })
    }
}

/// Spread `total` evenly over the `days` days ending today
fn daily_estimate(total: i64, days: i64, now: DateTime<Utc>) -> Vec<DailyViews> {
    let per_day = total / days.max(1);
    let today = now.date_naive();

    (0..days)
        .map(|i| DailyViews {
            date: today - Duration::days(days - i - 1),
            views: per_day,
        })
        .collect()
}
