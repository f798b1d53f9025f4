/// Promotional banners shown on the site
use crate::{
    db,
    error::{MarketError, MarketResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const BANNER_COLUMNS: &str =
    "banner_id, title, media_url, media_type, link_url, position, is_active, display_order, created_at";

pub const DEFAULT_POSITION: &str = "homepage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> MarketResult<Self> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            _ => Err(MarketError::Validation(format!("Invalid media type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Banner {
    pub banner_id: String,
    pub title: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub link_url: Option<String>,
    pub position: String,
    pub is_active: bool,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBanner {
    #[serde(default)]
    pub title: String,
    pub media_url: String,
    pub media_type: Option<MediaType>,
    pub link_url: Option<String>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BannerUpdate {
    pub title: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
    pub link_url: Option<String>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BannerQuery {
    pub position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBannerResponse {
    pub banner_id: String,
}

/// Banner manager
pub struct BannerManager {
    db: SqlitePool,
}

impl BannerManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Active banners for a position in display order
    pub async fn active(&self, position: &str) -> MarketResult<Vec<Banner>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM banners WHERE is_active = 1 AND position = ?1
             ORDER BY display_order ASC, created_at ASC LIMIT 100",
            BANNER_COLUMNS
        ))
        .bind(position)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(banner_from_row).collect()
    }

    /// Every banner, for the admin panel
    pub async fn list_all(&self) -> MarketResult<Vec<Banner>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM banners ORDER BY position, display_order ASC, created_at ASC",
            BANNER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(banner_from_row).collect()
    }

    pub async fn create(&self, new: NewBanner) -> MarketResult<Banner> {
        if new.media_url.trim().is_empty() {
            return Err(MarketError::Validation("media_url is required".to_string()));
        }

        let banner = Banner {
            banner_id: db::generate_id("banner", 12),
            title: new.title,
            media_url: new.media_url,
            media_type: new.media_type.unwrap_or(MediaType::Image),
            link_url: new.link_url,
            position: new.position.unwrap_or_else(|| DEFAULT_POSITION.to_string()),
            is_active: new.is_active.unwrap_or(true),
            order: new.order.unwrap_or(0),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO banners (banner_id, title, media_url, media_type, link_url, position, is_active, display_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&banner.banner_id)
        .bind(&banner.title)
        .bind(&banner.media_url)
        .bind(banner.media_type.as_str())
        .bind(&banner.link_url)
        .bind(&banner.position)
        .bind(banner.is_active)
        .bind(banner.order)
        .bind(banner.created_at)
        .execute(&self.db)
        .await?;

        tracing::info!("Created banner {} at {}", banner.banner_id, banner.position);
        Ok(banner)
    }

    pub async fn update(&self, banner_id: &str, update: BannerUpdate) -> MarketResult<()> {
        let result = sqlx::query(
            "UPDATE banners SET
                 title = COALESCE(?1, title),
                 media_url = COALESCE(?2, media_url),
                 media_type = COALESCE(?3, media_type),
                 link_url = COALESCE(?4, link_url),
                 position = COALESCE(?5, position),
                 is_active = COALESCE(?6, is_active),
                 display_order = COALESCE(?7, display_order)
             WHERE banner_id = ?8",
        )
        .bind(update.title)
        .bind(update.media_url)
        .bind(update.media_type.map(|t| t.as_str()))
        .bind(update.link_url)
        .bind(update.position)
        .bind(update.is_active)
        .bind(update.order)
        .bind(banner_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::NotFound("Banner not found".to_string()));
        }
        Ok(())
    }

    pub async fn delete(&self, banner_id: &str) -> MarketResult<()> {
        let result = sqlx::query("DELETE FROM banners WHERE banner_id = ?1")
            .bind(banner_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::NotFound("Banner not found".to_string()));
        }
        Ok(())
    }
}

fn banner_from_row(row: &SqliteRow) -> MarketResult<Banner> {
    let media_type: String = row.try_get("media_type")?;

    Ok(Banner {
        banner_id: row.try_get("banner_id")?,
        title: row.try_get("title")?,
        media_url: row.try_get("media_url")?,
        media_type: MediaType::from_str(&media_type)?,
        link_url: row.try_get("link_url")?,
        position: row.try_get("position")?,
        is_active: row.try_get("is_active")?,
        order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
    })
}
