/// Admin-managed category and city overrides
use super::Subcategory;
use crate::{
    db,
    error::{MarketError, MarketResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Managed category row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedCategory {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub subcategories: Vec<Subcategory>,
    pub is_active: bool,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

/// Managed city row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedCity {
    pub id: String,
    pub name: String,
    pub region: String,
    pub is_active: bool,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub id: Option<String>,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
    pub is_active: Option<bool>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub subcategories: Option<Vec<Subcategory>>,
    pub is_active: Option<bool>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCity {
    pub id: Option<String>,
    pub name: String,
    pub region: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityUpdate {
    pub name: Option<String>,
    pub region: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i64>,
}

/// Store for managed taxonomy tables
pub struct ManagedTaxonomy {
    db: SqlitePool,
}

impl ManagedTaxonomy {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All managed categories, active or not, by display order
    pub async fn list_categories(&self) -> MarketResult<Vec<ManagedCategory>> {
        let rows = sqlx::query(
            "SELECT id, name, icon, color, subcategories, is_active, display_order, created_at
             FROM managed_categories ORDER BY display_order ASC, created_at ASC",
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(category_from_row).collect()
    }

    async fn find_category(&self, id: &str) -> MarketResult<Option<ManagedCategory>> {
        let row = sqlx::query(
            "SELECT id, name, icon, color, subcategories, is_active, display_order, created_at
             FROM managed_categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(category_from_row).transpose()
    }

    /// Create a managed category, returning its id
    pub async fn create_category(&self, new: NewCategory) -> MarketResult<String> {
        if new.name.trim().is_empty() {
            return Err(MarketError::Validation("Category name is required".to_string()));
        }

        let id = new
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| db::generate_id("cat", 8));

        if self.find_category(&id).await?.is_some() {
            return Err(MarketError::Validation(format!("Category {} already exists", id)));
        }

        sqlx::query(
            "INSERT INTO managed_categories (id, name, icon, color, subcategories, is_active, display_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(new.icon.unwrap_or_else(|| "folder".to_string()))
        .bind(new.color.unwrap_or_else(|| "#3B82F6".to_string()))
        .bind(encode_subcategories(&new.subcategories)?)
        .bind(new.is_active.unwrap_or(true))
        .bind(new.order.unwrap_or(0))
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        tracing::info!("Created managed category {}", id);
        Ok(id)
    }

    pub async fn update_category(&self, id: &str, update: CategoryUpdate) -> MarketResult<()> {
        let mut category = self
            .find_category(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Category not found".to_string()))?;

        if let Some(name) = update.name {
            category.name = name;
        }
        if let Some(icon) = update.icon {
            category.icon = icon;
        }
        if let Some(color) = update.color {
            category.color = color;
        }
        if let Some(subcategories) = update.subcategories {
            category.subcategories = subcategories;
        }
        if let Some(is_active) = update.is_active {
            category.is_active = is_active;
        }
        if let Some(order) = update.order {
            category.order = order;
        }

        sqlx::query(
            "UPDATE managed_categories
             SET name = ?1, icon = ?2, color = ?3, subcategories = ?4, is_active = ?5, display_order = ?6
             WHERE id = ?7",
        )
        .bind(&category.name)
        .bind(&category.icon)
        .bind(&category.color)
        .bind(encode_subcategories(&category.subcategories)?)
        .bind(category.is_active)
        .bind(category.order)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Delete a managed category unless ads still reference it
    pub async fn delete_category(&self, id: &str) -> MarketResult<()> {
        let in_use = self.count_ads("category_id", id).await?;
        if in_use > 0 {
            return Err(MarketError::Validation(format!(
                "Cannot delete: {} ads use this category",
                in_use
            )));
        }

        let result = sqlx::query("DELETE FROM managed_categories WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::NotFound("Category not found".to_string()));
        }

        tracing::info!("Deleted managed category {}", id);
        Ok(())
    }

    /// All managed cities by display order
    pub async fn list_cities(&self) -> MarketResult<Vec<ManagedCity>> {
        let rows = sqlx::query(
            "SELECT id, name, region, is_active, display_order, created_at
             FROM managed_cities ORDER BY display_order ASC, created_at ASC",
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(city_from_row).collect()
    }

    async fn find_city(&self, id: &str) -> MarketResult<Option<ManagedCity>> {
        let row = sqlx::query(
            "SELECT id, name, region, is_active, display_order, created_at
             FROM managed_cities WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(city_from_row).transpose()
    }

    /// Create a managed city; the id defaults to the slugged name
    pub async fn create_city(&self, new: NewCity) -> MarketResult<String> {
        if new.name.trim().is_empty() {
            return Err(MarketError::Validation("City name is required".to_string()));
        }

        let id = new
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| new.name.trim().to_lowercase().replace(' ', "_"));

        if self.find_city(&id).await?.is_some() {
            return Err(MarketError::Validation(format!("City {} already exists", id)));
        }

        sqlx::query(
            "INSERT INTO managed_cities (id, name, region, is_active, display_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(new.region.unwrap_or_default())
        .bind(new.is_active.unwrap_or(true))
        .bind(new.order.unwrap_or(0))
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        tracing::info!("Created managed city {}", id);
        Ok(id)
    }

    pub async fn update_city(&self, id: &str, update: CityUpdate) -> MarketResult<()> {
        let mut city = self
            .find_city(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("City not found".to_string()))?;

        if let Some(name) = update.name {
            city.name = name;
        }
        if let Some(region) = update.region {
            city.region = region;
        }
        if let Some(is_active) = update.is_active {
            city.is_active = is_active;
        }
        if let Some(order) = update.order {
            city.order = order;
        }

        sqlx::query(
            "UPDATE managed_cities SET name = ?1, region = ?2, is_active = ?3, display_order = ?4
             WHERE id = ?5",
        )
        .bind(&city.name)
        .bind(&city.region)
        .bind(city.is_active)
        .bind(city.order)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Delete a managed city unless ads still reference it
    pub async fn delete_city(&self, id: &str) -> MarketResult<()> {
        let in_use = self.count_ads("city_id", id).await?;
        if in_use > 0 {
            return Err(MarketError::Validation(format!(
                "Cannot delete: {} ads use this city",
                in_use
            )));
        }

        let result = sqlx::query("DELETE FROM managed_cities WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::NotFound("City not found".to_string()));
        }

        tracing::info!("Deleted managed city {}", id);
        Ok(())
    }

    async fn count_ads(&self, column: &'static str, id: &str) -> MarketResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM ads WHERE {} = ?1", column))
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

fn encode_subcategories(subcategories: &[Subcategory]) -> MarketResult<String> {
    serde_json::to_string(subcategories)
        .map_err(|e| MarketError::Internal(format!("Failed to encode subcategories: {}", e)))
}

fn category_from_row(row: &SqliteRow) -> MarketResult<ManagedCategory> {
    let subcategories: String = row.try_get("subcategories")?;

    Ok(ManagedCategory {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        icon: row.try_get("icon")?,
        color: row.try_get("color")?,
        subcategories: serde_json::from_str(&subcategories).unwrap_or_default(),
        is_active: row.try_get("is_active")?,
        order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
    })
}

fn city_from_row(row: &SqliteRow) -> MarketResult<ManagedCity> {
    Ok(ManagedCity {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        region: row.try_get("region")?,
        is_active: row.try_get("is_active")?,
        order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
    })
}
