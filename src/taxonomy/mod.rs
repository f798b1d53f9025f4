/// Category, city and vehicle brand reference data
///
/// The reference set is loaded once at startup, either from the built-in
/// resource or from a configured JSON file. Admin-managed categories and
/// cities are layered on top of it at read time, so the effective view
/// changes without a redeploy.

pub mod managed;

pub use managed::{
    CategoryUpdate, CityUpdate, ManagedCategory, ManagedCity, ManagedTaxonomy, NewCategory,
    NewCity,
};

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

const BUILTIN_REFERENCE: &str = include_str!("../../resources/taxonomy.json");

/// Subcategory of a listing category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: String,
    pub name: String,
}

/// Listing category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

impl Category {
    pub fn subcategory(&self, id: &str) -> Option<&Subcategory> {
        self.subcategories.iter().find(|s| s.id == id)
    }
}

/// City with its county
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    pub county: String,
}

/// Vehicle brand and its model names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub name: String,
    pub models: Vec<String>,
}

/// Static reference data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceData {
    pub categories: Vec<Category>,
    pub cities: Vec<City>,
    pub car_brands: BTreeMap<String, Brand>,
    pub moto_brands: BTreeMap<String, Brand>,
}

impl ReferenceData {
    /// Reference data compiled into the binary
    pub fn builtin() -> MarketResult<Self> {
        Self::parse(BUILTIN_REFERENCE)
    }

    /// Load from `path` when given, else fall back to the built-in set
    pub async fn load(path: Option<&Path>) -> MarketResult<Self> {
        match path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                let data = Self::parse(&raw)?;
                tracing::info!(
                    "Loaded taxonomy from {}: {} categories, {} cities",
                    path.display(),
                    data.categories.len(),
                    data.cities.len()
                );
                Ok(data)
            }
            None => Self::builtin(),
        }
    }

    fn parse(raw: &str) -> MarketResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| MarketError::Internal(format!("Invalid taxonomy data: {}", e)))
    }
}

/// Effective categories and cities at one point in time
#[derive(Debug, Clone, Default)]
pub struct TaxonomySnapshot {
    pub categories: Vec<Category>,
    pub cities: Vec<City>,
}

impl TaxonomySnapshot {
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn city(&self, id: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }

    /// Name of a subcategory within its parent category
    pub fn subcategory_name(&self, category_id: &str, subcategory_id: &str) -> Option<&str> {
        self.category(category_id)
            .and_then(|c| c.subcategory(subcategory_id))
            .map(|s| s.name.as_str())
    }
}

/// Injected provider of the effective taxonomy
#[derive(Clone)]
pub struct TaxonomyProvider {
    reference: Arc<ReferenceData>,
    managed: Arc<ManagedTaxonomy>,
}

impl TaxonomyProvider {
    pub fn new(reference: ReferenceData, db: SqlitePool) -> Self {
        Self {
            reference: Arc::new(reference),
            managed: Arc::new(ManagedTaxonomy::new(db)),
        }
    }

    /// Admin-managed overrides
    pub fn managed(&self) -> &ManagedTaxonomy {
        &self.managed
    }

    pub fn car_brands(&self) -> &BTreeMap<String, Brand> {
        &self.reference.car_brands
    }

    pub fn moto_brands(&self) -> &BTreeMap<String, Brand> {
        &self.reference.moto_brands
    }

    /// Effective categories
    pub async fn categories(&self) -> MarketResult<Vec<Category>> {
        let managed = self.managed.list_categories().await?;
        Ok(merge_categories(&self.reference.categories, managed))
    }

    /// Effective cities
    pub async fn cities(&self) -> MarketResult<Vec<City>> {
        let managed = self.managed.list_cities().await?;
        Ok(merge_cities(&self.reference.cities, managed))
    }

    /// Effective categories and cities read together
    pub async fn snapshot(&self) -> MarketResult<TaxonomySnapshot> {
        Ok(TaxonomySnapshot {
            categories: self.categories().await?,
            cities: self.cities().await?,
        })
    }
}

/// Overlay managed entries on reference entries keyed by id
///
/// A managed entry replaces the reference entry with the same id in place,
/// or hides it when inactive. Unknown ids are appended in managed order.
fn overlay<T, M>(
    reference: &[T],
    managed: Vec<M>,
    reference_id: impl Fn(&T) -> &str,
    managed_id: impl Fn(&M) -> &str,
    is_active: impl Fn(&M) -> bool,
    convert: impl Fn(M) -> T,
) -> Vec<T>
where
    T: Clone,
{
    let mut overrides: HashMap<String, M> = HashMap::new();
    let mut appended = Vec::new();

    for entry in managed {
        let id = managed_id(&entry).to_string();
        if reference.iter().any(|r| reference_id(r) == id) {
            overrides.insert(id, entry);
        } else if is_active(&entry) {
            appended.push(entry);
        }
    }

    let mut merged: Vec<T> = reference
        .iter()
        .filter_map(|r| match overrides.remove(reference_id(r)) {
            Some(entry) if is_active(&entry) => Some(convert(entry)),
            Some(_) => None,
            None => Some(r.clone()),
        })
        .collect();

    merged.extend(appended.into_iter().map(convert));
    merged
}

fn merge_categories(reference: &[Category], managed: Vec<ManagedCategory>) -> Vec<Category> {
    overlay(
        reference,
        managed,
        |c| c.id.as_str(),
        |m| m.id.as_str(),
        |m| m.is_active,
        |m| Category {
            id: m.id,
            name: m.name,
            icon: m.icon,
            color: m.color,
            subcategories: m.subcategories,
        },
    )
}

fn merge_cities(reference: &[City], managed: Vec<ManagedCity>) -> Vec<City> {
    overlay(
        reference,
        managed,
        |c| c.id.as_str(),
        |m| m.id.as_str(),
        |m| m.is_active,
        |m| City {
            id: m.id,
            name: m.name,
            county: m.region,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn managed_city(id: &str, name: &str, active: bool, order: i64) -> ManagedCity {
        ManagedCity {
            id: id.to_string(),
            name: name.to_string(),
            region: "Test".to_string(),
            is_active: active,
            order,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_builtin_reference_data() {
        let data = ReferenceData::builtin().unwrap();
        assert_eq!(data.categories.len(), 8);
        assert_eq!(data.cities.len(), 41);
        assert_eq!(data.car_brands.len(), 20);
        assert_eq!(data.moto_brands.len(), 15);

        let escorts = &data.categories[0];
        assert_eq!(escorts.id, "escorts");
        assert_eq!(escorts.color, "#D946EF");
        assert_eq!(escorts.subcategory("escorts_massage").unwrap().name, "Masaj");
        assert_eq!(data.car_brands["dacia"].models[0], "Sandero");
    }

    #[test]
    fn test_merge_replaces_hides_and_appends() {
        let reference = ReferenceData::builtin().unwrap().cities;
        let managed = vec![
            managed_city("cluj", "Cluj", true, 0),
            managed_city("iasi", "Iasi", false, 0),
            managed_city("zz_new_a", "First", true, 1),
            managed_city("zz_new_b", "Second", true, 2),
            managed_city("zz_hidden", "Hidden", false, 3),
        ];

        let merged = merge_cities(&reference, managed);

        assert_eq!(merged.len(), reference.len() - 1 + 2);
        assert_eq!(merged[1].id, "cluj");
        assert_eq!(merged[1].name, "Cluj");
        assert_eq!(merged[1].county, "Test");
        assert!(merged.iter().all(|c| c.id != "iasi" && c.id != "zz_hidden"));

        let tail: Vec<&str> = merged[merged.len() - 2..].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(tail, vec!["zz_new_a", "zz_new_b"]);
    }

    #[tokio::test]
    async fn test_provider_reflects_managed_rows() {
        let pool = db::create_memory_pool().await.unwrap();
        let provider = TaxonomyProvider::new(ReferenceData::builtin().unwrap(), pool);

        provider
            .managed()
            .create_category(NewCategory {
                id: Some("boats".to_string()),
                name: "Ambarcațiuni".to_string(),
                icon: None,
                color: None,
                subcategories: vec![],
                is_active: None,
                order: Some(9),
            })
            .await
            .unwrap();

        let snapshot = provider.snapshot().await.unwrap();
        assert_eq!(snapshot.categories.len(), 9);
        assert_eq!(snapshot.category("boats").unwrap().icon, "folder");
        assert_eq!(
            snapshot.subcategory_name("cars", "motorcycles"),
            Some("Motociclete")
        );
        assert_eq!(snapshot.city("brasov").unwrap().county, "Brașov");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.json");
        tokio::fs::write(
            &path,
            r##"{"categories":[{"id":"misc","name":"Diverse","icon":"box","color":"#000000"}],
                "cities":[],"car_brands":{},"moto_brands":{}}"##,
        )
        .await
        .unwrap();

        let data = ReferenceData::load(Some(&path)).await.unwrap();
        assert_eq!(data.categories.len(), 1);
        assert!(data.categories[0].subcategories.is_empty());

        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(ReferenceData::load(Some(&path)).await.is_err());
    }
}
