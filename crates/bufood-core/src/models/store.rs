use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{first_present, CatalogEntity, EntityKind};

pub const STORE_PLACEHOLDER_IMAGE: &str =
    "https://via.placeholder.com/300x200/f0f0f0/cccccc?text=Store";

pub const STORE_PLACEHOLDER_NAME: &str = "Store";

/// Store as returned by `/store` and `/store/view/{id}`.
/// Sellers fill in different fields, so names and images come from
/// several possible keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStore {
    #[serde(rename = "_id", default)]
    pub mongo_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "storeName", default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(rename = "bannerImage", default)]
    pub banner_image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl RawStore {
    pub fn normalize(self, fallback_id: Option<&str>) -> Option<Store> {
        let fallback = fallback_id.map(str::to_string);
        let id = first_present(&[&self.mongo_id, &self.id, &fallback])?;
        Some(Store {
            name: first_present(&[&self.store_name, &self.name])
                .unwrap_or_else(|| STORE_PLACEHOLDER_NAME.to_string()),
            image: first_present(&[&self.image, &self.logo, &self.banner_image])
                .unwrap_or_else(|| STORE_PLACEHOLDER_IMAGE.to_string()),
            description: self.description.unwrap_or_default(),
            placeholder: false,
            id,
        })
    }

    pub fn normalize_all(raw: Vec<Value>) -> Vec<Store> {
        let total = raw.len();
        let stores: Vec<Store> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<RawStore>(value) {
                Ok(s) => s.normalize(None),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed store record");
                    None
                }
            })
            .collect();
        if stores.len() < total {
            warn!(dropped = total - stores.len(), "Dropped unusable store records");
        }
        stores
    }
}

impl CatalogEntity for Store {
    const KIND: EntityKind = EntityKind::Store;

    fn id(&self) -> &str {
        &self.id
    }

    fn placeholder(id: &str) -> Self {
        Store {
            id: id.to_string(),
            name: STORE_PLACEHOLDER_NAME.to_string(),
            image: STORE_PLACEHOLDER_IMAGE.to_string(),
            description: String::new(),
            placeholder: true,
        }
    }

    fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}
