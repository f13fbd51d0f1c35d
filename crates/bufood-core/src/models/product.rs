use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{first_present, CatalogEntity, EntityKind};

/// Image shown for products without one
pub const PRODUCT_PLACEHOLDER_IMAGE: &str = "https://placehold.co/600x400/orange/white?text=Product";

/// Name given to products that could not be resolved
pub const PRODUCT_PLACEHOLDER_NAME: &str = "Product";

/// Product as returned by `/products` and `/products/{id}`.
///
/// `_id` and `id` may both be present (virtual IDs), as may `name` and
/// `productName`, so each is its own field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProduct {
    #[serde(rename = "_id", default)]
    pub mongo_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "productName", default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(rename = "storeName", default)]
    pub store_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    pub image: String,
    #[serde(default)]
    pub store_name: Option<String>,
    /// Stand-in for a record that could not be resolved.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl RawProduct {
    /// Map to the canonical shape. `fallback_id` is used when the payload
    /// carries no ID of its own (single-record lookups).
    pub fn normalize(self, fallback_id: Option<&str>) -> Option<Product> {
        let fallback = fallback_id.map(str::to_string);
        let id = first_present(&[&self.mongo_id, &self.id, &fallback])?;
        Some(Product {
            name: first_present(&[&self.name, &self.product_name])
                .unwrap_or_else(|| PRODUCT_PLACEHOLDER_NAME.to_string()),
            description: self.description.unwrap_or_default(),
            price: self.price.filter(|p| p.is_finite()).unwrap_or(0.0),
            category: first_present(&[&self.category]),
            availability: first_present(&[&self.availability]),
            image: first_present(&[&self.image])
                .unwrap_or_else(|| PRODUCT_PLACEHOLDER_IMAGE.to_string()),
            store_name: first_present(&[&self.store_name]),
            placeholder: false,
            id,
        })
    }

    /// Normalize a collection record by record, dropping records that are
    /// malformed or have no ID.
    pub fn normalize_all(raw: Vec<Value>) -> Vec<Product> {
        let total = raw.len();
        let products: Vec<Product> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<RawProduct>(value) {
                Ok(p) => p.normalize(None),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed product record");
                    None
                }
            })
            .collect();
        if products.len() < total {
            warn!(dropped = total - products.len(), "Dropped unusable product records");
        }
        products
    }
}

impl Product {
    pub fn display_price(&self) -> String {
        format!("₱{:.0}", self.price)
    }

    pub fn is_available(&self) -> bool {
        self.availability
            .as_deref()
            .map(|a| !a.eq_ignore_ascii_case("unavailable"))
            .unwrap_or(true)
    }
}

impl CatalogEntity for Product {
    const KIND: EntityKind = EntityKind::Product;

    fn id(&self) -> &str {
        &self.id
    }

    fn placeholder(id: &str) -> Self {
        Product {
            id: id.to_string(),
            name: PRODUCT_PLACEHOLDER_NAME.to_string(),
            description: String::new(),
            price: 0.0,
            category: None,
            availability: None,
            image: PRODUCT_PLACEHOLDER_IMAGE.to_string(),
            store_name: None,
            placeholder: true,
        }
    }

    fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_server_payload() {
        let raw: RawProduct = serde_json::from_str(
            r#"{"_id":"p1","name":"Adobo Rice","price":85,"storeName":"Kusina","category":"Meals"}"#,
        )
        .unwrap();
        let product = raw.normalize(None).unwrap();
        assert_eq!(product.id, "p1");
        assert_eq!(product.name, "Adobo Rice");
        assert_eq!(product.store_name.as_deref(), Some("Kusina"));
        assert_eq!(product.image, PRODUCT_PLACEHOLDER_IMAGE);
        assert_eq!(product.display_price(), "₱85");
    }

    #[test]
    fn test_normalize_uses_fallback_id() {
        let raw: RawProduct = serde_json::from_str(r#"{"name":"Turon"}"#).unwrap();
        assert!(raw.clone().normalize(None).is_none());
        assert_eq!(raw.normalize(Some("p9")).unwrap().id, "p9");
    }

    #[test]
    fn test_normalize_all_drops_missing_ids() {
        let raw: Vec<Value> =
            serde_json::from_str(r#"[{"_id":"a","name":"A"},{"name":"no id"},{"id":"b"}]"#).unwrap();
        let products = RawProduct::normalize_all(raw);
        let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(products[1].name, PRODUCT_PLACEHOLDER_NAME);
        assert!(!products[1].is_placeholder());
    }

    #[test]
    fn test_both_id_fields_accepted() {
        let raw: Vec<Value> = serde_json::from_str(
            r#"[{"_id":"p1","id":"p1","name":"Adobo","productName":"Adobo Rice","price":85}]"#,
        )
        .unwrap();
        let products = RawProduct::normalize_all(raw);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, "p1");
        assert_eq!(products[0].name, "Adobo");
    }

    #[test]
    fn test_malformed_record_skipped_not_fatal() {
        let raw: Vec<Value> = serde_json::from_str(
            r#"[{"_id":"p1","name":"Adobo"},{"_id":42,"price":"free"},"junk",{"id":"p2","productName":"Turon"}]"#,
        )
        .unwrap();
        let products = RawProduct::normalize_all(raw);
        let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(products[1].name, "Turon");
    }

    #[test]
    fn test_real_product_named_like_placeholder() {
        let raw: RawProduct = serde_json::from_str(r#"{"_id":"p7","name":"Product","price":0}"#).unwrap();
        let product = raw.normalize(None).unwrap();
        assert_eq!(product.name, PRODUCT_PLACEHOLDER_NAME);
        assert_eq!(product.image, PRODUCT_PLACEHOLDER_IMAGE);
        assert!(!product.is_placeholder());
    }

    #[test]
    fn test_placeholder() {
        let p = Product::placeholder("p2");
        assert_eq!(p.id, "p2");
        assert!(p.is_placeholder());
        assert!(p.is_available());
    }
}
