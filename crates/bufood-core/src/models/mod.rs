//! Data models for storefront entities.
//!
//! This module contains the canonical shapes the rest of the crate works with:
//!
//! - `Product`, `Store`: catalog entities that can be favorited
//! - `Cart`, `CartItem`: the customer's cart
//! - `EntityKind`: selects which favorites list / snapshot a call targets
//!
//! Server payloads are loosely shaped (`_id` vs `id`, `storeName` vs `name`).
//! Each model has a `Raw*` counterpart that accepts every variant and a
//! normalization step that produces the canonical record before anything is
//! cached.

pub mod cart;
pub mod product;
pub mod store;

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use cart::{Cart, CartItem, CartResponse, RawCart, RawCartItem, RawCartProduct};
pub use product::{Product, RawProduct};
pub use store::{RawStore, Store};

/// Which kind of favorite a call operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Product,
    Store,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Store => "store",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "product" | "products" => Ok(EntityKind::Product),
            "store" | "stores" => Ok(EntityKind::Store),
            other => Err(format!("Unknown entity kind: {}", other)),
        }
    }
}

/// A canonical catalog record that can be favorited and cached.
pub trait CatalogEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Minimal stand-in used when the record cannot be resolved.
    fn placeholder(id: &str) -> Self;

    fn is_placeholder(&self) -> bool;
}

/// A resolved favorite of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Product(Product),
    Store(Store),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Product(p) => &p.id,
            Entity::Store(s) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Product(p) => &p.name,
            Entity::Store(s) => &s.name,
        }
    }
}

impl From<Product> for Entity {
    fn from(p: Product) -> Self {
        Entity::Product(p)
    }
}

impl From<Store> for Entity {
    fn from(s: Store) -> Self {
        Entity::Store(s)
    }
}

/// Returns the first non-empty, trimmed candidate.
pub(crate) fn first_present(candidates: &[&Option<String>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_from_str() {
        assert_eq!("product".parse::<EntityKind>(), Ok(EntityKind::Product));
        assert_eq!("Stores".parse::<EntityKind>(), Ok(EntityKind::Store));
        assert!("orders".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_first_present_skips_blank() {
        let a = Some("  ".to_string());
        let b = None;
        let c = Some("Kusina".to_string());
        assert_eq!(first_present(&[&a, &b, &c]), Some("Kusina".to_string()));
        assert_eq!(first_present(&[&a, &b]), None);
    }
}
