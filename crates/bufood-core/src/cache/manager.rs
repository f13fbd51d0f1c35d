use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Cart, CatalogEntity, EntityKind};

use super::store::KeyValueStore;

/// Consider catalog snapshots stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

/// Cart snapshot key
const CART_KEY: &str = "bufood:cart";

impl EntityKind {
    /// Key holding the favorite ID list for this kind.
    pub fn favorites_key(&self) -> &'static str {
        match self {
            EntityKind::Product => "favorites",
            EntityKind::Store => "storeFavorites",
        }
    }

    /// Key holding the full catalog snapshot for this kind.
    pub fn catalog_key(&self) -> &'static str {
        match self {
            EntityKind::Product => "bufood:products",
            EntityKind::Store => "bufood:stores",
        }
    }

    /// Key holding the last resolved favorites list for this kind.
    pub fn resolved_key(&self) -> &'static str {
        match self {
            EntityKind::Product => "bufood:favorites",
            EntityKind::Store => "bufood:favorite_stores",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Clock skew lands here too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

/// Typed access to the key-value store.
///
/// Reads never fail: a missing key, an unreadable store, or data that does
/// not parse all come back as `None` (or an empty list) and are logged.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let contents = match self.store.get(key) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read cache entry");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "Ignoring unparseable cache entry");
                None
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let contents = serde_json::to_string(value)?;
        self.store
            .set(key, &contents)
            .with_context(|| format!("Failed to write cache entry: {}", key))?;
        debug!(key = key, bytes = contents.len(), "Cache entry written");
        Ok(())
    }

    // ===== Favorite IDs =====

    /// Favorite IDs in stored order, duplicates collapsed.
    pub fn load_favorite_ids(&self, kind: EntityKind) -> Vec<String> {
        let ids: Vec<String> = self.load(kind.favorites_key()).unwrap_or_default();
        let mut unique: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        unique
    }

    pub fn save_favorite_ids(&self, kind: EntityKind, ids: &[String]) -> Result<()> {
        self.save(kind.favorites_key(), ids)
    }

    // ===== Catalog snapshots =====

    pub fn load_catalog<E: CatalogEntity>(&self) -> Option<CachedData<Vec<E>>> {
        self.load(E::KIND.catalog_key())
    }

    pub fn save_catalog<E: CatalogEntity>(&self, entities: &[E]) -> Result<()> {
        self.save(E::KIND.catalog_key(), &CachedData::new(entities))
    }

    // ===== Resolved favorites =====

    pub fn load_resolved<E: CatalogEntity>(&self) -> Option<CachedData<Vec<E>>> {
        self.load(E::KIND.resolved_key())
    }

    pub fn save_resolved<E: CatalogEntity>(&self, entities: &[E]) -> Result<()> {
        self.save(E::KIND.resolved_key(), &CachedData::new(entities))
    }

    // ===== Cart =====

    pub fn load_cart(&self) -> Option<CachedData<Cart>> {
        self.load(CART_KEY)
    }

    pub fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.save(CART_KEY, &CachedData::new(cart))
    }

    // ===== Cache Age Information =====

    pub fn get_cache_ages(&self) -> CacheAges {
        use crate::models::{Product, Store};

        let products = self.load_catalog::<Product>();
        let stores = self.load_catalog::<Store>();
        CacheAges {
            products: products.as_ref().map(|c| c.age_display()),
            stores: stores.as_ref().map(|c| c.age_display()),
            cart: self.load_cart().map(|c| c.age_display()),
            stale: products.map(|c| c.is_stale()).unwrap_or(true)
                || stores.map(|c| c.is_stale()).unwrap_or(true),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheAges {
    pub products: Option<String>,
    pub stores: Option<String>,
    pub cart: Option<String>,
    pub stale: bool,
}

impl CacheAges {
    /// First known snapshot age, products before stores before cart
    pub fn last_updated(&self) -> String {
        [&self.products, &self.stores, &self.cart]
            .into_iter()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::models::{Product, Store};
    use chrono::Duration;

    fn manager() -> (Arc<MemoryStore>, CacheManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = CacheManager::new(store.clone());
        (store, manager)
    }

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale());

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(61);
        assert!(old.is_stale());
        assert_eq!(old.age_display(), "1h ago");
    }

    #[test]
    fn test_invalid_json_loads_empty() {
        let (store, cache) = manager();
        store.set("favorites", "not json at all").unwrap();
        assert!(cache.load_favorite_ids(EntityKind::Product).is_empty());

        store.set("storeFavorites", "{\"a\":1}").unwrap();
        assert!(cache.load_favorite_ids(EntityKind::Store).is_empty());
    }

    #[test]
    fn test_duplicate_ids_collapsed() {
        let (store, cache) = manager();
        store.set("favorites", r#"["p1","p2","p1","p3","p2"]"#).unwrap();
        assert_eq!(cache.load_favorite_ids(EntityKind::Product), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_keys_are_separate_per_kind() {
        let (store, cache) = manager();
        cache
            .save_favorite_ids(EntityKind::Store, &["s1".to_string()])
            .unwrap();
        assert_eq!(store.get("storeFavorites").unwrap().as_deref(), Some(r#"["s1"]"#));
        assert!(cache.load_favorite_ids(EntityKind::Product).is_empty());
    }

    #[test]
    fn test_catalog_snapshot_round_trip() {
        let (_, cache) = manager();
        assert!(cache.load_catalog::<Store>().is_none());
        cache.save_catalog(&[Store::placeholder("s1")]).unwrap();
        let cached = cache.load_catalog::<Store>().unwrap();
        assert_eq!(cached.data, vec![Store::placeholder("s1")]);
        assert!(cache.load_catalog::<Product>().is_none());
    }

    #[test]
    fn test_cache_ages() {
        let (_, cache) = manager();
        let ages = cache.get_cache_ages();
        assert_eq!(ages.last_updated(), "never");
        assert!(ages.stale);

        cache.save_catalog(&[Product::placeholder("p1")]).unwrap();
        cache.save_catalog(&[Store::placeholder("s1")]).unwrap();
        let ages = cache.get_cache_ages();
        assert_eq!(ages.last_updated(), "just now");
        assert!(!ages.stale);
    }
}
