//! Resolving favorite IDs to displayable entities.
//!
//! Resolution is cache-first: the catalog snapshot is filtered by ID, and
//! only IDs the snapshot does not know are looked up one by one. A lookup
//! that fails is replaced by a placeholder so the rendered list always has
//! one entry per requested ID.

use std::collections::HashMap;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::api::StorefrontApi;
use crate::cache::CacheManager;
use crate::models::{CatalogEntity, Product, Store};

/// Maximum concurrent per-ID lookups.
const MAX_CONCURRENT_REQUESTS: usize = 5;

/// Catalog entities the backend can list in bulk and look up by ID.
pub trait Resolvable: CatalogEntity {
    fn fetch_all(api: &dyn StorefrontApi) -> BoxFuture<'_, Result<Vec<Self>>>;

    fn fetch_one<'a>(api: &'a dyn StorefrontApi, id: &'a str) -> BoxFuture<'a, Result<Self>>;
}

impl Resolvable for Product {
    fn fetch_all(api: &dyn StorefrontApi) -> BoxFuture<'_, Result<Vec<Self>>> {
        api.fetch_all_products()
    }

    fn fetch_one<'a>(api: &'a dyn StorefrontApi, id: &'a str) -> BoxFuture<'a, Result<Self>> {
        api.fetch_product_by_id(id)
    }
}

impl Resolvable for Store {
    fn fetch_all(api: &dyn StorefrontApi) -> BoxFuture<'_, Result<Vec<Self>>> {
        api.fetch_all_stores()
    }

    fn fetch_one<'a>(api: &'a dyn StorefrontApi, id: &'a str) -> BoxFuture<'a, Result<Self>> {
        api.fetch_store_by_id(id)
    }
}

/// Outcome of resolving a list of IDs.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<E> {
    /// One entity per distinct requested ID, in request order.
    pub entities: Vec<E>,
    /// IDs that were filled with placeholders.
    pub unresolved: Vec<String>,
}

impl<E> Default for Resolved<E> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            unresolved: Vec::new(),
        }
    }
}

impl<E> Resolved<E> {
    pub fn is_partial(&self) -> bool {
        !self.unresolved.is_empty()
    }
}

/// Resolve `ids` using the cached catalog snapshot, fetching (and caching)
/// the full collection first when no snapshot exists.
///
/// Only a failed bulk fetch with no snapshot is an error; individual
/// lookups degrade to placeholders.
pub async fn resolve_entities<E: Resolvable>(
    api: &dyn StorefrontApi,
    cache: &CacheManager,
    ids: &[String],
) -> Result<Resolved<E>> {
    if ids.is_empty() {
        return Ok(Resolved::default());
    }

    let catalog = match cache.load_catalog::<E>() {
        Some(cached) => {
            debug!(kind = %E::KIND, cached = cached.data.len(), age = %cached.age_display(), "Resolving from catalog snapshot");
            cached.data
        }
        None => {
            debug!(kind = %E::KIND, "No catalog snapshot, fetching collection");
            let fresh = E::fetch_all(api).await?;
            if let Err(e) = cache.save_catalog(&fresh) {
                warn!(kind = %E::KIND, error = %e, "Failed to cache catalog snapshot");
            }
            fresh
        }
    };

    Ok(resolve_against(api, &catalog, ids).await)
}

/// Resolve `ids` against an in-memory catalog, looking up the rest by ID.
pub async fn resolve_against<E: Resolvable>(
    api: &dyn StorefrontApi,
    catalog: &[E],
    ids: &[String],
) -> Resolved<E> {
    let mut requested: Vec<&str> = Vec::with_capacity(ids.len());
    for id in ids {
        if !requested.contains(&id.as_str()) {
            requested.push(id);
        }
    }

    let by_id: HashMap<&str, &E> = catalog.iter().map(|e| (e.id(), e)).collect();
    let missing: Vec<&str> = requested
        .iter()
        .copied()
        .filter(|id| !by_id.contains_key(id))
        .collect();

    let mut fetched: HashMap<&str, Result<E>> = HashMap::new();
    if !missing.is_empty() {
        debug!(kind = %E::KIND, count = missing.len(), "Looking up entities missing from snapshot");
        // Built up front so callers' futures stay Send
        let lookups: Vec<_> = missing.iter().map(|&id| E::fetch_one(api, id)).collect();
        let results: Vec<Result<E>> = stream::iter(lookups)
            .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;
        fetched.extend(missing.iter().copied().zip(results));
    }

    let mut resolved = Resolved::default();
    for id in requested {
        if let Some(entity) = by_id.get(id) {
            resolved.entities.push((*entity).clone());
            continue;
        }
        match fetched.remove(id) {
            Some(Ok(entity)) => resolved.entities.push(entity),
            Some(Err(e)) => {
                warn!(kind = %E::KIND, id = id, error = %e, "Lookup failed, using placeholder");
                resolved.entities.push(E::placeholder(id));
                resolved.unresolved.push(id.to_string());
            }
            None => {
                resolved.entities.push(E::placeholder(id));
                resolved.unresolved.push(id.to_string());
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::MemoryStore;
    use crate::testing::{product, store, FakeApi};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_snapshot_hit_falls_back_per_id() {
        let api = FakeApi::with_catalog(vec![product("p1", "Adobo"), product("p2", "Turon")], vec![]);
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        cache.save_catalog(&[product("p1", "Adobo")]).unwrap();

        let resolved = resolve_entities::<Product>(&api, &cache, &ids(&["p1", "p2"]))
            .await
            .unwrap();

        assert_eq!(resolved.entities.len(), 2);
        assert_eq!(resolved.entities[0].name, "Adobo");
        assert_eq!(resolved.entities[1].name, "Turon");
        assert!(!resolved.is_partial());
        assert_eq!(api.calls("fetch_all_products"), 0);
        assert_eq!(api.calls("fetch_product_by_id"), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_becomes_placeholder() {
        let api = FakeApi::with_catalog(vec![product("p1", "Adobo")], vec![]);
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        cache.save_catalog(&[product("p1", "Adobo")]).unwrap();

        let resolved = resolve_entities::<Product>(&api, &cache, &ids(&["p1", "p2"]))
            .await
            .unwrap();

        assert_eq!(resolved.entities.len(), 2);
        assert_eq!(resolved.entities[0].id, "p1");
        assert_eq!(resolved.entities[1], Product::placeholder("p2"));
        assert_eq!(resolved.unresolved, vec!["p2"]);
    }

    #[tokio::test]
    async fn test_no_snapshot_fetches_and_caches_collection() {
        let api = FakeApi::with_catalog(vec![], vec![store("s1", "Kusina"), store("s2", "Cafe")]);
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));

        let resolved = resolve_entities::<Store>(&api, &cache, &ids(&["s2"])).await.unwrap();
        assert_eq!(resolved.entities, vec![store("s2", "Cafe")]);
        assert_eq!(api.calls("fetch_all_stores"), 1);
        assert_eq!(cache.load_catalog::<Store>().unwrap().data.len(), 2);

        // Second call is served from the snapshot
        resolve_entities::<Store>(&api, &cache, &ids(&["s1"])).await.unwrap();
        assert_eq!(api.calls("fetch_all_stores"), 1);
    }

    #[tokio::test]
    async fn test_bulk_failure_without_snapshot_is_error() {
        let api = FakeApi::with_catalog(vec![product("p1", "Adobo")], vec![]);
        api.fail_bulk(true);
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));

        assert!(resolve_entities::<Product>(&api, &cache, &ids(&["p1"])).await.is_err());
        assert!(cache.load_catalog::<Product>().is_none());
    }

    #[tokio::test]
    async fn test_order_follows_request_and_duplicates_collapse() {
        let api = FakeApi::with_catalog(vec![], vec![]);
        api.fail_lookup("s9");
        let catalog = vec![store("s1", "A"), store("s2", "B"), store("s3", "C")];

        let resolved = resolve_against(&api, &catalog, &ids(&["s3", "s9", "s1", "s3"])).await;
        let got: Vec<&str> = resolved.entities.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(got, vec!["s3", "s9", "s1"]);
        assert!(resolved.entities[1].is_placeholder());
    }

    #[tokio::test]
    async fn test_empty_ids_no_network() {
        let api = FakeApi::with_catalog(vec![], vec![]);
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        let resolved = resolve_entities::<Product>(&api, &cache, &[]).await.unwrap();
        assert!(resolved.entities.is_empty());
        assert_eq!(api.total_calls(), 0);
    }
}
