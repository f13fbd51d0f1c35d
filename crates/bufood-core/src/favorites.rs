//! Favorite ID sets.
//!
//! Favorites are plain ID lists in the key-value store, one per kind. They
//! are the source of truth for what is favorited; everything rendered about a
//! favorite is resolved from these IDs. Reads and writes are synchronous and
//! never touch the network.

use tracing::{debug, error};

use crate::cache::CacheManager;
use crate::models::EntityKind;

/// Favorite IDs for `kind` in stored order. Missing or corrupt data is empty.
pub fn load_favorite_ids(cache: &CacheManager, kind: EntityKind) -> Vec<String> {
    cache.load_favorite_ids(kind)
}

pub fn is_favorite(cache: &CacheManager, kind: EntityKind, id: &str) -> bool {
    cache.load_favorite_ids(kind).iter().any(|f| f == id)
}

pub fn has_favorites(cache: &CacheManager, kind: EntityKind) -> bool {
    !cache.load_favorite_ids(kind).is_empty()
}

/// Add `id` if absent, remove it if present, and persist.
///
/// Returns whether `id` is now favorited. When the write fails the stored
/// set is unchanged, so the previous membership is returned.
pub fn toggle_favorite(cache: &CacheManager, kind: EntityKind, id: &str) -> bool {
    let mut ids = cache.load_favorite_ids(kind);
    let was_favorite = match ids.iter().position(|f| f == id) {
        Some(index) => {
            ids.remove(index);
            true
        }
        None => {
            ids.push(id.to_string());
            false
        }
    };

    match cache.save_favorite_ids(kind, &ids) {
        Ok(()) => {
            debug!(kind = %kind, id = id, favorited = !was_favorite, count = ids.len(), "Favorite toggled");
            !was_favorite
        }
        Err(e) => {
            error!(kind = %kind, id = id, error = %e, "Failed to persist favorite toggle");
            was_favorite
        }
    }
}
