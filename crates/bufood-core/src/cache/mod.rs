//! Local caching module for offline-first rendering.
//!
//! This module provides the `KeyValueStore` abstraction (a flat string
//! store, file-backed or in-memory) and the `CacheManager` that reads and
//! writes typed entries on top of it.
//!
//! Cached data types include:
//! - Favorite product and store IDs
//! - Product and store catalog snapshots
//! - Resolved favorites lists
//! - The cart

pub mod manager;
pub mod store;

pub use manager::{CacheAges, CacheManager, CachedData};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
