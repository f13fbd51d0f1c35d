//! bufood core - offline-first favorites and cart state for the BU Foods
//! storefront.
//!
//! The crate keeps a customer's favorite products and stores renderable from
//! local cache, revalidates them against the backend in the background, and
//! applies favorite and cart actions optimistically.
//!
//! Entry points:
//! - `FavoritesSession`: mount a reconciler with its refresh scheduler
//! - `ClientCacheReconciler`: the view state and every user action
//! - `ApiClient` / `FileStore`: the production backend and storage

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod favorites;
pub mod models;
pub mod reconciler;
pub mod refresh;
pub mod resolve;
pub mod session;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, StorefrontApi};
pub use auth::TokenStore;
pub use cache::{CacheManager, FileStore, KeyValueStore, MemoryStore};
pub use config::Config;
pub use models::{Cart, CartItem, Entity, EntityKind, Product, Store};
pub use reconciler::{CartError, ClientCacheReconciler, FavoritesView, LoadPhase, StartMode};
pub use refresh::{RefreshOutcome, RefreshScheduler, RefreshSettings, RefreshTrigger};
pub use resolve::Resolved;
pub use session::FavoritesSession;
