//! Stale-while-revalidate reconciliation of favorites and cart state.
//!
//! `ClientCacheReconciler` owns the rendered view of a customer's favorite
//! products and stores and their cart. It renders from the local cache first,
//! revalidates against the backend in the background, and applies user
//! actions to the view before the backend confirms them.
//!
//! Load policy:
//! - cold start (no cached favorites): phase goes `Loading` → `Ready`, or
//!   `Failed` if the fetch fails
//! - warm start: cached lists are shown immediately and the caller starts a
//!   background refresh
//! - background refresh: at most one in flight, failures logged only

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::StorefrontApi;
use crate::cache::CacheManager;
use crate::favorites;
use crate::models::{Cart, CartItem, Entity, EntityKind, Product, Store};
use crate::refresh::{RefreshOutcome, RefreshTarget};
use crate::resolve::{self, Resolvable};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadPhase {
    /// Nothing loaded yet.
    #[default]
    Idle,
    /// Cold start in progress; a loading indicator is appropriate.
    Loading,
    Ready,
    /// Cold start failed with nothing cached to show.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Cold,
    Warm,
}

/// Everything a front end needs to render favorites and the cart badge.
#[derive(Debug, Clone, Default)]
pub struct FavoritesView {
    pub phase: LoadPhase,
    pub products: Vec<Product>,
    pub stores: Vec<Store>,
    pub cart: Option<Cart>,
    pub cart_count: u32,
    /// A background refresh is running; draw a skeleton, not a spinner.
    pub is_refreshing: bool,
    /// Last surfaced error, cleared by the next successful action.
    pub error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error(transparent)]
    Rejected(#[from] anyhow::Error),
}

/// Entities with a list in `FavoritesView`.
trait ViewSlot: Resolvable {
    fn slot(view: &mut FavoritesView) -> &mut Vec<Self>;
}

impl ViewSlot for Product {
    fn slot(view: &mut FavoritesView) -> &mut Vec<Self> {
        &mut view.products
    }
}

impl ViewSlot for Store {
    fn slot(view: &mut FavoritesView) -> &mut Vec<Self> {
        &mut view.stores
    }
}

/// Clears the in-flight flag on every exit path, including cancellation.
struct RefreshGuard<'a> {
    owner: &'a ClientCacheReconciler,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.owner.view.send_modify(|v| v.is_refreshing = false);
        self.owner.refreshing.store(false, Ordering::Release);
    }
}

pub struct ClientCacheReconciler {
    api: Arc<dyn StorefrontApi>,
    cache: CacheManager,
    view: watch::Sender<FavoritesView>,
    refreshing: AtomicBool,
    attached: AtomicBool,
}

impl ClientCacheReconciler {
    pub fn new(api: Arc<dyn StorefrontApi>, cache: CacheManager) -> Self {
        let (view, _) = watch::channel(FavoritesView::default());
        Self {
            api,
            cache,
            view,
            refreshing: AtomicBool::new(false),
            attached: AtomicBool::new(true),
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Current view snapshot.
    pub fn view(&self) -> FavoritesView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified on every view change.
    pub fn subscribe(&self) -> watch::Receiver<FavoritesView> {
        self.view.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Stop applying results. Refreshes still in flight are discarded when
    /// they finish.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        debug!("Reconciler detached");
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn dismiss_error(&self) {
        self.view.send_if_modified(|v| v.error.take().is_some());
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    pub fn load_favorite_ids(&self, kind: EntityKind) -> Vec<String> {
        favorites::load_favorite_ids(&self.cache, kind)
    }

    pub fn is_favorite(&self, kind: EntityKind, id: &str) -> bool {
        favorites::is_favorite(&self.cache, kind, id)
    }

    /// Toggle a favorite and update the rendered list in the same call.
    /// Returns whether `id` is now favorited.
    pub fn toggle_favorite(&self, kind: EntityKind, id: &str) -> bool {
        let favorited = favorites::toggle_favorite(&self.cache, kind, id);
        match kind {
            EntityKind::Product => self.apply_toggle::<Product>(id, favorited),
            EntityKind::Store => self.apply_toggle::<Store>(id, favorited),
        }
        favorited
    }

    fn apply_toggle<E: ViewSlot>(&self, id: &str, favorited: bool) {
        // Newly favorited entities show up right away when the snapshot knows them
        let entity = if favorited {
            self.cache
                .load_catalog::<E>()
                .and_then(|c| c.data.into_iter().find(|e| e.id() == id))
        } else {
            None
        };
        if favorited && entity.is_none() {
            debug!(kind = %E::KIND, id = id, "Favorite not in snapshot, will resolve on next refresh");
        }

        let mut updated = None;
        self.view.send_modify(|v| {
            let ready = v.phase == LoadPhase::Ready;
            let list = E::slot(v);
            match entity {
                Some(entity) if !list.iter().any(|e| e.id() == id) => list.push(entity),
                Some(_) => {}
                None if !favorited => list.retain(|e| e.id() != id),
                None => {}
            }
            if ready {
                updated = Some(list.clone());
            }
        });

        // A list that was never loaded must not be cached as complete
        if let Some(list) = updated {
            if let Err(e) = self.cache.save_resolved(&list) {
                warn!(kind = %E::KIND, error = %e, "Failed to cache favorites list");
            }
        }
    }

    /// Resolve IDs to entities, cache-first, with placeholders for lookups
    /// that fail. Errors only when there is no snapshot and the bulk fetch
    /// fails.
    pub async fn resolve_entities(&self, kind: EntityKind, ids: &[String]) -> Result<Vec<Entity>> {
        let api = self.api.as_ref();
        let entities = match kind {
            EntityKind::Product => resolve::resolve_entities::<Product>(api, &self.cache, ids)
                .await?
                .entities
                .into_iter()
                .map(Entity::from)
                .collect(),
            EntityKind::Store => resolve::resolve_entities::<Store>(api, &self.cache, ids)
                .await?
                .entities
                .into_iter()
                .map(Entity::from)
                .collect(),
        };
        Ok(entities)
    }

    // =========================================================================
    // Loading and refresh
    // =========================================================================

    /// Render from cache if possible; otherwise fetch with a visible
    /// loading phase. On `Warm` the caller should start a background refresh.
    pub async fn initial_load(&self) -> StartMode {
        let products = self.cache.load_resolved::<Product>();
        let stores = self.cache.load_resolved::<Store>();
        let cart = self.cache.load_cart().map(|c| c.data);

        if products.is_some() || stores.is_some() {
            let cached_at = products
                .as_ref()
                .map(|c| c.cached_at)
                .into_iter()
                .chain(stores.as_ref().map(|c| c.cached_at))
                .max();
            info!(
                products = products.as_ref().map(|c| c.data.len()).unwrap_or(0),
                stores = stores.as_ref().map(|c| c.data.len()).unwrap_or(0),
                "Warm start from cached favorites"
            );
            self.view.send_modify(|v| {
                v.products = products.map(|c| c.data).unwrap_or_default();
                v.stores = stores.map(|c| c.data).unwrap_or_default();
                v.cart_count = cart.as_ref().map(Cart::item_count).unwrap_or(0);
                v.cart = cart;
                v.last_refreshed = cached_at;
                v.phase = LoadPhase::Ready;
            });
            return StartMode::Warm;
        }

        info!("Cold start, no cached favorites");
        self.view.send_modify(|v| {
            v.cart_count = cart.as_ref().map(Cart::item_count).unwrap_or(0);
            v.cart = cart;
            v.phase = LoadPhase::Loading;
        });

        let (products, stores, cart) = tokio::join!(
            self.refresh_kind::<Product>(),
            self.refresh_kind::<Store>(),
            self.api.get_cart(),
        );

        if !self.is_attached() {
            debug!("Detached during cold start, discarding results");
            return StartMode::Cold;
        }

        let mut failures = Vec::new();
        match products {
            Ok(list) => self.apply_fresh(list),
            Err(e) => {
                error!(error = %e, "Failed to load favorite products");
                failures.push(format!("products: {}", e));
            }
        }
        match stores {
            Ok(list) => self.apply_fresh(list),
            Err(e) => {
                error!(error = %e, "Failed to load favorite stores");
                failures.push(format!("stores: {}", e));
            }
        }
        // The cart badge is secondary; it never fails the load
        match cart {
            Ok(cart) => self.apply_cart(cart),
            Err(e) => debug!(error = %e, "Cart fetch failed during cold start"),
        }

        self.view.send_modify(|v| {
            if failures.is_empty() {
                v.phase = LoadPhase::Ready;
                v.error = None;
                v.last_refreshed = Some(Utc::now());
            } else {
                let message = format!("Failed to load favorites ({})", failures.join("; "));
                v.phase = LoadPhase::Failed(message.clone());
                v.error = Some(message);
            }
        });
        StartMode::Cold
    }

    /// Revalidate everything in the background.
    ///
    /// Returns `Skipped` without touching the network when a refresh is
    /// already running, and `Discarded` when detached.
    pub async fn run_refresh(&self) -> RefreshOutcome {
        if !self.is_attached() {
            return RefreshOutcome::Discarded;
        }
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        }
        let _guard = RefreshGuard { owner: self };
        self.view.send_modify(|v| v.is_refreshing = true);
        info!("Background refresh started");

        let (products, stores, cart) = tokio::join!(
            self.refresh_kind::<Product>(),
            self.refresh_kind::<Store>(),
            self.api.get_cart(),
        );

        if !self.is_attached() {
            debug!("Detached during refresh, discarding results");
            return RefreshOutcome::Discarded;
        }

        let mut complete = true;
        match products {
            Ok(list) => self.apply_fresh(list),
            Err(e) => {
                warn!(error = %e, "Background refresh of products failed");
                complete = false;
            }
        }
        match stores {
            Ok(list) => self.apply_fresh(list),
            Err(e) => {
                warn!(error = %e, "Background refresh of stores failed");
                complete = false;
            }
        }
        match cart {
            Ok(cart) => self.apply_cart(cart),
            Err(e) => warn!(error = %e, "Background refresh of cart failed"),
        }

        if complete {
            self.view.send_modify(|v| {
                v.phase = LoadPhase::Ready;
                if matches!(v.error.as_deref(), Some(m) if m.starts_with("Failed to load favorites")) {
                    v.error = None;
                }
                v.last_refreshed = Some(Utc::now());
            });
        }
        info!(complete, "Background refresh complete");
        RefreshOutcome::Completed
    }

    /// Refresh the snapshot for `E` from the network and resolve the current
    /// favorite IDs against it. A stale snapshot is used if the fetch fails.
    async fn refresh_kind<E: ViewSlot>(&self) -> Result<Vec<E>> {
        let ids = self.cache.load_favorite_ids(E::KIND);
        if ids.is_empty() {
            debug!(kind = %E::KIND, "No favorites, skipping fetch");
            return Ok(Vec::new());
        }

        let api = self.api.as_ref();
        let catalog = match E::fetch_all(api).await {
            Ok(fresh) => {
                if let Err(e) = self.cache.save_catalog(&fresh) {
                    warn!(kind = %E::KIND, error = %e, "Failed to cache catalog snapshot");
                }
                fresh
            }
            Err(e) => match self.cache.load_catalog::<E>() {
                Some(cached) => {
                    warn!(kind = %E::KIND, error = %e, age = %cached.age_display(), "Catalog fetch failed, using snapshot");
                    cached.data
                }
                None => return Err(e),
            },
        };

        let resolved = resolve::resolve_against(api, &catalog, &ids).await;
        if resolved.is_partial() {
            warn!(kind = %E::KIND, unresolved = resolved.unresolved.len(), "Some favorites resolved to placeholders");
        }
        Ok(resolved.entities)
    }

    /// Swap in fresh entities. The favorite IDs are re-read here so toggles
    /// made while the fetch was running win over the fetched list.
    fn apply_fresh<E: ViewSlot>(&self, fresh: Vec<E>) {
        let ids = self.cache.load_favorite_ids(E::KIND);
        let mut merged = Vec::with_capacity(ids.len());
        self.view.send_modify(|v| {
            let current = E::slot(v);
            for id in &ids {
                let entity = fresh
                    .iter()
                    .find(|e| e.id() == id)
                    .or_else(|| current.iter().find(|e| e.id() == id));
                if let Some(entity) = entity {
                    merged.push(entity.clone());
                }
            }
            *current = merged.clone();
        });
        debug!(kind = %E::KIND, count = merged.len(), "Favorites list updated");
        if let Err(e) = self.cache.save_resolved(&merged) {
            warn!(kind = %E::KIND, error = %e, "Failed to cache favorites list");
        }
    }

    fn apply_cart(&self, cart: Cart) {
        if let Err(e) = self.cache.save_cart(&cart) {
            warn!(error = %e, "Failed to cache cart");
        }
        self.view.send_modify(|v| {
            v.cart_count = cart.item_count();
            v.cart = Some(cart);
        });
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Resync the cart from the backend; failures are logged only.
    pub async fn refresh_cart(&self) {
        if !self.is_attached() {
            return;
        }
        match self.api.get_cart().await {
            Ok(cart) if self.is_attached() => self.apply_cart(cart),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Cart resync failed"),
        }
    }

    pub async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let known = self
            .cache
            .load_catalog::<Product>()
            .and_then(|c| c.data.into_iter().find(|p| p.id == product_id));
        let id = product_id.to_string();

        self.mutate_cart(
            "add item to cart",
            move |v| {
                v.cart_count = v.cart_count.saturating_add(quantity);
                let Some(cart) = v.cart.as_mut() else { return };
                match cart.quantity_of(&id) {
                    Some(current) => *cart = cart.with_quantity(&id, current.saturating_add(quantity)),
                    None => {
                        if let Some(product) = known {
                            cart.items.push(CartItem { product, quantity });
                        }
                    }
                }
            },
            self.api.add_item(product_id, quantity),
        )
        .await
    }

    /// Set a line's quantity. Quantities below 1 are rejected locally.
    pub async fn update_quantity(&self, product_id: &str, quantity: u32) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let id = product_id.to_string();
        self.mutate_cart(
            "update quantity",
            move |v| {
                if let Some(cart) = v.cart.as_mut() {
                    *cart = cart.with_quantity(&id, quantity);
                    v.cart_count = cart.item_count();
                }
            },
            self.api.update_item_quantity(product_id, quantity),
        )
        .await
    }

    pub async fn remove_from_cart(&self, product_id: &str) -> Result<(), CartError> {
        let id = product_id.to_string();
        self.mutate_cart(
            "remove item from cart",
            move |v| {
                if let Some(cart) = v.cart.as_mut() {
                    *cart = cart.without(&id);
                    v.cart_count = cart.item_count();
                }
            },
            self.api.remove_item(product_id),
        )
        .await
    }

    pub async fn clear_cart(&self) -> Result<(), CartError> {
        self.mutate_cart(
            "clear cart",
            |v| {
                v.cart = Some(Cart::default());
                v.cart_count = 0;
            },
            self.api.clear_cart(),
        )
        .await
    }

    /// Apply `optimistic` to the view now, then confirm with `call`.
    /// A rejected call restores the previous cart before resyncing.
    async fn mutate_cart<F, Fut>(&self, action: &'static str, optimistic: F, call: Fut) -> Result<(), CartError>
    where
        F: FnOnce(&mut FavoritesView) + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let (previous_cart, previous_count) = {
            let v = self.view.borrow();
            (v.cart.clone(), v.cart_count)
        };

        self.view.send_modify(|v| {
            optimistic(v);
            v.error = None;
        });
        self.persist_cart();

        match call.await {
            Ok(()) => {
                debug!(action = action, "Cart change confirmed");
                self.refresh_cart().await;
                Ok(())
            }
            Err(e) => {
                error!(action = action, error = %e, "Cart change rejected, reverting");
                let message = format!("Failed to {}: {}", action, e);
                self.view.send_modify(|v| {
                    v.cart = previous_cart;
                    v.cart_count = previous_count;
                    v.error = Some(message);
                });
                self.persist_cart();
                self.refresh_cart().await;
                Err(CartError::Rejected(e))
            }
        }
    }

    fn persist_cart(&self) {
        let cart = self.view.borrow().cart.clone();
        if let Some(cart) = cart {
            if let Err(e) = self.cache.save_cart(&cart) {
                warn!(error = %e, "Failed to cache cart");
            }
        }
    }
}

#[async_trait]
impl RefreshTarget for ClientCacheReconciler {
    async fn run_refresh(&self) -> RefreshOutcome {
        ClientCacheReconciler::run_refresh(self).await
    }
}
