//! Mount/unmount lifecycle around a reconciler and its scheduler.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::StorefrontApi;
use crate::cache::{CacheManager, KeyValueStore};
use crate::reconciler::{ClientCacheReconciler, FavoritesView, StartMode};
use crate::refresh::{RefreshScheduler, RefreshSettings, RefreshTrigger};

/// A mounted favorites screen: one reconciler plus the scheduler that keeps
/// it fresh. Unmounting (or dropping) stops all background work.
pub struct FavoritesSession {
    reconciler: Arc<ClientCacheReconciler>,
    scheduler: RefreshScheduler,
    start_mode: StartMode,
}

impl FavoritesSession {
    /// Load from cache or network and start background refreshing.
    /// Must be called inside a Tokio runtime.
    pub async fn mount(
        api: Arc<dyn StorefrontApi>,
        store: Arc<dyn KeyValueStore>,
        settings: RefreshSettings,
    ) -> Self {
        let reconciler = Arc::new(ClientCacheReconciler::new(api, CacheManager::new(store)));
        let start_mode = reconciler.initial_load().await;

        if start_mode == StartMode::Warm {
            let background = Arc::clone(&reconciler);
            tokio::spawn(async move {
                let outcome = background.run_refresh().await;
                debug!(?outcome, "Warm start refresh finished");
            });
        }

        let scheduler = RefreshScheduler::start(reconciler.clone(), settings);
        info!(?start_mode, "Favorites session mounted");

        Self {
            reconciler,
            scheduler,
            start_mode,
        }
    }

    pub fn start_mode(&self) -> StartMode {
        self.start_mode
    }

    pub fn reconciler(&self) -> &Arc<ClientCacheReconciler> {
        &self.reconciler
    }

    pub fn subscribe(&self) -> watch::Receiver<FavoritesView> {
        self.reconciler.subscribe()
    }

    pub fn trigger(&self, trigger: RefreshTrigger) {
        self.scheduler.request(trigger);
    }

    pub async fn unmount(self) {
        self.reconciler.detach();
        self.scheduler.shutdown().await;
        info!("Favorites session unmounted");
    }
}
