//! Debounced background refresh scheduling.
//!
//! Interval ticks, focus and visibility events all feed one request queue.
//! A refresh starts once the queue has been quiet for the debounce window,
//! so a focus event and a visibility event that fire together cost one
//! refresh. The scheduler never waits for the refresh it starts; overlap is
//! prevented by the target's own in-flight guard.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Default quiet period before a requested refresh runs
pub const DEFAULT_DEBOUNCE_MS: u64 = 600;

/// Default period of the automatic refresh
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// The periodic timer fired.
    Interval,
    /// The view became visible (`true`) or hidden (`false`).
    Visibility(bool),
    /// The window regained focus.
    Focus,
    /// Explicit user request.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh data was fetched and applied.
    Completed,
    /// Another refresh was already in flight; nothing was done.
    Skipped,
    /// The owner was detached before the results arrived.
    Discarded,
}

/// Something that can be refreshed in the background.
#[async_trait]
pub trait RefreshTarget: Send + Sync + 'static {
    async fn run_refresh(&self) -> RefreshOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub debounce_ms: u64,
    pub interval_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl RefreshSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Zero would spin the timer; clamp to one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Handle to the scheduler task. Dropping it stops the task, along with
/// any pending debounce and the interval timer.
pub struct RefreshScheduler {
    tx: mpsc::UnboundedSender<RefreshTrigger>,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start scheduling refreshes of `target`. Must be called inside a
    /// Tokio runtime.
    pub fn start(target: Arc<dyn RefreshTarget>, settings: RefreshSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_loop(target, rx, settings));
        info!(
            debounce_ms = settings.debounce_ms,
            interval_secs = settings.interval_secs,
            "Refresh scheduler started"
        );
        Self { tx, handle }
    }

    /// Ask for a refresh after the debounce window.
    pub fn request(&self, trigger: RefreshTrigger) {
        if trigger == RefreshTrigger::Visibility(false) {
            return;
        }
        if self.tx.send(trigger).is_err() {
            debug!(?trigger, "Refresh scheduler stopped, dropping trigger");
        }
    }

    /// Stop the scheduler and wait for its task to exit.
    pub async fn shutdown(mut self) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
        debug!("Refresh scheduler shut down");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_loop(
    target: Arc<dyn RefreshTarget>,
    mut rx: mpsc::UnboundedReceiver<RefreshTrigger>,
    settings: RefreshSettings,
) {
    let debounce = settings.debounce();
    let period = settings.interval();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            trigger = rx.recv() => match trigger {
                Some(trigger) => {
                    debug!(?trigger, "Refresh requested");
                    deadline = Some(Instant::now() + debounce);
                }
                None => break,
            },
            _ = ticker.tick() => {
                debug!(trigger = ?RefreshTrigger::Interval, "Refresh requested");
                deadline = Some(Instant::now() + debounce);
            }
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let target = Arc::clone(&target);
                tokio::spawn(async move {
                    let outcome = target.run_refresh().await;
                    debug!(?outcome, "Scheduled refresh finished");
                });
            }
        }
    }

    debug!("Refresh scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        runs: AtomicUsize,
        busy: AtomicBool,
        hold: Option<Duration>,
    }

    #[async_trait]
    impl RefreshTarget for Counter {
        async fn run_refresh(&self) -> RefreshOutcome {
            if self.busy.swap(true, Ordering::SeqCst) {
                return RefreshOutcome::Skipped;
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(hold) = self.hold {
                time::sleep(hold).await;
            }
            self.busy.store(false, Ordering::SeqCst);
            RefreshOutcome::Completed
        }
    }

    fn settings(debounce_ms: u64, interval_secs: u64) -> RefreshSettings {
        RefreshSettings {
            debounce_ms,
            interval_secs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_triggers_within_window_collapse() {
        let counter = Arc::new(Counter::default());
        let scheduler = RefreshScheduler::start(counter.clone(), settings(600, 3600));

        scheduler.request(RefreshTrigger::Focus);
        scheduler.request(RefreshTrigger::Visibility(true));
        time::sleep(Duration::from_millis(300)).await;
        scheduler.request(RefreshTrigger::Focus);
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 0, "window restarts on each trigger");

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 1);

        scheduler.request(RefreshTrigger::Manual);
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_visibility_is_ignored() {
        let counter = Arc::new(Counter::default());
        let scheduler = RefreshScheduler::start(counter.clone(), settings(600, 3600));

        scheduler.request(RefreshTrigger::Visibility(false));
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_drives_refresh() {
        let counter = Arc::new(Counter::default());
        let _scheduler = RefreshScheduler::start(counter.clone(), settings(600, 30));

        time::sleep(Duration::from_secs(29)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 1);
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_during_refresh_is_dropped() {
        let counter = Arc::new(Counter {
            hold: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let scheduler = RefreshScheduler::start(counter.clone(), settings(600, 3600));

        scheduler.request(RefreshTrigger::Focus);
        time::sleep(Duration::from_secs(1)).await;
        assert!(counter.busy.load(Ordering::SeqCst));

        // Fires while the first refresh is still holding
        scheduler.request(RefreshTrigger::Focus);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_refresh() {
        let counter = Arc::new(Counter::default());
        let scheduler = RefreshScheduler::start(counter.clone(), settings(600, 30));

        scheduler.request(RefreshTrigger::Focus);
        scheduler.shutdown().await;
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_interval_clamped() {
        assert_eq!(settings(0, 0).interval(), Duration::from_secs(1));
        assert_eq!(RefreshSettings::default().debounce(), Duration::from_millis(600));
    }
}
