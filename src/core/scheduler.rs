//! Cache refresh scheduling
//!
//! At most one cache refresh runs at a time, and at most one timer is armed
//! for the next one. The idle watcher turns package changes made outside the
//! client into an opportunistic refresh once activity has settled.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::packages::{TaskCoordinator, UpdateTracker};
use super::system::NetworkStatus;
use crate::config::Settings;
use crate::package_managers::Backend;

/// Cadence between unforced cache refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Quiet period required before reacting to external package changes
pub const DEFAULT_IDLE_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub idle_debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            idle_debounce: DEFAULT_IDLE_DEBOUNCE,
        }
    }
}

impl From<&Settings> for SchedulerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: Duration::from_secs(settings.refresh_interval_secs),
            idle_debounce: Duration::from_millis(settings.idle_debounce_ms),
        }
    }
}

/// What a call to [`UpdateScheduler::update_cache`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another refresh was running; nothing was done
    AlreadyRunning,
    /// An unforced call found the next refresh already scheduled
    TimerPending,
    /// The last refresh is younger than the cadence
    NotDue,
    /// No network; nothing was scheduled
    Offline,
    /// The cache and the update list were refreshed
    Refreshed,
    /// The backend refresh failed; the timestamp is unchanged
    Failed,
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct RefreshState {
    last_cache_update: Option<Instant>,
    timer: Option<Timer>,
    generation: u64,
    in_progress: bool,
    last_external_change: Option<Instant>,
    idle_watch_running: bool,
}

struct Inner {
    backend: Arc<dyn Backend>,
    network: Arc<dyn NetworkStatus>,
    tasks: Arc<TaskCoordinator>,
    updates: Arc<UpdateTracker>,
    config: SchedulerConfig,
    state: Mutex<RefreshState>,
    shutdown: CancellationToken,
    runtime: Mutex<Option<Handle>>,
}

/// Clears the in-progress flag on every exit path
struct RefreshGuard<'a> {
    inner: &'a Inner,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.inner.state.lock().in_progress = false;
    }
}

#[derive(Clone)]
pub struct UpdateScheduler {
    inner: Arc<Inner>,
}

impl UpdateScheduler {
    pub fn new(
        backend: Arc<dyn Backend>,
        network: Arc<dyn NetworkStatus>,
        tasks: Arc<TaskCoordinator>,
        updates: Arc<UpdateTracker>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                network,
                tasks,
                updates,
                config,
                state: Mutex::new(RefreshState::default()),
                shutdown: CancellationToken::new(),
                runtime: Mutex::new(Handle::try_current().ok()),
            }),
        }
    }

    /// Runtime for background work started from threads outside any runtime
    pub fn set_runtime(&self, handle: Handle) {
        *self.inner.runtime.lock() = Some(handle);
    }

    // The calling thread's runtime first, then the configured one.
    fn runtime(&self) -> Option<Handle> {
        Handle::try_current()
            .ok()
            .or_else(|| self.inner.runtime.lock().clone())
    }

    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    /// Refresh the backend cache if due (or forced), then the update list.
    ///
    /// Background failures are logged and reported through the outcome only.
    pub async fn update_cache(&self, force: bool) -> RefreshOutcome {
        let interval = self.inner.config.interval;
        let online = self.inner.network.is_available();
        let guard = {
            let mut state = self.inner.state.lock();
            if state.in_progress {
                tracing::debug!("Cache refresh already running");
                return RefreshOutcome::AlreadyRunning;
            }
            if state.timer.is_some() {
                if !force {
                    return RefreshOutcome::TimerPending;
                }
                self.cancel_timer_locked(&mut state);
            }

            let elapsed = state.last_cache_update.map(|t| t.elapsed());
            if !force && elapsed.is_some_and(|e| e < interval) {
                let remaining = interval - elapsed.unwrap_or_default();
                tracing::debug!("Cache is fresh, next refresh in {}s", remaining.as_secs());
                self.arm_timer_locked(&mut state, remaining);
                return RefreshOutcome::NotDue;
            }

            if !online {
                tracing::info!("Network unavailable, skipping cache refresh");
                return RefreshOutcome::Offline;
            }
            state.in_progress = true;
            RefreshGuard { inner: &self.inner }
        };

        tracing::info!("Refreshing package cache (force: {force})");
        let task = self.inner.tasks.begin();
        let result = self.inner.backend.refresh_cache(force).await;
        task.finish();

        match result {
            Ok(exit) if exit.is_success() => {
                self.inner.state.lock().last_cache_update = Some(Instant::now());
            }
            Ok(exit) => {
                tracing::warn!("Cache refresh finished with {exit:?}");
                return RefreshOutcome::Failed;
            }
            Err(e) => {
                tracing::warn!("Cache refresh failed: {e}");
                return RefreshOutcome::Failed;
            }
        }

        // The update list is part of the refresh; the guard stays held.
        if let Err(e) = self.inner.updates.refresh().await {
            tracing::warn!("Failed to refresh the update list: {e}");
        }
        drop(guard);

        let mut state = self.inner.state.lock();
        self.arm_timer_locked(&mut state, interval);
        RefreshOutcome::Refreshed
    }

    /// Record that package state changed outside the client. Once tasks have
    /// been quiet for the debounce period, the cache is refreshed if due and
    /// the update list is refreshed regardless.
    ///
    /// Callable from any thread. Without a runtime to run the idle watcher
    /// on, the change is recorded and the refresh is left to the next
    /// trigger.
    pub fn external_changes_observed(&self) {
        let Some(runtime) = self.runtime() else {
            self.inner.state.lock().last_external_change = Some(Instant::now());
            tracing::warn!("No async runtime, external change not scheduled for refresh");
            return;
        };
        let _entered = runtime.enter();
        let mut state = self.inner.state.lock();
        state.last_external_change = Some(Instant::now());
        if state.idle_watch_running {
            return;
        }
        state.idle_watch_running = true;
        drop(state);

        tracing::debug!("External package change observed, waiting for idle");
        runtime.spawn(self.clone().idle_watch());
    }

    async fn idle_watch(self) {
        let debounce = self.inner.config.idle_debounce;
        loop {
            tokio::select! {
                () = self.inner.shutdown.cancelled() => {
                    self.inner.state.lock().idle_watch_running = false;
                    return;
                }
                () = tokio::time::sleep(debounce) => {}
            }
            let last_change = self.inner.state.lock().last_external_change;
            let tasks = &self.inner.tasks;
            if !tasks.has_tasks()
                && tasks.idle_for() >= debounce
                && last_change.is_none_or(|t| t.elapsed() >= debounce)
            {
                break;
            }
        }
        self.inner.state.lock().idle_watch_running = false;

        let outcome = self.update_cache(false).await;
        tracing::debug!("Idle refresh: {outcome:?}");
        if !matches!(
            outcome,
            RefreshOutcome::Refreshed | RefreshOutcome::AlreadyRunning
        ) && let Err(e) = self.inner.updates.refresh().await
        {
            tracing::warn!("Failed to refresh the update list: {e}");
        }
    }

    /// Cancel the armed timer, if any
    pub fn cancel_timer(&self) {
        let mut state = self.inner.state.lock();
        self.cancel_timer_locked(&mut state);
    }

    fn cancel_timer_locked(&self, state: &mut RefreshState) {
        if let Some(timer) = state.timer.take() {
            tracing::debug!("Cancelling refresh timer #{}", timer.generation);
            timer.handle.abort();
        }
    }

    fn arm_timer_locked(&self, state: &mut RefreshState, delay: Duration) {
        if state.timer.is_some() || state.in_progress || self.inner.shutdown.is_cancelled() {
            return;
        }
        state.generation += 1;
        let generation = state.generation;
        let handle = tokio::spawn(self.clone().fire_after(delay, generation));
        state.timer = Some(Timer { generation, handle });
    }

    // Boxed to break the update_cache -> timer -> update_cache type cycle.
    fn fire_after(self, delay: Duration, generation: u64) -> BoxFuture<'static, ()> {
        async move {
            tokio::select! {
                () = self.inner.shutdown.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            {
                let mut state = self.inner.state.lock();
                if state.timer.as_ref().is_none_or(|t| t.generation != generation) {
                    return;
                }
                state.timer = None;
            }
            let outcome = self.update_cache(true).await;
            tracing::debug!("Scheduled refresh: {outcome:?}");
        }
        .boxed()
    }

    #[must_use]
    pub fn last_cache_update(&self) -> Option<Instant> {
        self.inner.state.lock().last_cache_update
    }

    #[must_use]
    pub fn has_pending_timer(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().in_progress
    }

    /// Stop the timer and the idle watcher; later calls never arm a timer
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.cancel_timer();
    }
}
