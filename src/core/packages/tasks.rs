//! In-flight backend task accounting
//!
//! Every backend-facing operation holds a [`TaskGuard`] for its whole
//! duration. The guard ends the task on drop, so success, error and
//! cancellation paths all release their slot.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::core::events::{ClientEvent, EventBus};

pub struct TaskCoordinator {
    count: AtomicUsize,
    last_activity: Mutex<Instant>,
    events: EventBus<ClientEvent>,
}

impl TaskCoordinator {
    #[must_use]
    pub fn new(events: EventBus<ClientEvent>) -> Self {
        Self {
            count: AtomicUsize::new(0),
            last_activity: Mutex::new(Instant::now()),
            events,
        }
    }

    /// Start a task and refresh the activity timestamp
    pub fn begin(&self) -> TaskGuard<'_> {
        *self.last_activity.lock() = Instant::now();
        let running = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!("Task started ({running} running)");
        TaskGuard { tasks: self }
    }

    fn end(&self) {
        let previous = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                tracing::debug!("All backend tasks finished");
                self.events.publish(ClientEvent::TasksFinished);
            }
            Ok(n) => tracing::trace!("Task finished ({} running)", n - 1),
            Err(_) => panic!("task count underflow: end() without a matching begin()"),
        }
    }

    #[must_use]
    pub fn has_tasks(&self) -> bool {
        self.count() > 0
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Time of the most recent `begin()`
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }
}

/// A running task slot
#[must_use = "dropping the guard ends the task immediately"]
pub struct TaskGuard<'a> {
    tasks: &'a TaskCoordinator,
}

impl TaskGuard<'_> {
    /// End the task explicitly
    pub fn finish(self) {}
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.tasks.end();
    }
}
