//! Update-list refresh
//!
//! Pulls the pending update set from the backend, merges update descriptors
//! and detail records into each owning record, and raises or withdraws the
//! "updates available" notification when the count crosses zero.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::catalog::PackageCatalog;
use super::tasks::TaskCoordinator;
use crate::core::Result;
use crate::core::events::{ClientEvent, EventBus};
use crate::core::system::NotificationSink;
use crate::core::types::NotificationKind;
use crate::package_managers::{Backend, BackendPackage, Filter, PackageId, UpdateDetail};

pub struct UpdateTracker {
    backend: Arc<dyn Backend>,
    catalog: Arc<PackageCatalog>,
    tasks: Arc<TaskCoordinator>,
    notifier: Arc<dyn NotificationSink>,
    events: EventBus<ClientEvent>,
    notifications: bool,
    update_count: AtomicUsize,
    serial: tokio::sync::Mutex<()>,
}

impl UpdateTracker {
    pub fn new(
        backend: Arc<dyn Backend>,
        catalog: Arc<PackageCatalog>,
        tasks: Arc<TaskCoordinator>,
        notifier: Arc<dyn NotificationSink>,
        events: EventBus<ClientEvent>,
    ) -> Self {
        Self {
            backend,
            catalog,
            tasks,
            notifier,
            events,
            notifications: true,
            update_count: AtomicUsize::new(0),
            serial: tokio::sync::Mutex::new(()),
        }
    }

    /// Keep counting updates but stop forwarding notifications
    #[must_use]
    pub fn without_notifications(mut self) -> Self {
        self.notifications = false;
        self
    }

    /// Number of updates seen by the last refresh
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    /// Refresh the update list; returns the new update count
    pub async fn refresh(&self) -> Result<usize> {
        let _serial = self.serial.lock().await;
        let task = self.tasks.begin();

        let updates = self.backend.get_updates(Filter::NONE).await?;
        let ids: Vec<PackageId> = updates.iter().map(|p| p.id.clone()).collect();
        let details = if ids.is_empty() {
            Vec::new()
        } else {
            self.backend.get_details(&ids).await?
        };
        task.finish();

        self.merge(&updates, details);

        let count = updates.len();
        let previous = self.update_count.swap(count, Ordering::SeqCst);
        tracing::debug!("Update list refreshed: {previous} -> {count}");
        self.announce(previous, count);
        Ok(count)
    }

    fn merge(&self, updates: &[BackendPackage], details: Vec<UpdateDetail>) {
        let os_updates = self.catalog.os_updates();
        os_updates.clear_change_information();
        for record in self.catalog.records() {
            record.clear_change_information();
        }

        let mut details: HashMap<PackageId, UpdateDetail> = details
            .into_iter()
            .map(|d| (d.package_id.clone(), d))
            .collect();
        for update in updates {
            let detail = details.remove(&update.id);
            match self.catalog.get(update.name()) {
                Some(record) => record.add_change(update.clone(), detail),
                None => {
                    tracing::trace!("{} has no catalog entry, filing under OS updates", update.id);
                    os_updates.add_change(update.clone(), detail);
                }
            }
        }
    }

    fn announce(&self, previous: usize, count: usize) {
        if previous == count {
            return;
        }
        self.events.publish(ClientEvent::UpdatesAvailable { count });
        if !self.notifications {
            return;
        }
        match (previous, count) {
            (0, _) => {
                let body = if count == 1 {
                    "1 update is available for your system".to_string()
                } else {
                    format!("{count} updates are available for your system")
                };
                self.notifier
                    .notify(NotificationKind::UpdatesAvailable, "Updates Available", &body);
            }
            (_, 0) => self.notifier.withdraw(NotificationKind::UpdatesAvailable),
            _ => {}
        }
    }
}
