//! The package client facade
//!
//! `PackageClient` is constructed once at startup through
//! [`PackageClientBuilder`] and handed to the view layer. It owns the catalog,
//! the task coordinator, the scheduler and the monitors; nothing is global.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::Result;
use super::drivers::DriverScanner;
use super::events::{CatalogEvent, ClientEvent, EventBus};
use super::fs::{FileSystem, HostFs};
use super::packages::{PackageCatalog, PackageRecord, PackageService, TaskCoordinator, UpdateTracker};
use super::restart::{RestartMonitor, RestartState};
use super::scheduler::{RefreshOutcome, SchedulerConfig, UpdateScheduler};
use super::system::{
    LogNotifier, NetworkStatus, NoopInhibitor, NotificationSink, SuspendInhibitor, SysfsNetwork,
};
use super::watch::PathWatcher;
use crate::config::Settings;
use crate::metadata::MetadataSource;
use crate::package_managers::{Backend, ExitStatus, ProgressSink};

pub struct PackageClient {
    backend: Arc<dyn Backend>,
    metadata: Arc<dyn MetadataSource>,
    settings: Settings,
    fs: Arc<dyn FileSystem>,
    events: EventBus<ClientEvent>,
    catalog: Arc<PackageCatalog>,
    tasks: Arc<TaskCoordinator>,
    updates: Arc<UpdateTracker>,
    service: Arc<PackageService>,
    scheduler: UpdateScheduler,
    restart: Arc<RestartMonitor>,
    drivers: Mutex<Vec<Arc<PackageRecord>>>,
}

impl PackageClient {
    pub fn builder(
        backend: Arc<dyn Backend>,
        metadata: Arc<dyn MetadataSource>,
    ) -> PackageClientBuilder {
        PackageClientBuilder::new(backend, metadata)
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<PackageCatalog> {
        &self.catalog
    }

    #[must_use]
    pub fn tasks(&self) -> &Arc<TaskCoordinator> {
        &self.tasks
    }

    #[must_use]
    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    /// Client-wide events: update counts, tasks finished, restart, drivers
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Catalog added/removed events
    pub fn subscribe_catalog(&self) -> broadcast::Receiver<CatalogEvent> {
        self.catalog.subscribe()
    }

    pub async fn install(
        &self,
        record: &PackageRecord,
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        self.service.install(record, progress, cancel).await
    }

    pub async fn update(
        &self,
        record: &PackageRecord,
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        self.service.update(record, progress, cancel).await
    }

    pub async fn remove(
        &self,
        record: &PackageRecord,
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        self.service.remove(record, progress, cancel).await
    }

    #[must_use]
    pub fn has_tasks(&self) -> bool {
        self.tasks.has_tasks()
    }

    pub async fn update_cache(&self, force: bool) -> RefreshOutcome {
        self.scheduler.update_cache(force).await
    }

    /// Reload the update list without touching the backend cache
    pub async fn refresh_updates(&self) -> Result<usize> {
        self.updates.refresh().await
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.update_count()
    }

    /// Sync installed state from the backend and return installed records
    pub async fn installed_packages(&self) -> Result<Vec<Arc<PackageRecord>>> {
        self.service.load_installed().await
    }

    #[must_use]
    pub fn applications_for_category(&self, category: &str) -> Vec<Arc<PackageRecord>> {
        self.catalog
            .applications_for_category(self.metadata.as_ref(), category)
    }

    #[must_use]
    pub fn search(&self, query: &str, category: Option<&str>) -> Vec<Arc<PackageRecord>> {
        self.catalog.search(self.metadata.as_ref(), query, category)
    }

    #[must_use]
    pub fn find_by_component_id(&self, id: &str) -> Option<Arc<PackageRecord>> {
        self.catalog.find_by_component_id(id)
    }

    #[must_use]
    pub fn find_by_desktop_id(&self, id: &str) -> Option<Arc<PackageRecord>> {
        self.catalog.find_by_desktop_id(id)
    }

    #[must_use]
    pub fn os_updates(&self) -> Arc<PackageRecord> {
        self.catalog.os_updates()
    }

    /// Scan the hardware for applicable drivers. Scan failures are logged
    /// and yield no drivers.
    pub async fn detect_drivers(&self) -> Vec<Arc<PackageRecord>> {
        let scanner = DriverScanner::new(Arc::clone(&self.fs), &self.settings.sysfs_devices);
        let found = match scanner.detect(self.metadata.as_ref(), &self.catalog).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Driver scan of {} failed: {e}", scanner.root().display());
                Vec::new()
            }
        };
        self.events.publish(ClientEvent::DriversDetected { count: found.len() });
        self.drivers.lock().clone_from(&found);
        found
    }

    /// Drivers found by the last scan
    #[must_use]
    pub fn drivers(&self) -> Vec<Arc<PackageRecord>> {
        self.drivers.lock().clone()
    }

    #[must_use]
    pub fn restart_required(&self) -> bool {
        self.restart.is_required()
    }

    pub async fn check_restart(&self) -> Option<RestartState> {
        self.restart.check(self.fs.as_ref()).await
    }

    /// Report package changes made outside the client. Safe to call from
    /// threads outside the runtime the client was built on.
    pub fn external_changes_observed(&self) {
        self.scheduler.external_changes_observed();
    }

    /// Watch the package databases and the restart marker.
    ///
    /// Watching stops when the returned handles are dropped.
    pub async fn start_watchers(&self) -> Result<WatchHandles> {
        let mut handles = WatchHandles::default();

        let (watcher, mut rx) = PathWatcher::start(&self.settings.package_state_paths)?;
        let service = Arc::clone(&self.service);
        let scheduler = self.scheduler.clone();
        handles.tasks.push(tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                while rx.try_recv().is_ok() {}
                tracing::debug!("Package state changed: {}", path.display());
                if let Err(e) = service.load_installed().await {
                    tracing::warn!("Failed to reload installed packages: {e}");
                }
                scheduler.external_changes_observed();
            }
        }));
        handles.watchers.push(watcher);

        self.check_restart().await;
        let (watcher, mut rx) = PathWatcher::start(&[self.settings.restart_marker.clone()])?;
        let restart = Arc::clone(&self.restart);
        let fs = Arc::clone(&self.fs);
        handles.tasks.push(tokio::spawn(async move {
            while rx.recv().await.is_some() {
                restart.check(fs.as_ref()).await;
            }
        }));
        handles.watchers.push(watcher);

        Ok(handles)
    }

    /// Stop background refreshes
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

/// Running watchers; dropping stops them
#[derive(Default)]
pub struct WatchHandles {
    watchers: Vec<PathWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchHandles {
    /// Number of paths actually watched
    #[must_use]
    pub fn watched_paths(&self) -> usize {
        self.watchers.iter().map(|w| w.targets().len()).sum()
    }
}

impl Drop for WatchHandles {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Builder for `PackageClient` with dependency injection support
pub struct PackageClientBuilder {
    backend: Arc<dyn Backend>,
    metadata: Arc<dyn MetadataSource>,
    settings: Settings,
    notifier: Option<Arc<dyn NotificationSink>>,
    network: Option<Arc<dyn NetworkStatus>>,
    inhibitor: Option<Arc<dyn SuspendInhibitor>>,
    fs: Option<Arc<dyn FileSystem>>,
    runtime: Option<Handle>,
}

impl PackageClientBuilder {
    /// Create a new builder with the required collaborators
    pub fn new(backend: Arc<dyn Backend>, metadata: Arc<dyn MetadataSource>) -> Self {
        Self {
            backend,
            metadata,
            settings: Settings::default(),
            notifier: None,
            network: None,
            inhibitor: None,
            fs: None,
            runtime: None,
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the notification sink (defaults to logging only)
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the network probe (defaults to sysfs)
    #[must_use]
    pub fn network(mut self, network: Arc<dyn NetworkStatus>) -> Self {
        self.network = Some(network);
        self
    }

    /// Set the suspend inhibitor (defaults to none)
    #[must_use]
    pub fn inhibitor(mut self, inhibitor: Arc<dyn SuspendInhibitor>) -> Self {
        self.inhibitor = Some(inhibitor);
        self
    }

    /// Set the filesystem used for scans (defaults to the host)
    #[must_use]
    pub fn filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Set the runtime for background refreshes (defaults to the one
    /// `build` runs on)
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the client and catalog the metadata's applications
    pub fn build(self) -> PackageClient {
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        let network = self
            .network
            .unwrap_or_else(|| Arc::new(SysfsNetwork::new()));
        let inhibitor = self.inhibitor.unwrap_or_else(|| Arc::new(NoopInhibitor));
        let fs = self.fs.unwrap_or_else(|| Arc::new(HostFs));
        let notifications = self.settings.notifications;

        let events = EventBus::new();
        let catalog = Arc::new(PackageCatalog::new());
        let cataloged = catalog.populate(self.metadata.components());
        tracing::debug!("Cataloged {cataloged} applications");

        let tasks = Arc::new(TaskCoordinator::new(events.clone()));
        let mut updates = UpdateTracker::new(
            Arc::clone(&self.backend),
            Arc::clone(&catalog),
            Arc::clone(&tasks),
            Arc::clone(&notifier),
            events.clone(),
        );
        let mut restart =
            RestartMonitor::new(&self.settings.restart_marker, notifier, events.clone());
        if !notifications {
            updates = updates.without_notifications();
            restart = restart.without_notifications();
        }
        let updates = Arc::new(updates);

        let service = Arc::new(PackageService::new(
            Arc::clone(&self.backend),
            Arc::clone(&catalog),
            Arc::clone(&tasks),
            Arc::clone(&updates),
            inhibitor,
        ));
        let scheduler = UpdateScheduler::new(
            Arc::clone(&self.backend),
            network,
            Arc::clone(&tasks),
            Arc::clone(&updates),
            SchedulerConfig::from(&self.settings),
        );
        if let Some(handle) = self.runtime {
            scheduler.set_runtime(handle);
        }

        PackageClient {
            backend: self.backend,
            metadata: self.metadata,
            settings: self.settings,
            fs,
            events,
            catalog,
            tasks,
            updates,
            service,
            scheduler,
            restart: Arc::new(restart),
            drivers: Mutex::new(Vec::new()),
        }
    }
}
