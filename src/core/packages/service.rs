use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::catalog::PackageCatalog;
use super::record::PackageRecord;
use super::tasks::TaskCoordinator;
use super::updates::UpdateTracker;
use crate::core::system::{InhibitGuard, SuspendInhibitor};
use crate::core::types::Operation;
use crate::core::{PkgCenterError, Result};
use crate::package_managers::{
    Backend, BackendPackage, ExitStatus, Filter, PackageId, Progress, ProgressSink,
};

/// Service for sequencing install, update and remove transactions.
///
/// Each operation holds a task slot and the record's in-flight marker for its
/// whole duration; backend errors are returned unchanged after both are
/// released.
pub struct PackageService {
    backend: Arc<dyn Backend>,
    catalog: Arc<PackageCatalog>,
    tasks: Arc<TaskCoordinator>,
    updates: Arc<UpdateTracker>,
    inhibitor: Arc<dyn SuspendInhibitor>,
}

impl PackageService {
    pub fn new(
        backend: Arc<dyn Backend>,
        catalog: Arc<PackageCatalog>,
        tasks: Arc<TaskCoordinator>,
        updates: Arc<UpdateTracker>,
        inhibitor: Arc<dyn SuspendInhibitor>,
    ) -> Self {
        Self {
            backend,
            catalog,
            tasks,
            updates,
            inhibitor,
        }
    }

    /// Install a package, falling back to other architectures once when no
    /// native build exists
    pub async fn install(
        &self,
        record: &PackageRecord,
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        let task = self.tasks.begin();
        let operation = record.begin_operation(Operation::Install)?;

        let candidates = self.resolve_for_install(record).await?;
        let ids: Vec<PackageId> = candidates.iter().map(|p| p.id.clone()).collect();
        tracing::info!("Installing {} ({} package(s))", record.component_id(), ids.len());

        let track = |p: Progress| {
            record.record_progress(p);
            progress(p);
        };
        let exit = self
            .backend
            .install(&ids, &track, cancel)
            .await
            .inspect_err(|e| tracing::warn!("Install of {} failed: {e}", record.component_id()))?;

        if exit.is_success() {
            record.set_installed(
                candidates
                    .into_iter()
                    .next()
                    .map(|p| BackendPackage::new(p.id.as_installed(), p.summary)),
            );
        }
        drop(operation);
        task.finish();
        Ok(exit)
    }

    /// Apply the record's pending updates
    pub async fn update(
        &self,
        record: &PackageRecord,
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        let task = self.tasks.begin();
        let operation = record.begin_operation(Operation::Update)?;

        let ids = record.pending_update_ids();
        if ids.is_empty() {
            tracing::debug!("{} has no pending updates", record.component_id());
            return Ok(ExitStatus::Success);
        }
        tracing::info!("Updating {} ({} package(s))", record.component_id(), ids.len());

        let track = |p: Progress| {
            record.record_progress(p);
            progress(p);
        };
        let exit = {
            let _inhibit = InhibitGuard::acquire(self.inhibitor.as_ref(), "Installing updates");
            self.backend
                .update(&ids, &track, cancel)
                .await
                .inspect_err(|e| tracing::warn!("Update of {} failed: {e}", record.component_id()))?
        };

        if exit.is_success() {
            if !record.is_os_updates()
                && let Some(id) = ids
                    .iter()
                    .find(|id| record.package_names().iter().any(|n| n == id.name()))
            {
                let summary = record.installed().map(|p| p.summary).unwrap_or_default();
                record.set_installed(Some(BackendPackage::new(id.as_installed(), summary)));
            }
            record.clear_change_information();
        }
        drop(operation);
        task.finish();

        self.refresh_update_list().await;
        Ok(exit)
    }

    /// Remove a package, resolving what is installed right before removal
    pub async fn remove(
        &self,
        record: &PackageRecord,
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        let task = self.tasks.begin();
        let operation = record.begin_operation(Operation::Remove)?;

        let installed = self
            .backend
            .resolve(Filter::installed_newest(), record.package_names())
            .await?;
        if installed.is_empty() {
            return Err(PkgCenterError::NotInstalled(record.component_id().to_string()));
        }
        let ids: Vec<PackageId> = installed.into_iter().map(|p| p.id).collect();
        tracing::info!("Removing {} ({} package(s))", record.component_id(), ids.len());

        let track = |p: Progress| {
            record.record_progress(p);
            progress(p);
        };
        let exit = self
            .backend
            .remove(&ids, &track, cancel)
            .await
            .inspect_err(|e| tracing::warn!("Removal of {} failed: {e}", record.component_id()))?;

        if exit.is_success() {
            record.set_installed(None);
            record.clear_change_information();
        }
        drop(operation);
        task.finish();

        self.refresh_update_list().await;
        Ok(exit)
    }

    /// Sync installed descriptors from the backend; returns installed records
    pub async fn load_installed(&self) -> Result<Vec<Arc<PackageRecord>>> {
        let task = self.tasks.begin();
        let packages = self.backend.get_installed(Filter::installed()).await?;
        task.finish();

        let by_name: HashMap<&str, &BackendPackage> =
            packages.iter().map(|p| (p.name(), p)).collect();
        let mut installed = Vec::new();
        for record in self.catalog.records() {
            let found = record
                .package_names()
                .iter()
                .find_map(|name| by_name.get(name.as_str()))
                .map(|p| (*p).clone());
            if found.is_some() {
                installed.push(Arc::clone(&record));
            }
            record.set_installed(found);
        }
        tracing::debug!(
            "{} of {} installed packages are cataloged",
            installed.len(),
            packages.len()
        );
        Ok(installed)
    }

    async fn resolve_for_install(&self, record: &PackageRecord) -> Result<Vec<BackendPackage>> {
        let names = record.package_names();
        let native = self.backend.resolve(Filter::newest_native(), names).await?;
        if !native.is_empty() {
            return Ok(native);
        }

        tracing::debug!(
            "No native build of {}, trying other architectures",
            record.component_id()
        );
        let foreign = self.backend.resolve(Filter::newest_foreign(), names).await?;
        if foreign.is_empty() {
            return Err(PkgCenterError::PackageNotFound(names.join(", ")));
        }
        Ok(foreign)
    }

    async fn refresh_update_list(&self) {
        if let Err(e) = self.updates.refresh().await {
            tracing::warn!("Failed to refresh the update list: {e}");
        }
    }
}
