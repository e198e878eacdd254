//! Per-package state merged from metadata and backend results

use parking_lot::Mutex;

use crate::core::types::{Operation, PackageState};
use crate::core::{PkgCenterError, Result};
use crate::metadata::{Component, ComponentKind};
use crate::package_managers::{BackendPackage, PackageId, Progress, UpdateDetail};

/// Component id of the synthetic record that collects unowned updates
pub const OS_UPDATES_ID: &str = "pkgcenter.os-updates";

/// Pending updates for a package and their detail records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeInformation {
    changes: Vec<BackendPackage>,
    details: Vec<UpdateDetail>,
    progress: Progress,
}

impl ChangeInformation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[must_use]
    pub fn changes(&self) -> &[BackendPackage] {
        &self.changes
    }

    #[must_use]
    pub fn details(&self) -> &[UpdateDetail] {
        &self.details
    }

    #[must_use]
    pub fn update_ids(&self) -> Vec<PackageId> {
        self.changes.iter().map(|p| p.id.clone()).collect()
    }

    /// Last progress report of a running transaction
    #[must_use]
    pub const fn progress(&self) -> Progress {
        self.progress
    }

    /// Whether any pending update asks for a reboot
    #[must_use]
    pub fn restart_required(&self) -> bool {
        self.details.iter().any(|d| d.restart_required)
    }

    fn add(&mut self, change: BackendPackage, detail: Option<UpdateDetail>) {
        if self.changes.iter().any(|c| c.id == change.id) {
            return;
        }
        self.changes.push(change);
        self.details.extend(detail);
    }

    fn clear(&mut self) {
        self.changes.clear();
        self.details.clear();
        self.progress = Progress::default();
    }
}

/// Compute the package state from its inputs
#[must_use]
pub const fn derive_state(
    installed: bool,
    has_changes: bool,
    operation: Option<Operation>,
) -> PackageState {
    match (operation, installed, has_changes) {
        (Some(op), _, _) => op.state(),
        (None, false, _) => PackageState::NotInstalled,
        (None, true, true) => PackageState::UpdateAvailable,
        (None, true, false) => PackageState::Installed,
    }
}

#[derive(Debug, Default)]
struct RecordState {
    installed: Option<BackendPackage>,
    latest_version: Option<String>,
    changes: ChangeInformation,
    operation: Option<Operation>,
}

/// A cataloged package
///
/// Identity (component, backend names) is fixed at construction. Only the
/// install/update/remove flows and the update-list refresh touch the
/// state-affecting fields.
#[derive(Debug)]
pub struct PackageRecord {
    component: Component,
    package_names: Vec<String>,
    state: Mutex<RecordState>,
}

impl PackageRecord {
    #[must_use]
    pub fn new(component: Component) -> Self {
        let package_names = component.packages.clone();
        Self {
            component,
            package_names,
            state: Mutex::new(RecordState::default()),
        }
    }

    /// The synthetic record for system updates no cataloged package owns.
    /// The operating system is always installed.
    #[must_use]
    pub fn os_updates() -> Self {
        let component = Component::new(OS_UPDATES_ID, "Operating System Updates")
            .with_summary("Updates to system components")
            .with_kind(ComponentKind::OsUpdates);
        let record = Self::new(component);
        record.state.lock().installed = Some(BackendPackage::new(
            PackageId::from_parts("os", "", "", "installed"),
            "Operating system",
        ));
        record
    }

    #[must_use]
    pub const fn component(&self) -> &Component {
        &self.component
    }

    #[must_use]
    pub fn component_id(&self) -> &str {
        &self.component.id
    }

    #[must_use]
    pub fn package_names(&self) -> &[String] {
        &self.package_names
    }

    #[must_use]
    pub fn is_os_updates(&self) -> bool {
        self.component.kind == ComponentKind::OsUpdates
    }

    #[must_use]
    pub fn state(&self) -> PackageState {
        let state = self.state.lock();
        derive_state(
            state.installed.is_some(),
            !state.changes.is_empty(),
            state.operation,
        )
    }

    #[must_use]
    pub fn installed(&self) -> Option<BackendPackage> {
        self.state.lock().installed.clone()
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.state.lock().installed.is_some()
    }

    #[must_use]
    pub fn latest_version(&self) -> Option<String> {
        self.state.lock().latest_version.clone()
    }

    #[must_use]
    pub fn change_information(&self) -> ChangeInformation {
        self.state.lock().changes.clone()
    }

    #[must_use]
    pub fn pending_update_ids(&self) -> Vec<PackageId> {
        self.state.lock().changes.update_ids()
    }

    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        self.state.lock().operation
    }

    pub(crate) fn set_installed(&self, installed: Option<BackendPackage>) {
        let mut state = self.state.lock();
        if let Some(pkg) = &installed
            && state.latest_version.is_none()
        {
            state.latest_version = Some(pkg.version().to_string());
        }
        state.installed = installed;
    }

    pub(crate) fn add_change(&self, change: BackendPackage, detail: Option<UpdateDetail>) {
        let mut state = self.state.lock();
        if !self.is_os_updates() {
            state.latest_version = Some(change.version().to_string());
        }
        state.changes.add(change, detail);
    }

    pub(crate) fn clear_change_information(&self) {
        let mut state = self.state.lock();
        state.changes.clear();
        if !self.is_os_updates() {
            state.latest_version = state.installed.as_ref().map(|p| p.version().to_string());
        }
    }

    pub(crate) fn record_progress(&self, progress: Progress) {
        self.state.lock().changes.progress = progress;
    }

    /// Mark an operation in flight until the guard drops
    pub(crate) fn begin_operation(&self, operation: Operation) -> Result<OperationGuard<'_>> {
        let mut state = self.state.lock();
        if let Some(running) = state.operation {
            tracing::debug!(
                "{} already has {running:?} in flight, refusing {operation:?}",
                self.component.id
            );
            return Err(PkgCenterError::OperationInProgress(self.component.id.clone()));
        }
        state.operation = Some(operation);
        Ok(OperationGuard { record: self })
    }
}

/// In-flight marker on a record, cleared on drop
pub(crate) struct OperationGuard<'a> {
    record: &'a PackageRecord,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.record.state.lock().operation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_managers::TransactionStatus;

    fn firefox() -> PackageRecord {
        PackageRecord::new(Component::new("org.mozilla.firefox", "Firefox").with_packages(&["firefox"]))
    }

    fn pkg(id: &str) -> BackendPackage {
        BackendPackage::new(PackageId::new(id), "")
    }

    #[test]
    fn test_derive_state_table() {
        assert_eq!(derive_state(false, false, None), PackageState::NotInstalled);
        assert_eq!(derive_state(false, true, None), PackageState::NotInstalled);
        assert_eq!(derive_state(true, false, None), PackageState::Installed);
        assert_eq!(derive_state(true, true, None), PackageState::UpdateAvailable);
        assert_eq!(
            derive_state(false, false, Some(Operation::Install)),
            PackageState::Installing
        );
        assert_eq!(
            derive_state(true, true, Some(Operation::Update)),
            PackageState::Updating
        );
        assert_eq!(
            derive_state(true, false, Some(Operation::Remove)),
            PackageState::Removing
        );
    }

    #[test]
    fn test_state_follows_inputs() {
        let record = firefox();
        assert_eq!(record.state(), PackageState::NotInstalled);

        record.set_installed(Some(pkg("firefox;121.0;x86_64;installed")));
        assert_eq!(record.state(), PackageState::Installed);
        assert_eq!(record.latest_version().as_deref(), Some("121.0"));

        record.add_change(pkg("firefox;122.0;x86_64;extra"), None);
        assert_eq!(record.state(), PackageState::UpdateAvailable);
        assert_eq!(record.latest_version().as_deref(), Some("122.0"));

        record.clear_change_information();
        assert_eq!(record.state(), PackageState::Installed);
        assert_eq!(record.latest_version().as_deref(), Some("121.0"));
    }

    #[test]
    fn test_operation_guard_is_exclusive() {
        let record = firefox();
        let guard = record.begin_operation(Operation::Install).unwrap();
        assert_eq!(record.state(), PackageState::Installing);
        assert!(matches!(
            record.begin_operation(Operation::Remove),
            Err(PkgCenterError::OperationInProgress(_))
        ));
        drop(guard);
        assert_eq!(record.operation(), None);
        assert_eq!(record.state(), PackageState::NotInstalled);
    }

    #[test]
    fn test_change_information_dedupes_ids() {
        let record = firefox();
        let mut detail = UpdateDetail::new(PackageId::new("firefox;122.0;x86_64;extra"));
        detail.restart_required = true;
        record.add_change(pkg("firefox;122.0;x86_64;extra"), Some(detail.clone()));
        record.add_change(pkg("firefox;122.0;x86_64;extra"), Some(detail));

        let info = record.change_information();
        assert_eq!(info.changes().len(), 1);
        assert_eq!(info.details().len(), 1);
        assert!(info.restart_required());
    }

    #[test]
    fn test_progress_reset_on_clear() {
        let record = firefox();
        record.record_progress(Progress::new(TransactionStatus::Downloading, Some(40)));
        assert_eq!(record.change_information().progress().percentage, Some(40));
        record.clear_change_information();
        assert_eq!(record.change_information().progress(), Progress::default());
    }

    #[test]
    fn test_os_updates_record_is_installed() {
        let record = PackageRecord::os_updates();
        assert!(record.is_os_updates());
        assert!(record.package_names().is_empty());
        assert_eq!(record.state(), PackageState::Installed);
        record.add_change(pkg("linux-firmware;2024;noarch;core"), None);
        assert_eq!(record.state(), PackageState::UpdateAvailable);
        assert_eq!(record.latest_version(), None);
    }
}
