//! Mock backend for isolated testing and daemon dry runs
//!
//! State can be loaded from a JSON fixture so `pkgcenterd` can run without a
//! system transaction service.

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::traits::Backend;
use super::types::{
    BackendPackage, ExitStatus, Filter, PackageId, Progress, ProgressSink, TransactionStatus,
    UpdateDetail,
};
use crate::core::{PkgCenterError, Result};

/// Package state held by the mock
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockState {
    pub available: Vec<BackendPackage>,
    pub installed: Vec<BackendPackage>,
    pub updates: Vec<BackendPackage>,
    pub details: Vec<UpdateDetail>,
}

/// Kind of a recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Install,
    Update,
    Remove,
}

/// Per-method call counters
#[derive(Debug, Default)]
pub struct CallCounts {
    pub resolve: AtomicUsize,
    pub install: AtomicUsize,
    pub update: AtomicUsize,
    pub remove: AtomicUsize,
    pub get_updates: AtomicUsize,
    pub get_details: AtomicUsize,
    pub refresh_cache: AtomicUsize,
    pub get_installed: AtomicUsize,
}

impl CallCounts {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockBackend {
    state: Mutex<MockState>,
    calls: CallCounts,
    resolve_log: Mutex<Vec<Filter>>,
    transactions: Mutex<Vec<(TransactionKind, Vec<PackageId>)>>,
    fail_transactions: AtomicBool,
    fail_refresh: AtomicBool,
    latency: Mutex<Duration>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::from_state(MockState::default())
    }

    pub fn from_state(state: MockState) -> Self {
        Self {
            state: Mutex::new(state),
            calls: CallCounts::default(),
            resolve_log: Mutex::new(Vec::new()),
            transactions: Mutex::new(Vec::new()),
            fail_transactions: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Load a JSON fixture
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read backend fixture {}", path.display()))?;
        let state: MockState =
            serde_json::from_str(&data).context("Failed to parse backend fixture")?;
        tracing::debug!(
            "Mock backend loaded {} available, {} installed, {} updates",
            state.available.len(),
            state.installed.len(),
            state.updates.len()
        );
        Ok(Self::from_state(state))
    }

    /// Add a package to the remote set
    pub fn add_available(&self, id: &str, summary: &str) {
        self.state
            .lock()
            .available
            .push(BackendPackage::new(PackageId::new(id), summary));
    }

    /// Mark a package installed
    pub fn add_installed(&self, id: &str, summary: &str) {
        self.state
            .lock()
            .installed
            .push(BackendPackage::new(PackageId::new(id), summary));
    }

    /// Replace the pending update set, one detail record per update
    pub fn set_updates(&self, ids: &[&str]) {
        let mut state = self.state.lock();
        state.updates = ids
            .iter()
            .map(|id| BackendPackage::new(PackageId::new(*id), ""))
            .collect();
        state.details = ids
            .iter()
            .map(|id| {
                let mut detail = UpdateDetail::new(PackageId::new(*id));
                detail.update_text = format!("Update for {}", PackageId::new(*id).name());
                detail
            })
            .collect();
    }

    /// Configure whether install/update/remove fail
    pub fn set_fail_transactions(&self, fail: bool) {
        self.fail_transactions.store(fail, Ordering::SeqCst);
    }

    /// Configure whether cache refreshes fail
    pub fn set_fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Set artificial latency for transactions and cache refreshes
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Filters passed to `resolve`, in call order
    pub fn resolve_filters(&self) -> Vec<Filter> {
        self.resolve_log.lock().clone()
    }

    /// Transactions executed so far
    pub fn transactions(&self) -> Vec<(TransactionKind, Vec<PackageId>)> {
        self.transactions.lock().clone()
    }

    /// Names of installed packages
    pub fn installed_names(&self) -> Vec<String> {
        self.state
            .lock()
            .installed
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    async fn wait(&self, cancel: Option<&CancellationToken>) -> Result<()> {
        let latency = *self.latency.lock();
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(PkgCenterError::Cancelled);
        }
        if latency.is_zero() {
            return Ok(());
        }
        tokio::select! {
            () = cancelled => Err(PkgCenterError::Cancelled),
            () = tokio::time::sleep(latency) => Ok(()),
        }
    }

    async fn transaction(
        &self,
        kind: TransactionKind,
        ids: &[PackageId],
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        progress(Progress::new(TransactionStatus::Setup, Some(0)));
        self.wait(Some(cancel)).await?;
        if self.fail_transactions.load(Ordering::SeqCst) {
            return Err(PkgCenterError::backend(
                "transaction-failed",
                format!("{kind:?} of {} package(s) failed", ids.len()),
            ));
        }

        let running = match kind {
            TransactionKind::Install => TransactionStatus::Installing,
            TransactionKind::Update => TransactionStatus::Updating,
            TransactionKind::Remove => TransactionStatus::Removing,
        };
        progress(Progress::new(running, Some(50)));

        {
            let mut state = self.state.lock();
            for id in ids {
                match kind {
                    TransactionKind::Install | TransactionKind::Update => {
                        state.installed.retain(|p| p.name() != id.name());
                        state.updates.retain(|p| p.id != *id);
                        state.details.retain(|d| d.package_id != *id);
                        state.installed.push(BackendPackage::new(id.clone(), ""));
                    }
                    TransactionKind::Remove => {
                        state.installed.retain(|p| p.id != *id);
                        state.updates.retain(|p| p.name() != id.name());
                    }
                }
            }
        }
        self.transactions.lock().push((kind, ids.to_vec()));

        progress(Progress::new(TransactionStatus::Finished, Some(100)));
        Ok(ExitStatus::Success)
    }
}

/// Compare version strings segment by segment, numerically where both
/// segments are numbers.
///
/// Mock-only approximation for the `newest` filter. Epochs, tildes and
/// distro revision rules are not modelled; real backends order versions
/// themselves.
fn compare_versions(a: &str, b: &str) -> CmpOrdering {
    let segments = |s: &str| {
        s.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    };
    let (left, right) = (segments(a), segments(b));
    for (l, r) in left.iter().zip(&right) {
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

fn keep_newest(packages: Vec<BackendPackage>) -> Vec<BackendPackage> {
    let mut newest: HashMap<String, BackendPackage> = HashMap::new();
    let mut order = Vec::new();
    for pkg in packages {
        let name = pkg.name().to_string();
        let newer = newest
            .get(&name)
            .map(|current| compare_versions(current.version(), pkg.version()).is_lt());
        match newer {
            Some(false) => {}
            Some(true) => {
                newest.insert(name, pkg);
            }
            None => {
                order.push(name.clone());
                newest.insert(name, pkg);
            }
        }
    }
    order.into_iter().filter_map(|n| newest.remove(&n)).collect()
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn resolve(&self, filter: Filter, names: &[String]) -> Result<Vec<BackendPackage>> {
        CallCounts::bump(&self.calls.resolve);
        self.resolve_log.lock().push(filter);

        let state = self.state.lock();
        let mut candidates: Vec<BackendPackage> = Vec::new();
        for (pkg, installed) in state
            .installed
            .iter()
            .map(|p| (p, true))
            .chain(state.available.iter().map(|p| (p, false)))
        {
            if !names.iter().any(|n| n == pkg.name()) || !filter.accepts(pkg, installed) {
                continue;
            }
            if candidates.iter().all(|c| c.id != pkg.id) {
                candidates.push(pkg.clone());
            }
        }
        drop(state);

        Ok(if filter.newest {
            keep_newest(candidates)
        } else {
            candidates
        })
    }

    async fn install(
        &self,
        ids: &[PackageId],
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        CallCounts::bump(&self.calls.install);
        self.transaction(TransactionKind::Install, ids, progress, cancel)
            .await
    }

    async fn update(
        &self,
        ids: &[PackageId],
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        CallCounts::bump(&self.calls.update);
        self.transaction(TransactionKind::Update, ids, progress, cancel)
            .await
    }

    async fn remove(
        &self,
        ids: &[PackageId],
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        CallCounts::bump(&self.calls.remove);
        self.transaction(TransactionKind::Remove, ids, progress, cancel)
            .await
    }

    async fn get_updates(&self, filter: Filter) -> Result<Vec<BackendPackage>> {
        CallCounts::bump(&self.calls.get_updates);
        let state = self.state.lock();
        Ok(state
            .updates
            .iter()
            .filter(|p| filter.accepts(p, false))
            .cloned()
            .collect())
    }

    async fn get_details(&self, ids: &[PackageId]) -> Result<Vec<UpdateDetail>> {
        CallCounts::bump(&self.calls.get_details);
        let state = self.state.lock();
        Ok(state
            .details
            .iter()
            .filter(|d| ids.contains(&d.package_id))
            .cloned()
            .collect())
    }

    async fn refresh_cache(&self, _force: bool) -> Result<ExitStatus> {
        CallCounts::bump(&self.calls.refresh_cache);
        self.wait(None).await?;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(PkgCenterError::backend(
                "cannot-fetch-sources",
                "Failed to download repository metadata",
            ));
        }
        Ok(ExitStatus::Success)
    }

    async fn get_installed(&self, filter: Filter) -> Result<Vec<BackendPackage>> {
        CallCounts::bump(&self.calls.get_installed);
        let state = self.state.lock();
        Ok(state
            .installed
            .iter()
            .filter(|p| filter.accepts(p, true))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_progress(_: Progress) {}

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10", "1.9"), CmpOrdering::Greater);
        assert_eq!(compare_versions("2.0-1", "2.0-1"), CmpOrdering::Equal);
        assert_eq!(compare_versions("2.0", "2.0.1"), CmpOrdering::Less);
    }

    #[tokio::test]
    async fn test_resolve_keeps_newest() {
        let backend = MockBackend::new();
        backend.add_available("vim;9.0;noarch;extra", "Editor");
        backend.add_available("vim;9.1;noarch;extra", "Editor");

        let found = backend
            .resolve(Filter::newest_native(), &["vim".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version(), "9.1");
    }

    #[tokio::test]
    async fn test_install_marks_installed() {
        let backend = MockBackend::new();
        backend.add_available("git;2.43;noarch;extra", "VCS");
        let ids = [PackageId::new("git;2.43;noarch;extra")];

        let exit = backend
            .install(&ids, &no_progress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(exit, ExitStatus::Success);
        assert_eq!(backend.installed_names(), vec!["git".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_transaction() {
        let backend = MockBackend::new();
        let token = CancellationToken::new();
        token.cancel();

        let err = backend
            .remove(&[PackageId::new("git;1;noarch;installed")], &no_progress, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, PkgCenterError::Cancelled));
        assert!(backend.transactions().is_empty());
    }

    #[test]
    fn test_fixture_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        std::fs::write(
            &path,
            r#"{"available":[{"id":"firefox;122.0;x86_64;extra","summary":"Web browser"}],
                "updates":[{"id":"bash;5.2;x86_64;core"}]}"#,
        )
        .unwrap();

        let backend = MockBackend::load(&path).unwrap();
        let state = backend.state.lock();
        assert_eq!(state.available.len(), 1);
        assert_eq!(state.updates[0].name(), "bash");
        assert!(state.installed.is_empty());
    }
}
