//! Package transaction backend trait definition

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::{BackendPackage, ExitStatus, Filter, PackageId, ProgressSink, UpdateDetail};
use crate::core::Result;

/// Trait for the system service that executes package transactions
///
/// Every call may suspend. Transaction calls receive the caller's
/// cancellation token and must stop with [`crate::core::PkgCenterError::Cancelled`]
/// once it fires.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &'static str;

    /// Look up packages by name
    async fn resolve(&self, filter: Filter, names: &[String]) -> Result<Vec<BackendPackage>>;

    /// Install packages
    async fn install(
        &self,
        ids: &[PackageId],
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus>;

    /// Update packages to the given versions
    async fn update(
        &self,
        ids: &[PackageId],
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus>;

    /// Remove packages
    async fn remove(
        &self,
        ids: &[PackageId],
        progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus>;

    /// List pending updates
    async fn get_updates(&self, filter: Filter) -> Result<Vec<BackendPackage>>;

    /// Fetch detail records for the given updates
    async fn get_details(&self, ids: &[PackageId]) -> Result<Vec<UpdateDetail>>;

    /// Refresh the remote metadata cache
    async fn refresh_cache(&self, force: bool) -> Result<ExitStatus>;

    /// List installed packages
    async fn get_installed(&self, filter: Filter) -> Result<Vec<BackendPackage>>;
}
