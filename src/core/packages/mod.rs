//! Package catalog, per-package state, and the operation flows

pub mod catalog;
pub mod record;
pub mod service;
pub mod tasks;
pub mod updates;

pub use catalog::{PackageCatalog, PackageIndex};
pub use record::{ChangeInformation, OS_UPDATES_ID, PackageRecord, derive_state};
pub use service::PackageService;
pub use tasks::{TaskCoordinator, TaskGuard};
pub use updates::UpdateTracker;
