//! Package transaction backends

pub mod mock;
mod traits;
pub mod types;

pub use mock::{MockBackend, MockState, TransactionKind};
pub use traits::Backend;
pub use types::{
    ArchFilter, BackendPackage, ExitStatus, Filter, PackageId, Progress, ProgressSink,
    TransactionStatus, UpdateDetail, is_native_arch,
};
