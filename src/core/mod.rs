//! Core module - package model, scheduling, and platform seams

pub mod client;
pub mod drivers;
mod error;
pub mod events;
pub mod fs;
pub mod packages;
pub mod paths;
pub mod restart;
pub mod scheduler;
pub mod system;
pub mod testing;
mod types;
pub mod watch;

pub use client::{PackageClient, PackageClientBuilder, WatchHandles};
pub use error::{PkgCenterError, Result, format_error_with_suggestion};
pub use types::*;
