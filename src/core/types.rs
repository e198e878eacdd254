//! Common types used throughout pkgcenter

use serde::{Deserialize, Serialize};

/// Derived package state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    NotInstalled,
    Installed,
    UpdateAvailable,
    Installing,
    Updating,
    Removing,
}

impl PackageState {
    /// Whether an operation is running on the package
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Installing | Self::Updating | Self::Removing)
    }
}

impl std::fmt::Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInstalled => write!(f, "not installed"),
            Self::Installed => write!(f, "installed"),
            Self::UpdateAvailable => write!(f, "update available"),
            Self::Installing => write!(f, "installing"),
            Self::Updating => write!(f, "updating"),
            Self::Removing => write!(f, "removing"),
        }
    }
}

/// Operation that can be in flight on a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Install,
    Update,
    Remove,
}

impl Operation {
    #[must_use]
    pub const fn state(self) -> PackageState {
        match self {
            Self::Install => PackageState::Installing,
            Self::Update => PackageState::Updating,
            Self::Remove => PackageState::Removing,
        }
    }
}

/// Kinds of desktop notification raised by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    UpdatesAvailable,
    RestartRequired,
}

impl NotificationKind {
    /// Stable notification id used for replacing and withdrawing
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::UpdatesAvailable => "updates",
            Self::RestartRequired => "restart",
        }
    }
}
