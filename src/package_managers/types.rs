//! Shared backend types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend package identifier in `name;version;arch;data` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn from_parts(name: &str, version: &str, arch: &str, data: &str) -> Self {
        Self(format!("{name};{version};{arch};{data}"))
    }

    fn field(&self, index: usize) -> &str {
        self.0.split(';').nth(index).unwrap_or("")
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.field(0)
    }

    #[must_use]
    pub fn version(&self) -> &str {
        self.field(1)
    }

    #[must_use]
    pub fn arch(&self) -> &str {
        self.field(2)
    }

    /// Repository or install-state tag (`installed`, `extra`, ...)
    #[must_use]
    pub fn data(&self) -> &str {
        self.field(3)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The same package tagged as installed
    #[must_use]
    pub fn as_installed(&self) -> Self {
        Self::from_parts(self.name(), self.version(), self.arch(), "installed")
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A package as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPackage {
    pub id: PackageId,
    #[serde(default)]
    pub summary: String,
}

impl BackendPackage {
    pub fn new(id: PackageId, summary: impl Into<String>) -> Self {
        Self {
            id,
            summary: summary.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.id.name()
    }

    #[must_use]
    pub fn version(&self) -> &str {
        self.id.version()
    }
}

/// Architecture restriction applied by a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchFilter {
    #[default]
    Any,
    Native,
    Foreign,
}

/// Query filter passed to backend lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Filter {
    /// `Some(true)` = installed only, `Some(false)` = not installed only
    pub installed: Option<bool>,
    /// Keep only the newest version of each package name
    pub newest: bool,
    pub arch: ArchFilter,
}

impl Filter {
    pub const NONE: Self = Self {
        installed: None,
        newest: false,
        arch: ArchFilter::Any,
    };

    #[must_use]
    pub const fn newest_native() -> Self {
        Self {
            installed: None,
            newest: true,
            arch: ArchFilter::Native,
        }
    }

    #[must_use]
    pub const fn newest_foreign() -> Self {
        Self {
            installed: None,
            newest: true,
            arch: ArchFilter::Foreign,
        }
    }

    #[must_use]
    pub const fn installed() -> Self {
        Self {
            installed: Some(true),
            newest: false,
            arch: ArchFilter::Any,
        }
    }

    #[must_use]
    pub const fn installed_newest() -> Self {
        Self {
            installed: Some(true),
            newest: true,
            arch: ArchFilter::Any,
        }
    }

    /// Check the per-package parts of the filter. `newest` needs the whole
    /// candidate set and is applied by the backend.
    #[must_use]
    pub fn accepts(&self, package: &BackendPackage, installed: bool) -> bool {
        if self.installed.is_some_and(|want| want != installed) {
            return false;
        }
        match self.arch {
            ArchFilter::Any => true,
            ArchFilter::Native => is_native_arch(package.id.arch()),
            ArchFilter::Foreign => !is_native_arch(package.id.arch()),
        }
    }
}

/// Whether `arch` can run natively on this machine.
///
/// Architecture-independent packages count as native.
#[must_use]
pub fn is_native_arch(arch: &str) -> bool {
    if matches!(arch, "" | "noarch" | "all" | "any") {
        return true;
    }
    let native = std::env::consts::ARCH;
    if arch == native {
        return true;
    }
    // Debian-style names for the same machine architectures
    matches!(
        (native, arch),
        ("x86_64", "amd64") | ("aarch64", "arm64") | ("x86", "i386" | "i686") | ("arm", "armhf")
    )
}

/// Tri-state transaction outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitStatus {
    Success,
    Failed,
    Unknown,
}

impl ExitStatus {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Stage reported by a running transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Unknown,
    Setup,
    Waiting,
    Downloading,
    Installing,
    Updating,
    Removing,
    Cleanup,
    Finished,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "Unknown state",
            Self::Setup => "Starting",
            Self::Waiting => "Waiting",
            Self::Downloading => "Downloading",
            Self::Installing => "Installing",
            Self::Updating => "Updating",
            Self::Removing => "Removing",
            Self::Cleanup => "Cleaning up",
            Self::Finished => "Finished",
        };
        f.write_str(label)
    }
}

/// Progress report for a running transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub status: TransactionStatus,
    /// `None` when the backend cannot estimate completion
    pub percentage: Option<u8>,
}

impl Progress {
    #[must_use]
    pub const fn new(status: TransactionStatus, percentage: Option<u8>) -> Self {
        Self { status, percentage }
    }
}

/// Callback receiving transaction progress
pub type ProgressSink<'a> = dyn Fn(Progress) + Send + Sync + 'a;

/// Per-update detail record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetail {
    pub package_id: PackageId,
    #[serde(default)]
    pub update_text: String,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub issued: Option<jiff::Timestamp>,
    #[serde(default)]
    pub restart_required: bool,
}

impl UpdateDetail {
    #[must_use]
    pub fn new(package_id: PackageId) -> Self {
        Self {
            package_id,
            update_text: String::new(),
            changelog: String::new(),
            issued: None,
            restart_required: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_fields() {
        let id = PackageId::new("firefox;122.0-1;x86_64;extra");
        assert_eq!(id.name(), "firefox");
        assert_eq!(id.version(), "122.0-1");
        assert_eq!(id.arch(), "x86_64");
        assert_eq!(id.data(), "extra");
    }

    #[test]
    fn test_package_id_as_installed() {
        let id = PackageId::new("firefox;122.0;x86_64;extra");
        assert_eq!(id.as_installed().as_str(), "firefox;122.0;x86_64;installed");
    }

    #[test]
    fn test_package_id_missing_fields() {
        let id = PackageId::new("bare");
        assert_eq!(id.name(), "bare");
        assert_eq!(id.version(), "");
        assert_eq!(id.arch(), "");
    }

    #[test]
    fn test_filter_installed_restriction() {
        let pkg = BackendPackage::new(PackageId::from_parts("vim", "9.0", "noarch", "installed"), "");
        assert!(Filter::installed().accepts(&pkg, true));
        assert!(!Filter::installed().accepts(&pkg, false));
        assert!(Filter::NONE.accepts(&pkg, false));
    }

    #[test]
    fn test_filter_arch_split() {
        let native = BackendPackage::new(
            PackageId::from_parts("lib", "1", std::env::consts::ARCH, "main"),
            "",
        );
        let foreign = BackendPackage::new(PackageId::from_parts("lib", "1", "s390x-foreign", "main"), "");
        assert!(Filter::newest_native().accepts(&native, false));
        assert!(!Filter::newest_native().accepts(&foreign, false));
        assert!(Filter::newest_foreign().accepts(&foreign, false));
        assert!(!Filter::newest_foreign().accepts(&native, false));
    }
}
