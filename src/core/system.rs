//! Platform collaborators: notifications, network state, suspend inhibition

use std::path::PathBuf;

use super::Result;
use super::types::NotificationKind;

/// Desktop notification sink. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NotificationKind, title: &str, body: &str);
    fn withdraw(&self, kind: NotificationKind);
}

/// Notification sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, kind: NotificationKind, title: &str, body: &str) {
        tracing::info!("[{}] {title}: {body}", kind.id());
    }

    fn withdraw(&self, kind: NotificationKind) {
        tracing::info!("[{}] notification withdrawn", kind.id());
    }
}

/// Network availability probe
pub trait NetworkStatus: Send + Sync {
    fn is_available(&self) -> bool;
}

/// Reports the network as up when any non-loopback interface is `up`
#[derive(Debug, Clone)]
pub struct SysfsNetwork {
    class_dir: PathBuf,
}

impl SysfsNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/sys/class/net"))
    }

    #[must_use]
    pub fn with_root(class_dir: PathBuf) -> Self {
        Self { class_dir }
    }
}

impl Default for SysfsNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkStatus for SysfsNetwork {
    fn is_available(&self) -> bool {
        let Ok(entries) = std::fs::read_dir(&self.class_dir) else {
            tracing::debug!("Cannot read {}, assuming online", self.class_dir.display());
            return true;
        };
        entries.flatten().any(|entry| {
            entry.file_name() != "lo"
                && std::fs::read_to_string(entry.path().join("operstate"))
                    .is_ok_and(|state| state.trim() == "up")
        })
    }
}

/// Platform hook that keeps the machine awake during transactions
pub trait SuspendInhibitor: Send + Sync {
    fn inhibit(&self, reason: &str) -> Result<()>;
    fn uninhibit(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInhibitor;

impl SuspendInhibitor for NoopInhibitor {
    fn inhibit(&self, _reason: &str) -> Result<()> {
        Ok(())
    }

    fn uninhibit(&self) {}
}

/// Held suspend inhibition, released on drop
#[must_use = "the inhibition is released when the guard is dropped"]
pub struct InhibitGuard<'a> {
    inhibitor: Option<&'a dyn SuspendInhibitor>,
}

impl<'a> InhibitGuard<'a> {
    /// Inhibit suspend. A failing inhibitor is logged and the transaction
    /// proceeds without it.
    pub fn acquire(inhibitor: &'a dyn SuspendInhibitor, reason: &str) -> Self {
        match inhibitor.inhibit(reason) {
            Ok(()) => Self {
                inhibitor: Some(inhibitor),
            },
            Err(e) => {
                tracing::warn!("Failed to inhibit suspend: {e}");
                Self { inhibitor: None }
            }
        }
    }

    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.inhibitor.is_some()
    }
}

impl Drop for InhibitGuard<'_> {
    fn drop(&mut self) {
        if let Some(inhibitor) = self.inhibitor.take() {
            inhibitor.uninhibit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PkgCenterError;
    use crate::core::testing::CountingInhibitor;

    struct BrokenInhibitor;

    impl SuspendInhibitor for BrokenInhibitor {
        fn inhibit(&self, _reason: &str) -> Result<()> {
            Err(PkgCenterError::backend("inhibit", "logind unavailable"))
        }

        fn uninhibit(&self) {
            panic!("uninhibit without inhibit");
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let inhibitor = CountingInhibitor::default();
        {
            let guard = InhibitGuard::acquire(&inhibitor, "test");
            assert!(guard.is_held());
            assert_eq!(inhibitor.active(), 1);
        }
        assert_eq!(inhibitor.active(), 0);
        assert_eq!(inhibitor.acquired(), 1);
    }

    #[test]
    fn test_failed_inhibit_is_not_released() {
        let guard = InhibitGuard::acquire(&BrokenInhibitor, "test");
        assert!(!guard.is_held());
    }

    #[test]
    fn test_sysfs_network_detects_up_interface() {
        let dir = tempfile::tempdir().unwrap();
        for (iface, state) in [("lo", "unknown"), ("eth0", "down"), ("wlan0", "up")] {
            std::fs::create_dir(dir.path().join(iface)).unwrap();
            std::fs::write(dir.path().join(iface).join("operstate"), format!("{state}\n")).unwrap();
        }
        assert!(SysfsNetwork::with_root(dir.path().to_path_buf()).is_available());

        std::fs::write(dir.path().join("wlan0/operstate"), "down\n").unwrap();
        assert!(!SysfsNetwork::with_root(dir.path().to_path_buf()).is_available());
    }
}
