//! pkgcenter test infrastructure
//!
//! Helpers shared by the integration tests: a real sysfs-like tree on disk,
//! a client wired to the host filesystem, and event helpers.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use pkgcenter_lib::config::Settings;
use pkgcenter_lib::core::PackageClient;
use pkgcenter_lib::core::fs::HostFs;
use pkgcenter_lib::package_managers::{MockBackend, Progress};

pub use pkgcenter_lib::core::testing::*;

/// Progress sink that ignores reports
pub fn no_progress(_: Progress) {}

/// Everything currently queued on a receiver
pub fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait until an event matching `pred` arrives
pub async fn wait_for<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    timeout: Duration,
    pred: impl Fn(&T) -> bool,
) -> Option<T> {
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// A device tree on disk laid out like `/sys`
pub struct SysfsTree {
    dir: TempDir,
}

impl SysfsTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("devices")).expect("create devices dir");
        Self { dir }
    }

    /// The scan root (`<tmp>/devices`)
    pub fn devices(&self) -> PathBuf {
        self.dir.path().join("devices")
    }

    /// Add a device directory with a `modalias` file
    pub fn add_device(&self, rel: &str, alias: &str) -> PathBuf {
        let device = self.devices().join(rel);
        std::fs::create_dir_all(&device).expect("create device");
        std::fs::write(device.join("modalias"), format!("{alias}\n")).expect("write modalias");
        device
    }

    /// Add a device that only exposes its alias through `uevent`
    pub fn add_uevent_device(&self, rel: &str, alias: &str) -> PathBuf {
        let device = self.devices().join(rel);
        std::fs::create_dir_all(&device).expect("create device");
        std::fs::write(
            device.join("uevent"),
            format!("DRIVER=unknown\nMODALIAS={alias}\n"),
        )
        .expect("write uevent");
        device
    }

    /// Bind `device` to a driver directory, with or without a module link
    #[cfg(unix)]
    pub fn bind_driver(&self, device: &Path, driver: &str, loaded: bool) {
        let driver_dir = self.dir.path().join("bus/pci/drivers").join(driver);
        std::fs::create_dir_all(&driver_dir).expect("create driver dir");
        if loaded {
            let module = self.dir.path().join("module").join(driver);
            std::fs::create_dir_all(&module).expect("create module dir");
            let link = driver_dir.join("module");
            if !link.exists() {
                std::os::unix::fs::symlink(&module, link).expect("link module");
            }
        }
        std::os::unix::fs::symlink(&driver_dir, device.join("driver")).expect("link driver");
    }
}

/// Settings for a client living entirely inside `dir`
pub fn settings_in(dir: &Path) -> Settings {
    Settings {
        restart_marker: dir.join("reboot-required"),
        sysfs_devices: dir.join("devices"),
        package_state_paths: vec![dir.join("status")],
        ..Settings::default()
    }
}

/// A client on the host filesystem with scripted backend and notifier
pub struct HostClient {
    pub backend: Arc<MockBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub client: PackageClient,
}

impl HostClient {
    pub fn new(settings: Settings) -> Self {
        let backend = Arc::new(MockBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let client = PackageClient::builder(backend.clone(), Arc::new(sample_metadata()))
            .settings(settings)
            .notifier(notifier.clone())
            .network(Arc::new(StaticNetwork::default()))
            .filesystem(Arc::new(HostFs))
            .build();
        Self {
            backend,
            notifier,
            client,
        }
    }
}
