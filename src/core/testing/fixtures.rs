//! Test fixtures and builders for common test scenarios

use std::path::PathBuf;
use std::sync::Arc;

use super::mocks::{CountingInhibitor, MemoryFs, RecordingNotifier, StaticNetwork};
use crate::config::Settings;
use crate::core::client::PackageClient;
use crate::metadata::{Component, ComponentKind, MetadataPool};
use crate::package_managers::MockBackend;

/// Modalias of an NVIDIA GPU matched by [`sample_metadata`]'s driver entry
pub const NVIDIA_GPU_ALIAS: &str = "pci:v000010DEd00001C8Dsv000017AAsd0000224Dbc03sc02i00";

/// A small metadata pool: four applications, one driver, one firmware entry
#[must_use]
pub fn sample_metadata() -> MetadataPool {
    MetadataPool::new(vec![
        Component::new("org.gnome.Gedit", "Text Editor")
            .with_summary("Edit text files")
            .with_packages(&["gedit"])
            .with_categories(&["Utility"])
            .with_desktop_id("org.gnome.Gedit.desktop"),
        Component::new("org.mozilla.firefox", "Firefox")
            .with_summary("Web browser")
            .with_packages(&["firefox"])
            .with_categories(&["Network"]),
        Component::new("com.valvesoftware.Steam", "Steam")
            .with_summary("Game launcher")
            .with_packages(&["steam"])
            .with_categories(&["Game"]),
        Component::new("org.libreoffice.LibreOffice", "LibreOffice")
            .with_summary("Office suite")
            .with_packages(&["libreoffice-writer", "libreoffice-calc"])
            .with_categories(&["Office"]),
        Component::new("com.nvidia.driver", "NVIDIA Graphics Driver")
            .with_kind(ComponentKind::Driver)
            .with_packages(&["nvidia-driver-550"])
            .with_modaliases(&["pci:v000010DEd*sv*sd*bc03sc*i*"]),
        Component::new("com.realtek.firmware", "Realtek Wi-Fi Firmware")
            .with_kind(ComponentKind::Firmware)
            .with_packages(&["firmware-realtek"])
            .with_modaliases(&["usb:v0BDAp*"]),
    ])
}

/// A client wired to scripted collaborators
pub struct TestClient {
    pub backend: Arc<MockBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub network: Arc<StaticNetwork>,
    pub inhibitor: Arc<CountingInhibitor>,
    pub fs: Arc<MemoryFs>,
    pub client: PackageClient,
}

impl TestClient {
    /// Settings pointing at in-memory paths, with no watched databases
    #[must_use]
    pub fn settings() -> Settings {
        Settings {
            restart_marker: PathBuf::from("/run/reboot-required"),
            sysfs_devices: PathBuf::from("/sys/devices"),
            package_state_paths: Vec::new(),
            ..Settings::default()
        }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(Self::settings())
    }

    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        let backend = Arc::new(MockBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let network = Arc::new(StaticNetwork::default());
        let inhibitor = Arc::new(CountingInhibitor::default());
        let fs = Arc::new(MemoryFs::new());

        let client = PackageClient::builder(backend.clone(), Arc::new(sample_metadata()))
            .settings(settings)
            .notifier(notifier.clone())
            .network(network.clone())
            .inhibitor(inhibitor.clone())
            .filesystem(fs.clone())
            .build();

        Self {
            backend,
            notifier,
            network,
            inhibitor,
            fs,
            client,
        }
    }

    /// Put a bound, module-backed NVIDIA GPU into the sysfs tree
    pub fn add_nvidia_gpu(&self) {
        let device = self
            .client
            .settings()
            .sysfs_devices
            .join("pci0000:00/0000:01:00.0");
        self.fs.add_file(device.join("modalias"), &format!("{NVIDIA_GPU_ALIAS}\n"));
        self.fs.add_dir("/sys/bus/pci/drivers/nouveau/module");
        self.fs
            .add_symlink(device.join("driver"), "/sys/bus/pci/drivers/nouveau");
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}
