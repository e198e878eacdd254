//! Shared filesystem paths with test-friendly overrides.

use std::path::PathBuf;

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).map(PathBuf::from)
}

fn fallback_home_dir() -> PathBuf {
    home::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Config directory (default: XDG config dir or ~/.config/pkgcenter).
#[must_use]
pub fn config_dir() -> PathBuf {
    env_path("PKGCENTER_CONFIG_DIR").unwrap_or_else(|| {
        dirs::config_dir()
            .map(|d| d.join("pkgcenter"))
            .unwrap_or_else(|| fallback_home_dir().join(".config/pkgcenter"))
    })
}

/// Data directory (default: XDG data dir or ~/.local/share/pkgcenter).
#[must_use]
pub fn data_dir() -> PathBuf {
    env_path("PKGCENTER_DATA_DIR").unwrap_or_else(|| {
        dirs::data_dir()
            .map(|d| d.join("pkgcenter"))
            .unwrap_or_else(|| fallback_home_dir().join(".local/share/pkgcenter"))
    })
}

/// Marker file the system creates when a reboot is needed.
#[must_use]
pub fn restart_marker() -> PathBuf {
    env_path("PKGCENTER_RESTART_MARKER")
        .unwrap_or_else(|| PathBuf::from("/var/run/reboot-required"))
}

/// Root of the device attribute tree (default: /sys/devices).
#[must_use]
pub fn sysfs_devices() -> PathBuf {
    env_path("PKGCENTER_SYSFS_DEVICES").unwrap_or_else(|| PathBuf::from("/sys/devices"))
}

/// Package databases that change when packages are installed outside this client.
#[must_use]
pub fn package_state_paths() -> Vec<PathBuf> {
    [
        "/var/lib/dpkg/status",
        "/var/lib/pacman/local",
        "/var/lib/rpm",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}
