//! Hardware driver detection
//!
//! Walks the sysfs device tree collecting modalias strings, then matches the
//! modalias patterns declared by driver and firmware metadata against them.
//! The scan is one-shot: every call walks the tree again from the root.

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Result;
use super::fs::FileSystem;
use super::packages::{PackageCatalog, PackageRecord};
use crate::metadata::{Component, MetadataSource};

pub struct DriverScanner {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl DriverScanner {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Distinct modaliases of devices that are unbound or bound to a loaded
    /// module, in discovery order.
    ///
    /// Symlinked directories are not descended into. Unreadable nodes below
    /// the root are logged and skipped.
    pub async fn modaliases(&self) -> Result<Vec<String>> {
        let mut aliases = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = vec![self.root.clone()];
        let mut first = true;

        while let Some(dir) = pending.pop() {
            let entries = match self.fs.read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if first => return Err(e),
                Err(e) => {
                    tracing::debug!("Skipping {}: {e}", dir.display());
                    continue;
                }
            };
            first = false;

            for entry in entries {
                if self.fs.is_symlink(&entry).await.unwrap_or(true) {
                    continue;
                }
                if self.fs.is_dir(&entry).await.unwrap_or(false) {
                    pending.push(entry);
                }
            }

            if let Some(alias) = self.node_alias(&dir).await
                && seen.insert(alias.clone())
            {
                aliases.push(alias);
            }
        }

        tracing::debug!("Found {} device aliases under {}", aliases.len(), self.root.display());
        Ok(aliases)
    }

    async fn node_alias(&self, dir: &Path) -> Option<String> {
        let alias = match self.fs.read_to_string(&dir.join("modalias")).await {
            Ok(contents) => contents.trim().to_string(),
            Err(_) => {
                let uevent = self.fs.read_to_string(&dir.join("uevent")).await.ok()?;
                uevent
                    .lines()
                    .find_map(|line| line.strip_prefix("MODALIAS="))?
                    .trim()
                    .to_string()
            }
        };
        if alias.is_empty() || !self.driver_is_active(dir).await {
            return None;
        }
        Some(alias)
    }

    /// A bound driver counts only while its module link exists
    async fn driver_is_active(&self, dir: &Path) -> bool {
        let link = dir.join("driver");
        if !self.fs.is_symlink(&link).await.unwrap_or(false) {
            return true;
        }
        let Ok(target) = self.fs.resolve_link(&link).await else {
            return false;
        };
        let active = self.fs.exists(&target.join("module")).await.unwrap_or(false);
        if !active {
            tracing::trace!("Ignoring {}: driver has no module", dir.display());
        }
        active
    }

    /// Driver and firmware components with a pattern matching any alias
    #[must_use]
    pub fn matching_components(metadata: &dyn MetadataSource, aliases: &[String]) -> Vec<Component> {
        metadata
            .hardware_components()
            .into_iter()
            .filter(|component| {
                component
                    .modaliases
                    .iter()
                    .filter_map(|pattern| match glob_to_regex(pattern) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            tracing::warn!("Bad modalias pattern {pattern:?} in {}: {e}", component.id);
                            None
                        }
                    })
                    .any(|re| aliases.iter().any(|alias| re.is_match(alias)))
            })
            .collect()
    }

    /// Scan the hardware and catalog every matching driver or firmware entry
    pub async fn detect(
        &self,
        metadata: &dyn MetadataSource,
        catalog: &PackageCatalog,
    ) -> Result<Vec<Arc<PackageRecord>>> {
        let aliases = self.modaliases().await?;
        let records: Vec<_> = Self::matching_components(metadata, &aliases)
            .into_iter()
            .filter_map(|component| catalog.get_or_insert(component))
            .collect();
        tracing::info!("Detected {} applicable drivers", records.len());
        Ok(records)
    }
}

/// Translate a shell glob (`*`, `?`, `[...]`) into an anchored regex
pub fn glob_to_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let class: String = chars.clone().take_while(|&c| c != ']').collect();
                if class.is_empty() || chars.clone().nth(class.chars().count()).is_none() {
                    out.push_str(r"\[");
                    continue;
                }
                for _ in 0..=class.chars().count() {
                    chars.next();
                }
                out.push('[');
                let class = match class.strip_prefix('!') {
                    Some(rest) => {
                        out.push('^');
                        rest.to_string()
                    }
                    None => class,
                };
                out.push_str(&class.replace('\\', r"\\").replace('[', r"\["));
                out.push(']');
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    Regex::new(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::MemoryFs;
    use crate::metadata::{ComponentKind, MetadataPool};

    const E1000E: &str = "pci:v00008086d000015B8sv000017AAsd00002279bc02sc00i00";
    const NVIDIA: &str = "pci:v000010DEd00001C8Dsv000017AAsd0000224Dbc03sc02i00";

    fn tree() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.add_dir("/sys/bus/pci/drivers/e1000e/module");
        fs.add_dir("/sys/bus/pci/drivers/nouveau-stale");

        fs.add_file("/sys/devices/pci0000:00/0000:00:1f.6/modalias", &format!("{E1000E}\n"));
        fs.add_symlink(
            "/sys/devices/pci0000:00/0000:00:1f.6/driver",
            "/sys/bus/pci/drivers/e1000e",
        );
        fs.add_file(
            "/sys/devices/pci0000:00/0000:01:00.0/uevent",
            &format!("DRIVER=nouveau\nMODALIAS={NVIDIA}\n"),
        );
        fs
    }

    fn scanner(fs: MemoryFs) -> DriverScanner {
        DriverScanner::new(Arc::new(fs), "/sys/devices")
    }

    #[tokio::test]
    async fn test_collects_from_modalias_and_uevent() {
        let aliases = scanner(tree()).modaliases().await.unwrap();
        assert_eq!(aliases.len(), 2);
        assert!(aliases.contains(&E1000E.to_string()));
        assert!(aliases.contains(&NVIDIA.to_string()));
    }

    #[tokio::test]
    async fn test_modalias_file_wins_over_uevent() {
        let fs = MemoryFs::new();
        fs.add_file("/sys/devices/usb1/modalias", "usb:v1D6Bp0002\n");
        fs.add_file("/sys/devices/usb1/uevent", "MODALIAS=usb:vFFFFpFFFF\n");
        assert_eq!(scanner(fs).modaliases().await.unwrap(), vec!["usb:v1D6Bp0002"]);
    }

    #[tokio::test]
    async fn test_driver_without_module_is_excluded() {
        let fs = tree();
        fs.add_symlink(
            "/sys/devices/pci0000:00/0000:01:00.0/driver",
            "/sys/bus/pci/drivers/nouveau-stale",
        );
        let aliases = scanner(fs).modaliases().await.unwrap();
        assert_eq!(aliases, vec![E1000E.to_string()]);
    }

    #[tokio::test]
    async fn test_symlinked_dirs_are_not_followed() {
        let fs = tree();
        fs.add_symlink("/sys/devices/pci0000:00/loop", "/sys/devices");
        fs.add_file("/sys/devices/virtual/modalias", "");
        let aliases = scanner(fs).modaliases().await.unwrap();
        assert_eq!(aliases.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_aliases_collapse() {
        let fs = MemoryFs::new();
        fs.add_file("/sys/devices/a/modalias", "acpi:PNP0C0A:\n");
        fs.add_file("/sys/devices/b/modalias", "acpi:PNP0C0A:\n");
        assert_eq!(scanner(fs).modaliases().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        assert!(scanner(MemoryFs::new()).modaliases().await.is_err());
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("pci:v000010DEd*sv*sd*bc03sc*i*").unwrap();
        assert!(re.is_match(NVIDIA));
        assert!(!re.is_match(E1000E));

        let re = glob_to_regex("usb:v1D6Bp000?").unwrap();
        assert!(re.is_match("usb:v1D6Bp0002"));
        assert!(!re.is_match("usb:v1D6Bp00021"));

        let re = glob_to_regex("dmi:*svn[LD]*").unwrap();
        assert!(re.is_match("dmi:bvnLENOVO:svnLENOVO:pn20"));
        assert!(!re.is_match("dmi:bvnASUS:svnASUS:pn20"));

        let re = glob_to_regex("of:N*[!x]").unwrap();
        assert!(re.is_match("of:Nfoo"));
        assert!(!re.is_match("of:Nfoox"));

        assert!(glob_to_regex("weird[").unwrap().is_match("weird["));
        assert!(glob_to_regex("a.b").unwrap().is_match("a.b"));
        assert!(!glob_to_regex("a.b").unwrap().is_match("axb"));
    }

    #[tokio::test]
    async fn test_detect_catalogs_matching_drivers() {
        let pool = MetadataPool::new(vec![
            Component::new("com.nvidia.driver", "NVIDIA Driver")
                .with_kind(ComponentKind::Driver)
                .with_packages(&["nvidia-driver-550"])
                .with_modaliases(&["pci:v000010DEd*sv*sd*bc03sc*i*"]),
            Component::new("com.broadcom.wl", "Broadcom STA")
                .with_kind(ComponentKind::Driver)
                .with_packages(&["broadcom-sta-dkms"])
                .with_modaliases(&["pci:v000014E4d*"]),
            Component::new("org.gnome.Gedit", "Gedit").with_packages(&["gedit"]),
        ]);
        let catalog = PackageCatalog::new();

        let found = scanner(tree()).detect(&pool, &catalog).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].component_id(), "com.nvidia.driver");
        assert!(catalog.get("nvidia-driver-550").is_some());
        assert!(catalog.get("broadcom-sta-dkms").is_none());
    }
}
