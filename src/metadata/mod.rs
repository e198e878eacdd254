//! Declarative package descriptions (components)
//!
//! The core only consumes metadata through [`MetadataSource`]. [`MetadataPool`]
//! is a plain in-memory implementation loadable from TOML or JSON.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What kind of entry a component describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    #[default]
    DesktopApp,
    ConsoleApp,
    Driver,
    Firmware,
    OsUpdates,
}

impl ComponentKind {
    /// Driver and firmware entries only enter the catalog through a hardware match
    #[must_use]
    pub const fn is_hardware(self) -> bool {
        matches!(self, Self::Driver | Self::Firmware)
    }
}

/// A logical application, driver or firmware entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub kind: ComponentKind,
    /// Backend package names this component maps to
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub desktop_id: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Glob patterns of hardware aliases this entry supports
    #[serde(default)]
    pub modaliases: Vec<String>,
}

impl Component {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            summary: String::new(),
            kind: ComponentKind::default(),
            packages: Vec::new(),
            desktop_id: None,
            categories: Vec::new(),
            keywords: Vec::new(),
            modaliases: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_packages(mut self, packages: &[&str]) -> Self {
        self.packages = packages.iter().map(|p| (*p).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ComponentKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| (*c).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_desktop_id(mut self, desktop_id: impl Into<String>) -> Self {
        self.desktop_id = Some(desktop_id.into());
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    #[must_use]
    pub fn with_modaliases(mut self, patterns: &[&str]) -> Self {
        self.modaliases = patterns.iter().map(|p| (*p).to_string()).collect();
        self
    }

    fn matches_term(&self, term: &str) -> bool {
        let contains = |s: &str| s.to_lowercase().contains(term);
        contains(&self.id)
            || contains(&self.name)
            || contains(&self.summary)
            || self.keywords.iter().any(|k| contains(k))
            || self.packages.iter().any(|p| contains(p))
    }
}

/// Read-only metadata queries
pub trait MetadataSource: Send + Sync {
    /// Components matching a free-text term
    fn search(&self, term: &str) -> Vec<Component>;

    /// Components listed under a category
    fn components_in_category(&self, category: &str) -> Vec<Component>;

    /// Keyed lookup
    fn component(&self, id: &str) -> Option<Component>;

    /// Every component, including hardware entries
    fn components(&self) -> Vec<Component>;

    /// Driver and firmware entries, which the normal catalog does not show
    fn hardware_components(&self) -> Vec<Component> {
        self.components()
            .into_iter()
            .filter(|c| c.kind.is_hardware())
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct PoolFile {
    #[serde(default, rename = "component")]
    components: Vec<Component>,
}

/// In-memory metadata pool
#[derive(Debug, Clone, Default)]
pub struct MetadataPool {
    components: Vec<Component>,
}

impl MetadataPool {
    #[must_use]
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Load a pool from `[[component]]` TOML tables or a JSON `{"component": [...]}` document
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metadata from {}", path.display()))?;
        let file: PoolFile = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).context("Failed to parse JSON metadata")?
        } else {
            toml::from_str(&content).context("Failed to parse TOML metadata")?
        };
        tracing::debug!("Loaded {} components from {}", file.components.len(), path.display());
        Ok(Self::new(file.components))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl MetadataSource for MetadataPool {
    fn search(&self, term: &str) -> Vec<Component> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        self.components
            .iter()
            .filter(|c| !c.kind.is_hardware() && c.matches_term(&term))
            .cloned()
            .collect()
    }

    fn components_in_category(&self, category: &str) -> Vec<Component> {
        self.components
            .iter()
            .filter(|c| c.categories.iter().any(|cat| cat.eq_ignore_ascii_case(category)))
            .cloned()
            .collect()
    }

    fn component(&self, id: &str) -> Option<Component> {
        self.components.iter().find(|c| c.id == id).cloned()
    }

    fn components(&self) -> Vec<Component> {
        self.components.clone()
    }
}
