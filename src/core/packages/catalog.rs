//! Observable package catalog
//!
//! [`PackageIndex`] is a plain ordered, name-unique container. [`PackageCatalog`]
//! wraps it and publishes a [`CatalogEvent`] for every structural mutation.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::record::PackageRecord;
use crate::core::events::{CatalogEvent, EventBus};
use crate::metadata::{Component, MetadataSource};

/// Backend package name -> owning record, in insertion order
#[derive(Debug, Default)]
pub struct PackageIndex {
    order: Vec<String>,
    by_name: HashMap<String, Arc<PackageRecord>>,
}

impl PackageIndex {
    /// Insert or replace, returning the previous record for `name`
    pub fn insert(&mut self, name: &str, record: Arc<PackageRecord>) -> Option<Arc<PackageRecord>> {
        let previous = self.by_name.insert(name.to_string(), record);
        if previous.is_none() {
            self.order.push(name.to_string());
        }
        previous
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<PackageRecord>> {
        let removed = self.by_name.remove(name)?;
        self.order.retain(|n| n != name);
        Some(removed)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<PackageRecord>> {
        self.by_name.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Distinct records, in order of their first name
    #[must_use]
    pub fn records(&self) -> Vec<Arc<PackageRecord>> {
        let mut seen = HashSet::new();
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .filter(|record| seen.insert(Arc::as_ptr(record)))
            .cloned()
            .collect()
    }
}

/// The client's package catalog
pub struct PackageCatalog {
    index: RwLock<PackageIndex>,
    os_updates: Arc<PackageRecord>,
    events: EventBus<CatalogEvent>,
}

impl Default for PackageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: RwLock::new(PackageIndex::default()),
            os_updates: Arc::new(PackageRecord::os_updates()),
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    /// Map `name` to `record`. Returns false when the mapping already existed.
    pub fn upsert(&self, name: &str, record: Arc<PackageRecord>) -> bool {
        let added = CatalogEvent::Added {
            name: name.to_string(),
            component_id: record.component_id().to_string(),
        };
        let previous = self.index.write().insert(name, Arc::clone(&record));
        match previous {
            Some(prev) if Arc::ptr_eq(&prev, &record) => false,
            Some(prev) => {
                tracing::debug!(
                    "Package name {name} moved from {} to {}",
                    prev.component_id(),
                    record.component_id()
                );
                self.events.publish(CatalogEvent::Removed {
                    name: name.to_string(),
                    component_id: prev.component_id().to_string(),
                });
                self.events.publish(added);
                true
            }
            None => {
                self.events.publish(added);
                true
            }
        }
    }

    pub fn remove(&self, name: &str) -> Option<Arc<PackageRecord>> {
        let removed = self.index.write().remove(name)?;
        self.events.publish(CatalogEvent::Removed {
            name: name.to_string(),
            component_id: removed.component_id().to_string(),
        });
        Some(removed)
    }

    /// Return the record for `component`, creating and mapping it if needed.
    /// Components without backend packages are not cataloged.
    pub fn get_or_insert(&self, component: Component) -> Option<Arc<PackageRecord>> {
        if let Some(existing) = self.record_for(&component) {
            return Some(existing);
        }
        if component.packages.is_empty() {
            tracing::debug!("Skipping {}: no backend packages", component.id);
            return None;
        }
        let record = Arc::new(PackageRecord::new(component));
        for name in record.package_names() {
            self.upsert(name, Arc::clone(&record));
        }
        Some(record)
    }

    /// Catalog every non-hardware component; returns the number of records
    pub fn populate(&self, components: impl IntoIterator<Item = Component>) -> usize {
        components
            .into_iter()
            .filter(|c| !c.kind.is_hardware())
            .filter_map(|c| self.get_or_insert(c))
            .count()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<PackageRecord>> {
        self.index.read().get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Distinct cataloged records, excluding the OS updates record
    #[must_use]
    pub fn records(&self) -> Vec<Arc<PackageRecord>> {
        self.index.read().records()
    }

    #[must_use]
    pub fn os_updates(&self) -> Arc<PackageRecord> {
        Arc::clone(&self.os_updates)
    }

    #[must_use]
    pub fn find_by_component_id(&self, id: &str) -> Option<Arc<PackageRecord>> {
        if self.os_updates.component_id() == id {
            return Some(self.os_updates());
        }
        self.records().into_iter().find(|r| r.component_id() == id)
    }

    /// Match against the desktop file id, with or without `.desktop`
    #[must_use]
    pub fn find_by_desktop_id(&self, id: &str) -> Option<Arc<PackageRecord>> {
        let wanted = id.strip_suffix(".desktop").unwrap_or(id);
        self.records().into_iter().find(|r| {
            r.component().desktop_id.as_deref().is_some_and(|desktop| {
                desktop.strip_suffix(".desktop").unwrap_or(desktop) == wanted
            })
        })
    }

    /// Records of applications in a category, in no particular order
    #[must_use]
    pub fn applications_for_category(
        &self,
        metadata: &dyn MetadataSource,
        category: &str,
    ) -> Vec<Arc<PackageRecord>> {
        self.project(metadata.components_in_category(category))
    }

    /// Records matching a search term, optionally restricted to a category.
    /// Results are deduplicated; ordering is whatever the metadata returns.
    #[must_use]
    pub fn search(
        &self,
        metadata: &dyn MetadataSource,
        query: &str,
        category: Option<&str>,
    ) -> Vec<Arc<PackageRecord>> {
        let components = metadata.search(query).into_iter().filter(|c| {
            category.is_none_or(|cat| c.categories.iter().any(|own| own.eq_ignore_ascii_case(cat)))
        });
        self.project(components)
    }

    fn record_for(&self, component: &Component) -> Option<Arc<PackageRecord>> {
        let index = self.index.read();
        component
            .packages
            .iter()
            .filter_map(|name| index.get(name))
            .find(|record| record.component_id() == component.id)
            .cloned()
    }

    fn project(&self, components: impl IntoIterator<Item = Component>) -> Vec<Arc<PackageRecord>> {
        let mut seen = HashSet::new();
        components
            .into_iter()
            .filter(|c| !c.kind.is_hardware())
            .filter_map(|c| self.record_for(&c))
            .filter(|record| seen.insert(record.component_id().to_string()))
            .collect()
    }
}
