//! Mock implementations of the platform collaborators

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::core::Result;
use crate::core::fs::FileSystem;
use crate::core::system::{NetworkStatus, NotificationSink, SuspendInhibitor};
use crate::core::types::NotificationKind;

/// A notification call seen by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedNotification {
    Notify {
        kind: NotificationKind,
        title: String,
        body: String,
    },
    Withdraw(NotificationKind),
}

/// Notification sink that remembers every call
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<RecordedNotification>>,
}

impl RecordingNotifier {
    /// All calls so far, oldest first
    pub fn recorded(&self) -> Vec<RecordedNotification> {
        self.calls.lock().clone()
    }

    /// Number of `notify` calls for `kind`
    pub fn notify_count(&self, kind: NotificationKind) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RecordedNotification::Notify { kind: k, .. } if *k == kind))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, title: &str, body: &str) {
        self.calls.lock().push(RecordedNotification::Notify {
            kind,
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    fn withdraw(&self, kind: NotificationKind) {
        self.calls.lock().push(RecordedNotification::Withdraw(kind));
    }
}

/// Network status that can be flipped from a test
#[derive(Debug)]
pub struct StaticNetwork {
    online: AtomicBool,
}

impl StaticNetwork {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for StaticNetwork {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkStatus for StaticNetwork {
    fn is_available(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Inhibitor that counts acquisitions and releases
#[derive(Debug, Default)]
pub struct CountingInhibitor {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CountingInhibitor {
    /// Total successful `inhibit` calls
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Inhibitions currently held
    pub fn active(&self) -> usize {
        self.acquired() - self.released.load(Ordering::SeqCst)
    }
}

impl SuspendInhibitor for CountingInhibitor {
    fn inhibit(&self, _reason: &str) -> Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn uninhibit(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(String),
    Symlink(PathBuf),
}

/// In-memory filesystem with directories, files, and absolute symlinks
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
}

const MAX_LINK_HOPS: usize = 32;

fn not_found(path: &Path) -> crate::core::PkgCenterError {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string()).into()
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory and its missing parents
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut nodes = self.nodes.lock();
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
    }

    /// Create or overwrite a file, creating parent directories
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes
            .lock()
            .insert(path.to_path_buf(), Node::File(contents.to_string()));
    }

    /// Create a symlink at `path` pointing to `target`
    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes
            .lock()
            .insert(path.to_path_buf(), Node::Symlink(target.as_ref().to_path_buf()));
    }

    /// Remove a node and everything below it
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes.lock().retain(|p, _| !p.starts_with(path));
    }

    /// Follow symlinks in every component of `path`
    fn resolve(&self, path: &Path) -> Option<PathBuf> {
        let nodes = self.nodes.lock();
        let mut current = path.to_path_buf();
        for _ in 0..MAX_LINK_HOPS {
            let mut resolved = PathBuf::new();
            let mut redirected = None;
            let components: Vec<_> = current.components().collect();
            for (i, component) in components.iter().enumerate() {
                resolved.push(component);
                if matches!(component, PathComponent::RootDir) {
                    continue;
                }
                match nodes.get(&resolved) {
                    Some(Node::Symlink(target)) => {
                        let mut next = target.clone();
                        next.extend(&components[i + 1..]);
                        redirected = Some(next);
                        break;
                    }
                    Some(_) => {}
                    None => return None,
                }
            }
            match redirected {
                Some(next) => current = next,
                None => return Some(resolved),
            }
        }
        None
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path).is_some())
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let dir = self.resolve(path).ok_or_else(|| not_found(path))?;
        let nodes = self.nodes.lock();
        if !matches!(nodes.get(&dir), Some(Node::Dir)) {
            return Err(io::Error::new(io::ErrorKind::NotADirectory, path.display().to_string()).into());
        }
        Ok(nodes
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .filter_map(|p| p.file_name())
            .map(|name| path.join(name))
            .collect())
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        let file = self.resolve(path).ok_or_else(|| not_found(path))?;
        match self.nodes.lock().get(&file) {
            Some(Node::File(contents)) => Ok(contents.clone()),
            _ => Err(io::Error::new(io::ErrorKind::IsADirectory, path.display().to_string()).into()),
        }
    }

    async fn is_symlink(&self, path: &Path) -> Result<bool> {
        Ok(matches!(self.nodes.lock().get(path), Some(Node::Symlink(_))))
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(matches!(self.nodes.lock().get(path), Some(Node::Dir)))
    }

    async fn resolve_link(&self, path: &Path) -> Result<PathBuf> {
        self.resolve(path).ok_or_else(|| not_found(path))
    }
}
