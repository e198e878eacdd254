//! File watcher for package-state and restart-marker changes
//!
//! Directories are watched directly. Files, present or not, are watched
//! through their parent directory so that replacement, deletion and later
//! re-creation are all reported.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::Result;

const CHANNEL_CAPACITY: usize = 100;

/// File watcher handle - drop to stop watching
pub struct PathWatcher {
    _watcher: RecommendedWatcher,
    targets: Vec<PathBuf>,
}

impl PathWatcher {
    /// Start watching `targets`.
    ///
    /// Each modify, create or remove event touching a target sends that
    /// target on the returned channel. Targets whose parent is missing too
    /// are skipped with a log line.
    pub fn start(targets: &[PathBuf]) -> Result<(Self, mpsc::Receiver<PathBuf>)> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let watched: Vec<PathBuf> = targets.to_vec();
        let filter = watched.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else { return };
                if !matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                for target in matching_targets(&filter, &event.paths) {
                    // Full channel means the consumer is behind; it will
                    // still see at least one change for the target.
                    let _ = tx.try_send(target);
                }
            },
            Config::default()
                .with_poll_interval(Duration::from_secs(2))
                .with_compare_contents(false),
        )?;

        let mut active = Vec::new();
        for target in &watched {
            let Some(path) = watch_point(target) else {
                tracing::debug!("Not watching {}: neither it nor its parent exists", target.display());
                continue;
            };
            watcher.watch(path, RecursiveMode::NonRecursive)?;
            tracing::debug!("Watching {} for {}", path.display(), target.display());
            active.push(target.clone());
        }

        Ok((
            Self {
                _watcher: watcher,
                targets: active,
            },
            rx,
        ))
    }

    /// Targets that are actually being watched
    #[must_use]
    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }
}

fn watch_point(target: &Path) -> Option<&Path> {
    if target.is_dir() {
        return Some(target);
    }
    target.parent().filter(|parent| parent.is_dir())
}

fn matching_targets(targets: &[PathBuf], paths: &[PathBuf]) -> Vec<PathBuf> {
    targets
        .iter()
        .filter(|target| paths.iter().any(|p| p.starts_with(target)))
        .cloned()
        .collect()
}
