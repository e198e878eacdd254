//! Restart-required tracking
//!
//! One marker file decides whether the system needs a reboot. The first
//! appearance raises a notification; disappearing clears the flag silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::events::{ClientEvent, EventBus};
use super::fs::FileSystem;
use super::system::NotificationSink;
use super::types::NotificationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartState {
    NotRequired,
    Required,
}

pub struct RestartMonitor {
    marker: PathBuf,
    required: AtomicBool,
    notifier: Arc<dyn NotificationSink>,
    events: EventBus<ClientEvent>,
    notifications: bool,
}

impl RestartMonitor {
    pub fn new(
        marker: impl Into<PathBuf>,
        notifier: Arc<dyn NotificationSink>,
        events: EventBus<ClientEvent>,
    ) -> Self {
        Self {
            marker: marker.into(),
            required: AtomicBool::new(false),
            notifier,
            events,
            notifications: true,
        }
    }

    #[must_use]
    pub fn without_notifications(mut self) -> Self {
        self.notifications = false;
        self
    }

    #[must_use]
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn state(&self) -> RestartState {
        if self.is_required() {
            RestartState::Required
        } else {
            RestartState::NotRequired
        }
    }

    /// Apply a marker observation; returns the new state on a transition
    pub fn observe(&self, present: bool) -> Option<RestartState> {
        let was = self.required.swap(present, Ordering::SeqCst);
        match (was, present) {
            (false, true) => {
                tracing::info!("Restart marker {} appeared", self.marker.display());
                self.events.publish(ClientEvent::RestartRequired);
                if self.notifications {
                    self.notifier.notify(
                        NotificationKind::RestartRequired,
                        "Restart Required",
                        "Please restart your system to finalize updates",
                    );
                }
                Some(RestartState::Required)
            }
            (true, false) => {
                tracing::debug!("Restart marker {} removed", self.marker.display());
                Some(RestartState::NotRequired)
            }
            _ => None,
        }
    }

    /// Check the marker on `fs`. Read failures leave the state unchanged.
    pub async fn check(&self, fs: &dyn FileSystem) -> Option<RestartState> {
        match fs.exists(&self.marker).await {
            Ok(present) => self.observe(present),
            Err(e) => {
                tracing::debug!("Cannot check {}: {e}", self.marker.display());
                None
            }
        }
    }
}
