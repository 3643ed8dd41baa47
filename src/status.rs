//! Aggregated status notifications keyed by feature id.
//!
//! At most one live entry per id: adding an entry replaces any previous one
//! for that id (loading -> error, or error -> loading on retry). Errors stay
//! until replaced or removed. The container reports itself hidden only after
//! a short grace delay once the last entry is gone, so churning entries do
//! not flicker.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// Grace delay before an emptied status bar reports itself hidden.
pub const HIDE_GRACE: Duration = Duration::from_millis(250);

/// Capacity of the update fan-out channel.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Shared handle used by the fetch layer and the orchestrator.
pub type SharedStatusBar = Arc<Mutex<StatusBar>>;

/// Kind of a status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Loading,
    Error,
}

/// One live notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub id: String,
    pub message: String,
    pub kind: EntryKind,
}

/// Change notification published on every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Loading { id: String, message: String },
    Error { id: String, message: String },
    Cleared { id: String },
}

/// The status aggregation surface.
#[derive(Debug)]
pub struct StatusBar {
    entries: Vec<StatusEntry>,
    empty_since: Option<Instant>,
    updates: broadcast::Sender<StatusUpdate>,
}

impl StatusBar {
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            entries: Vec::new(),
            empty_since: None,
            updates,
        }
    }

    /// Shared, lockable handle.
    #[must_use]
    pub fn shared() -> SharedStatusBar {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Subscribe to mutation notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.updates.subscribe()
    }

    /// Show a loading indicator for `id`, replacing any existing entry.
    pub fn add_item(&mut self, id: &str, message: &str) {
        self.upsert(StatusEntry {
            id: id.to_string(),
            message: message.to_string(),
            kind: EntryKind::Loading,
        });
        let _ = self.updates.send(StatusUpdate::Loading {
            id: id.to_string(),
            message: message.to_string(),
        });
    }

    /// Show an error for `id`, replacing any existing entry. Stays visible
    /// until explicitly cleared or replaced.
    pub fn add_error(&mut self, id: &str, message: &str) {
        self.upsert(StatusEntry {
            id: id.to_string(),
            message: message.to_string(),
            kind: EntryKind::Error,
        });
        let _ = self.updates.send(StatusUpdate::Error {
            id: id.to_string(),
            message: message.to_string(),
        });
    }

    /// Clear the entry for `id`, if any.
    pub fn remove_item(&mut self, id: &str) {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() < before {
            if self.entries.is_empty() {
                self.empty_since = Some(Instant::now());
            }
            let _ = self.updates.send(StatusUpdate::Cleared { id: id.to_string() });
        }
    }

    fn upsert(&mut self, entry: StatusEntry) {
        self.entries.retain(|e| e.id != entry.id);
        self.entries.push(entry);
        self.empty_since = None;
    }

    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&StatusEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container should be shown at `now`.
    ///
    /// True while entries exist, and for `HIDE_GRACE` after the last entry
    /// is removed.
    #[must_use]
    pub fn is_visible(&self, now: Instant) -> bool {
        if !self.entries.is_empty() {
            return true;
        }
        match self.empty_since {
            Some(emptied) => now.duration_since(emptied) < HIDE_GRACE,
            None => false,
        }
    }
}

impl Default for StatusBar {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirror status updates to the log until the channel closes.
///
/// Spawned alongside a selection so the user sees per-feature progress as
/// entries churn.
pub async fn mirror_updates(rx: broadcast::Receiver<StatusUpdate>) {
    let mut stream = BroadcastStream::new(rx);
    while let Some(update) = stream.next().await {
        match update {
            Ok(StatusUpdate::Loading { id, message }) => {
                tracing::info!("{id}: {message}");
            }
            Ok(StatusUpdate::Error { id, message }) => {
                tracing::warn!("{id}: {message}");
            }
            Ok(StatusUpdate::Cleared { .. }) => {}
            // Lagged receiver: drop missed updates, keep mirroring
            Err(_) => {}
        }
    }
}
