//! Identifiers and traits for the coordinator's external collaborators.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Display, LogEntry};

/// Session identifier, assigned monotonically by the registry.
pub type SessionId = u64;

/// Browser tab identifier.
pub type TabId = i64;

/// Browser window identifier.
pub type WindowId = i64;

/// Where a tab currently lives.
///
/// `index` drifts as the user reorders tabs, so it must be resolved
/// fresh before use rather than cached on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabLocation {
    /// Tab identifier.
    pub tab_id: TabId,
    /// Window containing the tab.
    pub window_id: WindowId,
    /// Position of the tab within its window.
    pub index: usize,
}

/// Send error.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Channel closed")]
    ChannelClosed,
}

/// Surface that can bring tabs to the foreground.
pub trait TabSurface: Send + Sync {
    /// Resolve the current location of a tab, if it still exists.
    fn locate(&self, tab_id: TabId) -> Option<TabLocation>;

    /// Focus the tab's window and highlight the tab.
    fn focus(&self, location: TabLocation);

    /// The tab the user is currently looking at.
    fn active_tab(&self) -> Option<TabLocation>;
}

/// Surface that renders the toolbar badge.
pub trait BadgeSurface: Send + Sync {
    /// Apply a freshly computed display descriptor.
    fn apply(&self, display: &Display);
}

impl BadgeSurface for tokio::sync::watch::Sender<Display> {
    fn apply(&self, display: &Display) {
        self.send_replace(display.clone());
    }
}

/// Sink for log entries reported by peers and UI surfaces.
pub trait LogSink: Send + Sync {
    /// Record one entry.
    fn record(&self, entry: LogEntry);
}
