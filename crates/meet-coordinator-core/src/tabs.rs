//! In-memory tab surface.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use crate::traits::{TabId, TabLocation, TabSurface};

/// Marks one registration of a tab; see [`TabDirectory::release`].
pub type TabLease = u64;

struct Entry {
    location: TabLocation,
    lease: TabLease,
}

#[derive(Default)]
struct Inner {
    tabs: HashMap<TabId, Entry>,
    active: Option<TabId>,
    next_lease: TabLease,
}

/// Tracks where tabs live and which one is in the foreground.
///
/// Hosts without a real browser behind them (the demo server, tests)
/// use this as their tab surface.
#[derive(Default)]
pub struct TabDirectory {
    inner: RwLock<Inner>,
}

impl TabDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or move a tab, returning the lease of this registration.
    pub fn upsert(&self, location: TabLocation) -> TabLease {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.next_lease += 1;
        let lease = inner.next_lease;
        inner.tabs.insert(location.tab_id, Entry { location, lease });
        lease
    }

    /// Forget a tab unless a newer registration has taken it over.
    ///
    /// Returns whether the tab was removed.
    pub fn release(&self, tab_id: TabId, lease: TabLease) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.tabs.get(&tab_id).is_none_or(|entry| entry.lease != lease) {
            return false;
        }
        inner.tabs.remove(&tab_id);
        if inner.active == Some(tab_id) {
            inner.active = None;
        }
        true
    }

    /// Mark a tab as the one the user is looking at.
    pub fn activate(&self, tab_id: TabId) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.tabs.contains_key(&tab_id) {
            inner.active = Some(tab_id);
        }
    }
}

impl TabSurface for TabDirectory {
    fn locate(&self, tab_id: TabId) -> Option<TabLocation> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.tabs.get(&tab_id).map(|entry| entry.location)
    }

    fn focus(&self, location: TabLocation) {
        tracing::debug!(
            tab_id = location.tab_id,
            window_id = location.window_id,
            index = location.index,
            "Focusing tab"
        );
        self.activate(location.tab_id);
    }

    fn active_tab(&self) -> Option<TabLocation> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .active
            .and_then(|id| inner.tabs.get(&id))
            .map(|entry| entry.location)
    }
}
