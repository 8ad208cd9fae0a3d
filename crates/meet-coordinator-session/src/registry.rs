//! Session registry: the coordinator's single source of truth.

use meet_coordinator_core::{LogSink, MeetingSnapshot, PeerMessage, SessionId, TabId, WindowId};

use crate::Session;

/// Aggregate state across all sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No sessions connected.
    Inactive,
    /// Every session reports its audio muted.
    Muted,
    /// Anything else.
    Unmuted,
}

/// Sessions a broadcast command applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Every session that receives the command, in insertion order.
    pub targets: Vec<SessionId>,
    /// The one session whose tab is focused before the command is applied.
    pub autofocus: Option<SessionId>,
}

impl Selection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Ordered collection of connected sessions.
///
/// Insertion order is connection order; it decides which session is
/// autofocused when several are eligible. Every mutation that changes
/// what the badge shows bumps `revision`, so a caller can tell whether
/// the display needs recomputing after handling a message.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    next_id: SessionId,
    revision: u64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sessions: Vec::new(),
            next_id: 1,
            revision: 0,
        }
    }

    /// Counter bumped by every display-relevant mutation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    const fn touch(&mut self) {
        self.revision += 1;
    }

    /// Register a session, assigning it the next id.
    pub fn add(&mut self, mut session: Session) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        session.set_id(id);

        tracing::info!(session_id = id, name = %session.name(), "Session connected");
        self.sessions.push(session);
        self.touch();
        id
    }

    /// Remove a session. Removing an unknown id does nothing.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let pos = self.sessions.iter().position(|s| s.id() == id)?;
        let session = self.sessions.remove(pos);
        tracing::info!(session_id = id, "Session disconnected");
        self.touch();
        Some(session)
    }

    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    /// Sessions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    /// Pin or unpin the default session.
    ///
    /// Pinning clears every other session's flag in the same call, so at
    /// most one session is ever preferred.
    pub fn set_preferred(&mut self, id: SessionId, value: bool) {
        if self.get(id).is_none() {
            return;
        }

        for session in &mut self.sessions {
            if session.id() == id {
                session.set_preferred(value);
            } else if value {
                session.set_preferred(false);
            }
        }
        tracing::debug!(session_id = id, preferred = value, "Preferred session updated");
        self.touch();
    }

    /// The pinned default session, if any.
    #[must_use]
    pub fn preferred(&self) -> Option<&Session> {
        self.sessions.iter().find(|s| s.is_preferred())
    }

    /// Find the session running in the given tab.
    #[must_use]
    pub fn find_by_location(&self, tab_id: TabId, window_id: WindowId) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|s| s.tab_id() == tab_id && s.window_id() == window_id)
    }

    /// Route a peer message to its session.
    ///
    /// Messages for sessions that have already gone away are dropped.
    pub fn handle_peer(&mut self, id: SessionId, msg: PeerMessage, log: &dyn LogSink) {
        let Some(session) = self.get_mut(id) else {
            tracing::debug!(session_id = id, "Message for unknown session");
            return;
        };
        if session.handle(msg, log) {
            self.touch();
        }
    }

    /// Choose the sessions a broadcast command applies to.
    ///
    /// A preferred session absorbs every broadcast. Otherwise joined
    /// sessions are targeted; when nothing has joined yet everyone is,
    /// so a meeting that is still loading gets the command too.
    #[must_use]
    pub fn select_targets(&self) -> Selection {
        if let Some(preferred) = self.preferred() {
            return Selection {
                targets: vec![preferred.id()],
                autofocus: Some(preferred.id()),
            };
        }

        let targets: Vec<SessionId> = if self.num_active() == 0 {
            self.sessions.iter().map(Session::id).collect()
        } else {
            self.sessions
                .iter()
                .filter(|s| s.is_active())
                .map(Session::id)
                .collect()
        };
        let autofocus = targets.first().copied();

        Selection { targets, autofocus }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[must_use]
    pub fn num_active(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_active()).count()
    }

    #[must_use]
    pub fn num_audio_muted(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.audio_muted() == Some(true))
            .count()
    }

    #[must_use]
    pub fn num_video_muted(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.video_muted() == Some(true))
            .count()
    }

    #[must_use]
    pub fn state(&self) -> RegistryState {
        if self.is_empty() {
            RegistryState::Inactive
        } else if self.num_audio_muted() == self.size() {
            RegistryState::Muted
        } else {
            RegistryState::Unmuted
        }
    }

    /// Human-readable summary of the aggregate state.
    #[must_use]
    pub fn summary(&self) -> String {
        let (size, muted) = (self.size(), self.num_audio_muted());
        if size == 0 {
            "No meetings found. Please reload Google Meet pages to connect.".to_string()
        } else if muted == size {
            "All meetings are muted.".to_string()
        } else if muted == 0 {
            "No meetings are muted.".to_string()
        } else {
            format!("{size} active meetings; {muted} are muted.")
        }
    }

    /// Snapshot of every session in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MeetingSnapshot> {
        self.sessions.iter().map(Session::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use meet_coordinator_core::{LogStore, PeerCommand, PeerUpdate};
    use tokio::sync::mpsc;

    use super::*;

    struct Peer {
        id: SessionId,
        _rx: mpsc::UnboundedReceiver<PeerCommand>,
    }

    fn connect(registry: &mut SessionRegistry, tab_id: TabId) -> Peer {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Session::new(format!("meet-{tab_id}"), tab_id, 1, tx).bind(registry);
        Peer { id, _rx: rx }
    }

    fn join(registry: &mut SessionRegistry, id: SessionId) {
        registry.handle_peer(id, PeerMessage::Joined, &LogStore::new());
    }

    fn report(registry: &mut SessionRegistry, id: SessionId, audio: bool) {
        registry.handle_peer(
            id,
            PeerMessage::Update(PeerUpdate {
                title: None,
                audio_muted: Some(audio),
                video_muted: None,
            }),
            &LogStore::new(),
        );
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let mut registry = SessionRegistry::new();
        let a = connect(&mut registry, 1);
        let b = connect(&mut registry, 2);
        registry.remove(b.id);
        let c = connect(&mut registry, 3);

        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(registry.size(), 2);
        assert_eq!(registry.size(), registry.iter().count());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = SessionRegistry::new();
        let a = connect(&mut registry, 1);
        connect(&mut registry, 2);

        assert!(registry.remove(a.id).is_some());
        let revision = registry.revision();
        assert!(registry.remove(a.id).is_none());
        assert!(registry.remove(999).is_none());

        assert_eq!(registry.size(), 1);
        assert_eq!(registry.revision(), revision);
    }

    #[test]
    fn test_get_unknown_is_none() {
        let registry = SessionRegistry::new();
        assert!(registry.get(42).is_none());
    }

    #[test]
    fn test_preferred_is_exclusive() {
        let mut registry = SessionRegistry::new();
        let a = connect(&mut registry, 1);
        let b = connect(&mut registry, 2);

        registry.set_preferred(a.id, true);
        registry.set_preferred(b.id, true);

        let preferred: Vec<_> = registry
            .iter()
            .filter(|s| s.is_preferred())
            .map(Session::id)
            .collect();
        assert_eq!(preferred, vec![b.id]);
    }

    #[test]
    fn test_unprefer_only_clears_target() {
        let mut registry = SessionRegistry::new();
        let a = connect(&mut registry, 1);
        let b = connect(&mut registry, 2);

        registry.set_preferred(a.id, true);
        registry.set_preferred(b.id, false);
        assert_eq!(registry.preferred().map(Session::id), Some(a.id));

        registry.set_preferred(a.id, false);
        assert!(registry.preferred().is_none());
    }

    #[test]
    fn test_set_preferred_unknown_is_noop() {
        let mut registry = SessionRegistry::new();
        let a = connect(&mut registry, 1);
        registry.set_preferred(a.id, true);
        let revision = registry.revision();

        registry.set_preferred(999, true);

        assert_eq!(registry.preferred().map(Session::id), Some(a.id));
        assert_eq!(registry.revision(), revision);
    }

    #[test]
    fn test_select_all_when_none_active() {
        let mut registry = SessionRegistry::new();
        let peers: Vec<_> = (1..=3).map(|t| connect(&mut registry, t)).collect();

        let selection = registry.select_targets();

        let ids: Vec<_> = peers.iter().map(|p| p.id).collect();
        assert_eq!(selection.targets, ids);
        assert_eq!(selection.autofocus, Some(peers[0].id));
    }

    #[test]
    fn test_select_only_active() {
        let mut registry = SessionRegistry::new();
        let peers: Vec<_> = (1..=3).map(|t| connect(&mut registry, t)).collect();
        join(&mut registry, peers[1].id);

        let selection = registry.select_targets();

        assert_eq!(selection.targets, vec![peers[1].id]);
        assert_eq!(selection.autofocus, Some(peers[1].id));
    }

    #[test]
    fn test_select_preferred_over_active() {
        let mut registry = SessionRegistry::new();
        let peers: Vec<_> = (1..=3).map(|t| connect(&mut registry, t)).collect();
        join(&mut registry, peers[0].id);
        join(&mut registry, peers[1].id);
        registry.set_preferred(peers[2].id, true);

        let selection = registry.select_targets();

        assert_eq!(selection.targets, vec![peers[2].id]);
        assert_eq!(selection.autofocus, Some(peers[2].id));
    }

    #[test]
    fn test_autofocus_is_first_active_in_insertion_order() {
        let mut registry = SessionRegistry::new();
        let peers: Vec<_> = (1..=4).map(|t| connect(&mut registry, t)).collect();
        join(&mut registry, peers[3].id);
        join(&mut registry, peers[1].id);

        let selection = registry.select_targets();

        assert_eq!(selection.targets, vec![peers[1].id, peers[3].id]);
        assert_eq!(selection.autofocus, Some(peers[1].id));
    }

    #[test]
    fn test_select_empty_registry() {
        let registry = SessionRegistry::new();
        let selection = registry.select_targets();
        assert!(selection.is_empty());
        assert_eq!(selection.autofocus, None);
    }

    #[test]
    fn test_find_by_location() {
        let mut registry = SessionRegistry::new();
        connect(&mut registry, 1);
        let b = connect(&mut registry, 2);

        assert_eq!(registry.find_by_location(2, 1).map(Session::id), Some(b.id));
        assert!(registry.find_by_location(2, 9).is_none());
        assert!(registry.find_by_location(5, 1).is_none());
    }

    #[test]
    fn test_aggregates_and_summary() {
        let mut registry = SessionRegistry::new();
        assert_eq!(registry.state(), RegistryState::Inactive);
        assert_eq!(
            registry.summary(),
            "No meetings found. Please reload Google Meet pages to connect."
        );

        let a = connect(&mut registry, 1);
        let b = connect(&mut registry, 2);
        report(&mut registry, a.id, true);
        report(&mut registry, b.id, true);
        assert_eq!(registry.state(), RegistryState::Muted);
        assert_eq!(registry.summary(), "All meetings are muted.");

        report(&mut registry, a.id, false);
        report(&mut registry, b.id, false);
        assert_eq!(registry.state(), RegistryState::Unmuted);
        assert_eq!(registry.summary(), "No meetings are muted.");

        let c = connect(&mut registry, 3);
        report(&mut registry, c.id, true);
        assert_eq!(registry.num_audio_muted(), 1);
        assert_eq!(registry.summary(), "3 active meetings; 1 are muted.");
    }

    #[test]
    fn test_unknown_mute_state_counts_as_unmuted() {
        let mut registry = SessionRegistry::new();
        connect(&mut registry, 1);

        assert_eq!(registry.state(), RegistryState::Unmuted);
        assert_eq!(registry.num_audio_muted(), 0);
        assert_eq!(registry.num_video_muted(), 0);
    }

    #[test]
    fn test_duplicate_update_bumps_revision_once() {
        let mut registry = SessionRegistry::new();
        let a = connect(&mut registry, 1);
        let before = registry.revision();

        report(&mut registry, a.id, true);
        report(&mut registry, a.id, true);

        assert_eq!(registry.revision(), before + 1);
    }

    #[test]
    fn test_message_for_removed_session_is_dropped() {
        let mut registry = SessionRegistry::new();
        let a = connect(&mut registry, 1);
        registry.remove(a.id);
        let revision = registry.revision();

        join(&mut registry, a.id);

        assert_eq!(registry.revision(), revision);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_in_insertion_order() {
        let mut registry = SessionRegistry::new();
        let a = connect(&mut registry, 5);
        let b = connect(&mut registry, 3);
        registry.set_preferred(b.id, true);

        let snapshot = registry.snapshot();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, a.id);
        assert_eq!(snapshot[0].name, "meet-5");
        assert!(snapshot[1].prefer);
    }
}
