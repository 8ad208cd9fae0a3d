//! A single connected meeting peer.

use meet_coordinator_core::{
    LogEntry, LogSink, MediaSelector, MeetingSnapshot, PeerCommand, PeerMessage, PeerUpdate,
    SessionId, TabId, TabSurface, WindowId, traits::SendError,
};
use tokio::sync::mpsc;

use crate::SessionRegistry;

/// Prefix the meeting page puts in front of its document title.
const TITLE_PREFIX: &str = "Meet - ";

/// Outbound half of a peer's channel.
pub type PeerChannel = mpsc::UnboundedSender<PeerCommand>;

/// One tracked meeting tab.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    tab_id: TabId,
    window_id: WindowId,
    channel: PeerChannel,
    title: Option<String>,
    active: bool,
    preferred: bool,
    audio_muted: Option<bool>,
    video_muted: Option<bool>,
}

impl Session {
    /// Create an unregistered session for a peer living in the given tab.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        tab_id: TabId,
        window_id: WindowId,
        channel: PeerChannel,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            tab_id,
            window_id,
            channel,
            title: None,
            active: false,
            preferred: false,
            audio_muted: None,
            video_muted: None,
        }
    }

    /// Register with the registry.
    ///
    /// The returned id is how the transport routes this peer's inbound
    /// messages and its disconnect back to the registry.
    pub fn bind(self, registry: &mut SessionRegistry) -> SessionId {
        registry.add(self)
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) const fn set_id(&mut self, id: SessionId) {
        self.id = id;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub const fn tab_id(&self) -> TabId {
        self.tab_id
    }

    #[must_use]
    pub const fn window_id(&self) -> WindowId {
        self.window_id
    }

    /// Whether the peer has joined its meeting.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether this is the user's pinned default session.
    #[must_use]
    pub const fn is_preferred(&self) -> bool {
        self.preferred
    }

    pub(crate) const fn set_preferred(&mut self, preferred: bool) {
        self.preferred = preferred;
    }

    #[must_use]
    pub const fn audio_muted(&self) -> Option<bool> {
        self.audio_muted
    }

    #[must_use]
    pub const fn video_muted(&self) -> Option<bool> {
        self.video_muted
    }

    /// Whether the peer side of the channel has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Handle one inbound peer message.
    ///
    /// Returns `true` when the change is visible in the aggregate display.
    pub fn handle(&mut self, msg: PeerMessage, log: &dyn LogSink) -> bool {
        match msg {
            PeerMessage::Log(report) => {
                log.record(LogEntry::now(
                    report.level,
                    format!("session-{}", self.id),
                    report.message,
                ));
                false
            }
            PeerMessage::Joined => {
                if self.active {
                    return false;
                }
                tracing::info!(session_id = self.id, name = %self.name, "Meeting joined");
                self.active = true;
                true
            }
            PeerMessage::Update(update) => self.apply_update(update),
            PeerMessage::Unknown => {
                tracing::warn!(session_id = self.id, "Unknown peer command");
                false
            }
        }
    }

    /// Apply a state report.
    ///
    /// Only mute changes count as visible; a title change alone does not.
    pub fn apply_update(&mut self, update: PeerUpdate) -> bool {
        if let Some(title) = update.title {
            let title = title.strip_prefix(TITLE_PREFIX).unwrap_or(&title);
            self.title = Some(title.to_string());
        }

        let changed =
            self.audio_muted != update.audio_muted || self.video_muted != update.video_muted;
        self.audio_muted = update.audio_muted;
        self.video_muted = update.video_muted;

        if changed {
            tracing::debug!(
                session_id = self.id,
                audio_muted = ?self.audio_muted,
                video_muted = ?self.video_muted,
                "Mute state changed"
            );
        }
        changed
    }

    fn send(&self, command: PeerCommand) {
        if let Err(e) = self
            .channel
            .send(command)
            .map_err(|_| SendError::ChannelClosed)
        {
            tracing::debug!(session_id = self.id, "Dropped {command:?}: {e}");
        }
    }

    /// Ask the peer to toggle the selected media.
    pub fn toggle(&self, media: MediaSelector) {
        self.send(PeerCommand::Toggle(media.resolved()));
    }

    /// Ask the peer to mute the selected media.
    pub fn mute(&self, media: MediaSelector) {
        self.send(PeerCommand::Mute(media.resolved()));
    }

    /// Ask the peer to unmute the selected media.
    pub fn unmute(&self, media: MediaSelector) {
        self.send(PeerCommand::Unmute(media.resolved()));
    }

    /// Bring this session's tab to the foreground.
    ///
    /// The tab's location is looked up fresh since its index drifts.
    pub fn focus(&self, tabs: &dyn TabSurface) {
        match tabs.locate(self.tab_id) {
            Some(location) => tabs.focus(location),
            None => tracing::debug!(session_id = self.id, tab_id = self.tab_id, "Tab is gone"),
        }
    }

    /// Observable fields for UI surfaces.
    #[must_use]
    pub fn snapshot(&self) -> MeetingSnapshot {
        MeetingSnapshot {
            id: self.id,
            name: self.name.clone(),
            title: self.title.clone(),
            prefer: self.preferred,
            active: self.active,
            audio_muted: self.audio_muted,
            video_muted: self.video_muted,
        }
    }
}
