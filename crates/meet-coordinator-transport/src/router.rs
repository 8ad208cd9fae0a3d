//! Command routing between peers, UI surfaces, and the session registry.
//!
//! `CommandRouter` owns the registry and applies one event at a time.
//! Hosts with many connection tasks run it as an actor through
//! [`CommandRouter::spawn`] and talk to it via [`CoordinatorHandle`].

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use meet_coordinator_core::{
    ActionButtonBehavior, BadgeSurface, LogEntry, LogSink, LogStore, MediaSelector, PeerMessage,
    SessionId, SettingsStore, TabId, TabLocation, TabSurface, UiMessage, UiReply, WindowId,
};
use meet_coordinator_session::{PeerChannel, Session, SessionRegistry, StatusProjector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Outbound half of a UI surface's channel.
pub type UiChannel = mpsc::UnboundedSender<UiReply>;

/// Identifies one attachment of a control surface.
pub type ControlToken = Uuid;

/// Kind of UI surface talking to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlSurface {
    /// Toolbar popup listing meetings.
    Popup,
    /// Options page.
    Options,
}

impl fmt::Display for ControlSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Popup => "popup",
            Self::Options => "options",
        })
    }
}

/// Unrecognized control surface name.
#[derive(Debug, Error)]
#[error("Unknown control surface: {0}")]
pub struct ParseSurfaceError(String);

impl FromStr for ControlSurface {
    type Err = ParseSurfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "popup" => Ok(Self::Popup),
            "options" => Ok(Self::Options),
            other => Err(ParseSurfaceError(other.to_string())),
        }
    }
}

/// What to do with a targeted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Toggle(MediaSelector),
    Mute(MediaSelector),
    Unmute(MediaSelector),
    Focus,
}

struct ControlSlot {
    token: ControlToken,
    channel: UiChannel,
}

/// Dispatches decoded messages to sessions and the registry.
pub struct CommandRouter {
    registry: SessionRegistry,
    projector: StatusProjector,
    tabs: Arc<dyn TabSurface>,
    settings: Arc<dyn SettingsStore>,
    log: Arc<LogStore>,
    controls: HashMap<ControlSurface, ControlSlot>,
}

impl CommandRouter {
    /// Create a router with an empty registry.
    #[must_use]
    pub fn new(
        badge: Arc<dyn BadgeSurface>,
        tabs: Arc<dyn TabSurface>,
        settings: Arc<dyn SettingsStore>,
        log: Arc<LogStore>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            projector: StatusProjector::new(badge),
            tabs,
            settings,
            log,
            controls: HashMap::new(),
        }
    }

    /// Read access to the registry.
    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run `f` and recompute the display if it changed anything visible.
    fn tracked(&mut self, f: impl FnOnce(&mut Self)) {
        let before = self.registry.revision();
        f(self);
        if self.registry.revision() != before {
            self.refresh();
        }
    }

    /// Recompute the badge and push a fresh list to attached surfaces.
    pub fn refresh(&mut self) {
        let behavior = self.settings.settings().action_button_behavior;
        self.projector.refresh(&self.registry, behavior);

        if self.controls.is_empty() {
            return;
        }
        let meetings = self.registry.snapshot();
        self.controls.retain(|surface, slot| {
            let sent = slot
                .channel
                .send(UiReply::List {
                    meetings: meetings.clone(),
                })
                .is_ok();
            if !sent {
                tracing::debug!(%surface, "Dropping closed control channel");
            }
            sent
        });
    }

    /// Register a newly connected peer.
    pub fn connect_peer(
        &mut self,
        name: impl Into<String>,
        tab_id: TabId,
        window_id: WindowId,
        channel: PeerChannel,
    ) -> SessionId {
        let session = Session::new(name, tab_id, window_id, channel);
        let mut id = 0;
        self.tracked(|router| id = session.bind(&mut router.registry));
        id
    }

    /// Forget a peer whose channel closed.
    pub fn disconnect_peer(&mut self, id: SessionId) {
        self.tracked(|router| {
            router.registry.remove(id);
        });
    }

    /// Handle a message from a peer.
    pub fn handle_peer(&mut self, id: SessionId, msg: PeerMessage) {
        let log = Arc::clone(&self.log);
        self.tracked(|router| router.registry.handle_peer(id, msg, &*log));
    }

    /// Attach a UI surface, replacing any earlier one of the same kind.
    pub fn attach_control(&mut self, surface: ControlSurface, channel: UiChannel) -> ControlToken {
        let token = Uuid::new_v4();
        if self
            .controls
            .insert(surface, ControlSlot { token, channel })
            .is_some()
        {
            tracing::debug!(%surface, "Replaced control channel");
        }
        token
    }

    /// Detach a UI surface unless a newer one has already replaced it.
    pub fn detach_control(&mut self, surface: ControlSurface, token: ControlToken) {
        if self
            .controls
            .get(&surface)
            .is_some_and(|slot| slot.token == token)
        {
            self.controls.remove(&surface);
        }
    }

    /// Handle a message from a UI surface, replying on `reply`.
    pub fn handle_ui(&mut self, surface: ControlSurface, msg: UiMessage, reply: &UiChannel) {
        match msg {
            UiMessage::List => send_reply(
                reply,
                UiReply::List {
                    meetings: self.registry.snapshot(),
                },
            ),
            UiMessage::SetDefault { id, prefer } => {
                self.tracked(|router| router.registry.set_preferred(id, prefer));
            }
            UiMessage::Focus { id } => self.dispatch(id, Action::Focus),
            UiMessage::Toggle { id, audio, video } => {
                self.dispatch(id, Action::Toggle(MediaSelector::new(audio, video)));
            }
            UiMessage::Mute { id, audio, video } => {
                self.dispatch(id, Action::Mute(MediaSelector::new(audio, video)));
            }
            UiMessage::Unmute { id, audio, video } => {
                self.dispatch(id, Action::Unmute(MediaSelector::new(audio, video)));
            }
            UiMessage::Action { tab_id, window_id } => self.action_clicked(tab_id, window_id),
            UiMessage::Log(report) => {
                self.log
                    .record(LogEntry::now(report.level, surface.to_string(), report.message));
            }
            UiMessage::GetLog => send_reply(
                reply,
                UiReply::GetLog {
                    log: self.log.render(),
                },
            ),
            UiMessage::Unknown => tracing::warn!(%surface, "Unknown UI command"),
        }
    }

    /// The toolbar button was clicked with the given tab in front.
    fn action_clicked(&self, tab_id: Option<TabId>, window_id: Option<WindowId>) {
        let behavior = self.settings.settings().action_button_behavior;
        if behavior != ActionButtonBehavior::Toggle {
            tracing::debug!("Action click ignored; popup handles it");
            return;
        }

        let current = match (tab_id, window_id) {
            (Some(tab_id), Some(window_id)) => Some((tab_id, window_id)),
            _ => self
                .tabs
                .active_tab()
                .map(|TabLocation { tab_id, window_id, .. }| (tab_id, window_id)),
        };
        let under_tab = current.and_then(|(tab, window)| self.registry.find_by_location(tab, window));

        match under_tab {
            Some(session) => session.toggle(MediaSelector::AUDIO),
            None => self.broadcast(Action::Toggle(MediaSelector::AUDIO)),
        }
    }

    fn dispatch(&self, id: Option<SessionId>, action: Action) {
        match id {
            Some(id) => match self.registry.get(id) {
                Some(session) => self.apply(session, action),
                None => tracing::debug!(session_id = id, "Command for unknown session"),
            },
            None => self.broadcast(action),
        }
    }

    fn apply(&self, session: &Session, action: Action) {
        match action {
            Action::Toggle(media) => session.toggle(media),
            Action::Mute(media) => session.mute(media),
            Action::Unmute(media) => session.unmute(media),
            Action::Focus => session.focus(self.tabs.as_ref()),
        }
    }

    /// Apply an action to the selected target set.
    fn broadcast(&self, action: Action) {
        let selection = self.registry.select_targets();
        let Some(first) = selection
            .autofocus
            .and_then(|id| self.registry.get(id))
        else {
            tracing::debug!(?action, "No sessions to target");
            return;
        };

        if action == Action::Focus {
            first.focus(self.tabs.as_ref());
            return;
        }

        if self.settings.settings().autofocus {
            first.focus(self.tabs.as_ref());
        }
        for session in selection.targets.iter().filter_map(|&id| self.registry.get(id)) {
            self.apply(session, action);
        }
    }

    /// Spawn the router as an actor on the current runtime.
    #[must_use]
    pub fn spawn(self) -> (CoordinatorHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (CoordinatorHandle { tx }, task)
    }

    /// Apply events until every handle is dropped.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RouterEvent>) {
        self.refresh();
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        tracing::debug!("Coordinator stopped");
    }

    fn handle_event(&mut self, event: RouterEvent) {
        match event {
            RouterEvent::PeerConnected {
                name,
                tab_id,
                window_id,
                channel,
                reply,
            } => {
                let id = self.connect_peer(name, tab_id, window_id, channel);
                if reply.send(id).is_err() {
                    // Connection task died before learning its id.
                    self.disconnect_peer(id);
                }
            }
            RouterEvent::PeerMessage { id, msg } => self.handle_peer(id, msg),
            RouterEvent::PeerDisconnected { id } => self.disconnect_peer(id),
            RouterEvent::ControlAttached {
                surface,
                channel,
                reply,
            } => {
                let token = self.attach_control(surface, channel);
                if reply.send(token).is_err() {
                    tracing::debug!(%surface, "Control surface gone before attach completed");
                    self.detach_control(surface, token);
                }
            }
            RouterEvent::ControlMessage {
                surface,
                msg,
                reply,
            } => self.handle_ui(surface, msg, &reply),
            RouterEvent::ControlDetached { surface, token } => {
                self.detach_control(surface, token);
            }
        }
    }
}

fn send_reply(reply: &UiChannel, msg: UiReply) {
    if reply.send(msg).is_err() {
        tracing::debug!("UI channel closed before reply");
    }
}

/// Event delivered to the coordinator actor.
#[derive(Debug)]
pub enum RouterEvent {
    PeerConnected {
        name: String,
        tab_id: TabId,
        window_id: WindowId,
        channel: PeerChannel,
        reply: oneshot::Sender<SessionId>,
    },
    PeerMessage {
        id: SessionId,
        msg: PeerMessage,
    },
    PeerDisconnected {
        id: SessionId,
    },
    ControlAttached {
        surface: ControlSurface,
        channel: UiChannel,
        reply: oneshot::Sender<ControlToken>,
    },
    ControlMessage {
        surface: ControlSurface,
        msg: UiMessage,
        reply: UiChannel,
    },
    ControlDetached {
        surface: ControlSurface,
        token: ControlToken,
    },
}

/// Cloneable handle to a running coordinator.
///
/// All sends are fire-and-forget; once the coordinator has stopped they
/// are silently dropped.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<RouterEvent>,
}

impl CoordinatorHandle {
    fn send(&self, event: RouterEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Coordinator is gone");
        }
    }

    /// Register a peer and learn its session id.
    ///
    /// Returns `None` if the coordinator has stopped.
    pub async fn connect_peer(
        &self,
        name: impl Into<String>,
        tab_id: TabId,
        window_id: WindowId,
        channel: PeerChannel,
    ) -> Option<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterEvent::PeerConnected {
            name: name.into(),
            tab_id,
            window_id,
            channel,
            reply,
        });
        rx.await.ok()
    }

    pub fn peer_message(&self, id: SessionId, msg: PeerMessage) {
        self.send(RouterEvent::PeerMessage { id, msg });
    }

    pub fn disconnect_peer(&self, id: SessionId) {
        self.send(RouterEvent::PeerDisconnected { id });
    }

    /// Attach a UI surface and learn its token.
    ///
    /// Returns `None` if the coordinator has stopped.
    pub async fn attach_control(
        &self,
        surface: ControlSurface,
        channel: UiChannel,
    ) -> Option<ControlToken> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterEvent::ControlAttached {
            surface,
            channel,
            reply,
        });
        rx.await.ok()
    }

    pub fn control_message(&self, surface: ControlSurface, msg: UiMessage, reply: UiChannel) {
        self.send(RouterEvent::ControlMessage {
            surface,
            msg,
            reply,
        });
    }

    pub fn detach_control(&self, surface: ControlSurface, token: ControlToken) {
        self.send(RouterEvent::ControlDetached { surface, token });
    }
}
