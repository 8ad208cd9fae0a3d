//! Core abstractions for coordinating meeting sessions across browser tabs.
//!
//! This crate provides the fundamental building blocks:
//! - `protocol` - Typed messages exchanged with peers and UI surfaces
//! - `Display` - Badge/icon descriptor derived from aggregate state
//! - `Settings` - User configuration (autofocus, action button behavior)
//! - `LogStore` - Bounded log history + live broadcast
//! - `TabDirectory` - In-memory tab surface
//! - Collaborator traits

pub mod display;
pub mod log_store;
pub mod protocol;
pub mod settings;
pub mod tabs;
pub mod traits;

pub use display::{BadgeColor, Display, Icon, PopupTarget};
pub use log_store::{LogEntry, LogLevel, LogStore};
pub use protocol::{
    LogReport, MediaSelector, MeetingSnapshot, PeerCommand, PeerMessage, PeerUpdate, ProtocolError,
    UiMessage, UiReply,
};
pub use settings::{ActionButtonBehavior, ConfigError, MemorySettings, Settings, SettingsStore};
pub use tabs::{TabDirectory, TabLease};
pub use traits::{
    BadgeSurface, LogSink, SendError, SessionId, TabId, TabLocation, TabSurface, WindowId,
};
