//! Command routing and transport for the meeting coordinator.
//!
//! Provides:
//! - `CommandRouter` - Dispatch of peer and UI messages, actor loop
//! - WebSocket transport (feature: websocket)

pub mod router;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use router::{CommandRouter, ControlSurface, CoordinatorHandle, RouterEvent, UiChannel};
