//! Session tracking for meeting tabs.
//!
//! Provides:
//! - `Session` - One connected meeting peer
//! - `SessionRegistry` - Ordered session collection, aggregates, target selection
//! - `StatusProjector` - Aggregate state to badge display

pub mod projector;
pub mod registry;
pub mod session;

pub use projector::StatusProjector;
pub use registry::{RegistryState, Selection, SessionRegistry};
pub use session::{PeerChannel, Session};
