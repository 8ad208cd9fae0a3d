//! Projects registry aggregate state onto the toolbar badge.

use std::sync::Arc;

use meet_coordinator_core::{
    ActionButtonBehavior, BadgeColor, BadgeSurface, Display, Icon, PopupTarget,
};

use crate::{RegistryState, SessionRegistry};

/// Computes and applies the badge display.
pub struct StatusProjector {
    badge: Arc<dyn BadgeSurface>,
}

impl StatusProjector {
    /// Create a projector rendering onto `badge`.
    #[must_use]
    pub fn new(badge: Arc<dyn BadgeSurface>) -> Self {
        Self { badge }
    }

    /// Derive the display descriptor for the registry's current state.
    #[must_use]
    pub fn project(registry: &SessionRegistry, behavior: ActionButtonBehavior) -> Display {
        let tooltip = registry.summary();
        let popup_target = match behavior {
            ActionButtonBehavior::Popup => PopupTarget::Popup,
            ActionButtonBehavior::Toggle => PopupTarget::None,
        };
        let (size, muted) = (registry.size(), registry.num_audio_muted());

        match registry.state() {
            RegistryState::Inactive => Display {
                icon: Icon::Inactive,
                tooltip,
                popup_target: PopupTarget::Inactive,
                badge_text: String::new(),
                badge_color: None,
            },
            RegistryState::Unmuted => Display {
                icon: Icon::MicOn,
                tooltip,
                popup_target,
                badge_text: if muted == 0 {
                    size.to_string()
                } else {
                    format!("{muted}/{size}")
                },
                badge_color: Some(BadgeColor::Green),
            },
            RegistryState::Muted => Display {
                icon: Icon::MicOff,
                tooltip,
                popup_target,
                badge_text: size.to_string(),
                badge_color: Some(BadgeColor::Red),
            },
        }
    }

    /// Recompute the display and hand it to the badge surface.
    pub fn refresh(&self, registry: &SessionRegistry, behavior: ActionButtonBehavior) -> Display {
        let descriptor = Self::project(registry, behavior);
        tracing::debug!(icon = ?descriptor.icon, badge = %descriptor.badge_text, "Display updated");
        self.badge.apply(&descriptor);
        descriptor
    }
}
