//! Display descriptor consumed by the badge-rendering surface.

use serde::{Deserialize, Serialize};

/// Toolbar icon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Icon {
    /// No meetings connected.
    #[default]
    Inactive,
    /// At least one meeting has its microphone on.
    MicOn,
    /// Every meeting is muted.
    MicOff,
}

/// Badge background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeColor {
    Green,
    Red,
}

/// What the action button opens when clicked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupTarget {
    /// Page explaining that no meetings are connected.
    #[default]
    Inactive,
    /// The meeting list popup.
    Popup,
    /// No popup; clicks are delivered to the coordinator.
    None,
}

impl PopupTarget {
    /// Page path handed to the renderer, empty when no popup is shown.
    #[must_use]
    pub const fn page(self) -> &'static str {
        match self {
            Self::Inactive => "inactive.html",
            Self::Popup => "popup.html",
            Self::None => "",
        }
    }
}

/// Full display state for the toolbar action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    pub icon: Icon,
    pub tooltip: String,
    pub popup_target: PopupTarget,
    pub badge_text: String,
    /// `None` leaves the renderer's color untouched.
    pub badge_color: Option<BadgeColor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_names() {
        assert_eq!(serde_json::to_string(&Icon::MicOn).unwrap(), "\"mic-on\"");
        assert_eq!(serde_json::to_string(&Icon::MicOff).unwrap(), "\"mic-off\"");
        assert_eq!(serde_json::to_string(&Icon::Inactive).unwrap(), "\"inactive\"");
    }

    #[test]
    fn test_popup_pages() {
        assert_eq!(PopupTarget::Inactive.page(), "inactive.html");
        assert_eq!(PopupTarget::Popup.page(), "popup.html");
        assert!(PopupTarget::None.page().is_empty());
    }
}
