//! Wire protocol between the coordinator, its peers, and UI surfaces.
//!
//! Every message is a JSON object discriminated by its `command` field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{LogLevel, SessionId, TabId, WindowId};

/// Protocol decoding error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(&'static str),
}

/// Which media a mute command applies to.
///
/// An empty selector means audio only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<bool>,
}

impl MediaSelector {
    /// Audio only.
    pub const AUDIO: Self = Self {
        audio: Some(true),
        video: None,
    };

    /// Build a selector, falling back to audio when neither is given.
    #[must_use]
    pub const fn new(audio: Option<bool>, video: Option<bool>) -> Self {
        Self { audio, video }.resolved()
    }

    /// The selector with the audio default applied.
    #[must_use]
    pub const fn resolved(self) -> Self {
        match (self.audio, self.video) {
            (None, None) => Self::AUDIO,
            _ => self,
        }
    }
}

/// Log line reported by a peer or UI surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogReport {
    #[serde(default)]
    pub level: LogLevel,
    pub message: String,
}

/// State report from a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub audio_muted: Option<bool>,
    #[serde(default)]
    pub video_muted: Option<bool>,
}

/// Message from a peer to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum PeerMessage {
    /// Forward a log line.
    Log(LogReport),
    /// The peer has joined its meeting.
    Joined,
    /// Title and mute state report.
    Update(PeerUpdate),
    /// Anything else.
    #[serde(other)]
    Unknown,
}

/// Command from the coordinator to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum PeerCommand {
    Toggle(MediaSelector),
    Mute(MediaSelector),
    Unmute(MediaSelector),
}

/// Message from a UI surface to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum UiMessage {
    /// Request a meeting list snapshot.
    List,
    /// Pin or unpin the default meeting.
    #[serde(rename = "default")]
    SetDefault { id: SessionId, prefer: bool },
    /// Focus a meeting, or the broadcast target when `id` is absent.
    Focus {
        #[serde(default)]
        id: Option<SessionId>,
    },
    Toggle {
        #[serde(default)]
        id: Option<SessionId>,
        #[serde(default)]
        audio: Option<bool>,
        #[serde(default)]
        video: Option<bool>,
    },
    Mute {
        #[serde(default)]
        id: Option<SessionId>,
        #[serde(default)]
        audio: Option<bool>,
        #[serde(default)]
        video: Option<bool>,
    },
    Unmute {
        #[serde(default)]
        id: Option<SessionId>,
        #[serde(default)]
        audio: Option<bool>,
        #[serde(default)]
        video: Option<bool>,
    },
    /// The toolbar action button was clicked while showing the given tab.
    Action {
        #[serde(default, rename = "tabId")]
        tab_id: Option<TabId>,
        #[serde(default, rename = "windowId")]
        window_id: Option<WindowId>,
    },
    Log(LogReport),
    GetLog,
    #[serde(other)]
    Unknown,
}

/// Observable fields of one session, as sent to UI surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSnapshot {
    pub id: SessionId,
    pub name: String,
    pub title: Option<String>,
    pub prefer: bool,
    pub active: bool,
    pub audio_muted: Option<bool>,
    pub video_muted: Option<bool>,
}

/// Message from the coordinator to a UI surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum UiReply {
    List { meetings: Vec<MeetingSnapshot> },
    GetLog { log: String },
}

impl PeerMessage {
    /// Decode a peer message from JSON text.
    ///
    /// # Errors
    /// Returns error if the text is not a JSON object with a `command`.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl UiMessage {
    /// Decode a UI message from JSON text.
    ///
    /// # Errors
    /// Returns error if the text is not a JSON object with a `command`.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_update() {
        let msg = PeerMessage::decode(
            r#"{"command":"update","title":"Meet - abc-defg-hij","audioMuted":true,"videoMuted":null}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            PeerMessage::Update(PeerUpdate {
                title: Some("Meet - abc-defg-hij".to_string()),
                audio_muted: Some(true),
                video_muted: None,
            })
        );
    }

    #[test]
    fn test_decode_unknown_peer_command() {
        let msg = PeerMessage::decode(r#"{"command":"dance","speed":3}"#).unwrap();
        assert_eq!(msg, PeerMessage::Unknown);
    }

    #[test]
    fn test_decode_missing_command_is_malformed() {
        let err = PeerMessage::decode(r#"{"title":"x"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_peer_log_defaults_to_info() {
        let msg = PeerMessage::decode(r#"{"command":"log","message":"hello"}"#).unwrap();
        let PeerMessage::Log(report) = msg else {
            panic!("Wrong message type");
        };
        assert_eq!(report.level, LogLevel::Info);
        assert_eq!(report.message, "hello");
    }

    #[test]
    fn test_encode_peer_command() {
        let json = serde_json::to_value(PeerCommand::Toggle(MediaSelector::default().resolved()))
            .unwrap();
        assert_eq!(json, serde_json::json!({"command": "toggle", "audio": true}));

        let json = serde_json::to_value(PeerCommand::Unmute(MediaSelector::new(None, Some(true))))
            .unwrap();
        assert_eq!(json, serde_json::json!({"command": "unmute", "video": true}));
    }

    #[test]
    fn test_decode_ui_commands() {
        assert_eq!(UiMessage::decode(r#"{"command":"list"}"#).unwrap(), UiMessage::List);
        assert_eq!(
            UiMessage::decode(r#"{"command":"get-log"}"#).unwrap(),
            UiMessage::GetLog
        );
        assert_eq!(
            UiMessage::decode(r#"{"command":"default","id":4,"prefer":true}"#).unwrap(),
            UiMessage::SetDefault { id: 4, prefer: true }
        );
        assert_eq!(
            UiMessage::decode(r#"{"command":"toggle","video":true}"#).unwrap(),
            UiMessage::Toggle {
                id: None,
                audio: None,
                video: Some(true)
            }
        );
        assert_eq!(
            UiMessage::decode(r#"{"command":"action","tabId":9,"windowId":1}"#).unwrap(),
            UiMessage::Action {
                tab_id: Some(9),
                window_id: Some(1)
            }
        );
        assert_eq!(
            UiMessage::decode(r#"{"command":"reboot"}"#).unwrap(),
            UiMessage::Unknown
        );
    }

    #[test]
    fn test_encode_list_reply() {
        let reply = UiReply::List {
            meetings: vec![MeetingSnapshot {
                id: 1,
                name: "abc-defg-hij".to_string(),
                title: Some("Standup".to_string()),
                prefer: false,
                active: true,
                audio_muted: Some(true),
                video_muted: None,
            }],
        };
        let json = serde_json::to_value(reply).unwrap();
        assert_eq!(json["command"], "list");
        assert_eq!(json["meetings"][0]["audioMuted"], true);
        assert_eq!(json["meetings"][0]["prefer"], false);
        assert!(json["meetings"][0]["videoMuted"].is_null());
    }
}
