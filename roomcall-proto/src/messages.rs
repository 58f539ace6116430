use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ChatEntry, MediaFlags, MediaKind, ParticipantInfo, RoomState, RoomStats};

/// Negotiation payload kinds forwarded between two participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frames sent from a client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom {
        room: String,
        name: String,
    },
    LeaveRoom,
    Offer {
        to: String,
        payload: Value,
    },
    Answer {
        to: String,
        payload: Value,
    },
    IceCandidate {
        to: String,
        payload: Value,
    },
    MediaStateChange {
        #[serde(rename = "type")]
        kind: MediaKind,
        enabled: bool,
    },
    ChatMessage {
        body: String,
    },
    Ping,
}

impl ClientMessage {
    /// Event name as it appears on the wire
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom => "leave-room",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::MediaStateChange { .. } => "media-state-change",
            Self::ChatMessage { .. } => "chat-message",
            Self::Ping => "ping",
        }
    }

    /// Build a negotiation frame addressed to `to`
    #[must_use]
    pub fn signal(kind: SignalKind, to: impl Into<String>, payload: Value) -> Self {
        let to = to.into();
        match kind {
            SignalKind::Offer => Self::Offer { to, payload },
            SignalKind::Answer => Self::Answer { to, payload },
            SignalKind::IceCandidate => Self::IceCandidate { to, payload },
        }
    }
}

/// Frames sent from the server to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection, carries the connection-scoped id
    Welcome {
        id: String,
    },
    JoinedRoom {
        room: RoomState,
        you: ParticipantInfo,
        members: Vec<ParticipantInfo>,
        chat_history: Vec<ChatEntry>,
    },
    /// Snapshot of the members present before the receiver joined
    RoomUsers {
        users: Vec<ParticipantInfo>,
    },
    UserJoined(ParticipantInfo),
    UserLeft {
        id: String,
        name: String,
    },
    Offer {
        from: String,
        payload: Value,
    },
    Answer {
        from: String,
        payload: Value,
    },
    IceCandidate {
        from: String,
        payload: Value,
    },
    MediaStateChanged {
        user_id: String,
        user_name: String,
        #[serde(rename = "type")]
        kind: MediaKind,
        enabled: bool,
        media: MediaFlags,
    },
    ScreenShareStopped {
        reason: String,
    },
    ScreenShareEnded {
        user_id: String,
    },
    ChatMessage(ChatEntry),
    RoomStatsUpdated(RoomStats),
    Error {
        message: String,
    },
    Pong,
}

impl ServerMessage {
    /// Event name as it appears on the wire
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::JoinedRoom { .. } => "joined-room",
            Self::RoomUsers { .. } => "room-users",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft { .. } => "user-left",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::MediaStateChanged { .. } => "media-state-changed",
            Self::ScreenShareStopped { .. } => "screen-share-stopped",
            Self::ScreenShareEnded { .. } => "screen-share-ended",
            Self::ChatMessage(_) => "chat-message",
            Self::RoomStatsUpdated(_) => "room-stats-updated",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
        }
    }

    #[must_use]
    pub fn signal(kind: SignalKind, from: impl Into<String>, payload: Value) -> Self {
        let from = from.into();
        match kind {
            SignalKind::Offer => Self::Offer { from, payload },
            SignalKind::Answer => Self::Answer { from, payload },
            SignalKind::IceCandidate => Self::IceCandidate { from, payload },
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_room_wire_format() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"event": "join-room", "room": "r1", "name": "alice"}))
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                room: "r1".to_string(),
                name: "alice".to_string()
            }
        );
        assert_eq!(msg.event_name(), "join-room");
    }

    #[test]
    fn test_unit_variants_need_only_the_tag() {
        let msg: ClientMessage = serde_json::from_value(json!({"event": "leave-room"})).unwrap();
        assert_eq!(msg, ClientMessage::LeaveRoom);
        let pong = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(pong, json!({"event": "pong"}));
    }

    #[test]
    fn test_media_state_change_uses_type_field() {
        let msg: ClientMessage = serde_json::from_value(
            json!({"event": "media-state-change", "type": "screenShare", "enabled": true}),
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::MediaStateChange {
                kind: MediaKind::ScreenShare,
                enabled: true
            }
        );
    }

    #[test]
    fn test_user_joined_is_flat() {
        let info = ParticipantInfo {
            id: "p1".to_string(),
            name: "bob".to_string(),
            media: MediaFlags::default(),
            is_moderator: false,
            joined_at: 1,
        };
        let value = serde_json::to_value(ServerMessage::UserJoined(info)).unwrap();
        assert_eq!(value["event"], "user-joined");
        assert_eq!(value["id"], "p1");
        assert_eq!(value["name"], "bob");
        assert_eq!(value["media"]["video"], true);
    }

    #[test]
    fn test_signal_constructors() {
        let payload = json!({"sdp": "v=0"});
        let out = ClientMessage::signal(SignalKind::Answer, "b", payload.clone());
        assert_eq!(
            out,
            ClientMessage::Answer {
                to: "b".to_string(),
                payload: payload.clone()
            }
        );
        let relayed = ServerMessage::signal(SignalKind::IceCandidate, "a", payload.clone());
        assert_eq!(relayed.event_name(), "ice-candidate");
        assert_eq!(
            serde_json::to_value(relayed).unwrap(),
            json!({"event": "ice-candidate", "from": "a", "payload": {"sdp": "v=0"}})
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({"event": "kick-user", "id": "x"}));
        assert!(result.is_err());
    }
}
