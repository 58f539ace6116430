use serde::{Deserialize, Serialize};

/// Media capability a participant can toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Video,
    Audio,
    ScreenShare,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::ScreenShare => "screenShare",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current media flags of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFlags {
    pub video: bool,
    pub audio: bool,
    pub screen_share: bool,
}

impl Default for MediaFlags {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
            screen_share: false,
        }
    }
}

impl MediaFlags {
    #[must_use]
    pub const fn get(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.video,
            MediaKind::Audio => self.audio,
            MediaKind::ScreenShare => self.screen_share,
        }
    }

    pub fn set(&mut self, kind: MediaKind, enabled: bool) {
        match kind {
            MediaKind::Video => self.video = enabled,
            MediaKind::Audio => self.audio = enabled,
            MediaKind::ScreenShare => self.screen_share = enabled,
        }
    }
}

/// Public state of a room member as seen by other members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    pub media: MediaFlags,
    #[serde(default)]
    pub is_moderator: bool,
    /// Unix timestamp in milliseconds
    pub joined_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatKind {
    Text,
    SystemJoin,
    SystemLeave,
    SystemError,
}

/// A chat message as delivered to room members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub kind: ChatKind,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub max_members: usize,
    pub allow_chat: bool,
    pub allow_screen_share: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    pub id: String,
    pub settings: RoomSettings,
    pub active_screen_sharer: Option<String>,
    pub moderator_id: Option<String>,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStats {
    pub room_id: String,
    pub member_count: usize,
    pub active_screen_sharer: Option<String>,
    pub chat_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_flags_default() {
        let flags = MediaFlags::default();
        assert!(flags.video);
        assert!(flags.audio);
        assert!(!flags.screen_share);
    }

    #[test]
    fn test_media_flags_set() {
        let mut flags = MediaFlags::default();
        flags.set(MediaKind::ScreenShare, true);
        flags.set(MediaKind::Audio, false);
        assert!(flags.get(MediaKind::ScreenShare));
        assert!(!flags.get(MediaKind::Audio));
        assert!(flags.get(MediaKind::Video));
    }

    #[test]
    fn test_media_flags_wire_names() {
        let json = serde_json::to_value(MediaFlags::default()).unwrap();
        assert_eq!(json["screenShare"], false);
        assert_eq!(serde_json::to_value(MediaKind::ScreenShare).unwrap(), "screenShare");
    }

    #[test]
    fn test_chat_kind_wire_names() {
        assert_eq!(serde_json::to_value(ChatKind::SystemJoin).unwrap(), "system-join");
        assert_eq!(serde_json::to_value(ChatKind::Text).unwrap(), "text");
    }
}
