use chrono::{DateTime, Utc};
use roomcall_proto::{ChatEntry, ChatKind};

use super::id::ParticipantId;

/// Immutable chat log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: ParticipantId,
    pub sender_name: String,
    pub body: String,
    pub kind: ChatKind,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn build(sender_id: ParticipantId, sender_name: &str, body: String, kind: ChatKind) -> Self {
        let timestamp = Utc::now();
        Self {
            id: format!("msg_{}_{}", timestamp.timestamp_millis(), nanoid::nanoid!(9)),
            sender_id,
            sender_name: sender_name.to_string(),
            body,
            kind,
            timestamp,
        }
    }

    #[must_use]
    pub fn text(sender_id: ParticipantId, sender_name: &str, body: &str) -> Self {
        Self::build(sender_id, sender_name, body.trim().to_string(), ChatKind::Text)
    }

    #[must_use]
    pub fn system_join(sender_id: ParticipantId, sender_name: &str) -> Self {
        let body = format!("{sender_name} joined the room");
        Self::build(sender_id, sender_name, body, ChatKind::SystemJoin)
    }

    #[must_use]
    pub fn system_leave(sender_id: ParticipantId, sender_name: &str) -> Self {
        let body = format!("{sender_name} left the room");
        Self::build(sender_id, sender_name, body, ChatKind::SystemLeave)
    }

    #[must_use]
    pub fn to_entry(&self) -> ChatEntry {
        ChatEntry {
            id: self.id.clone(),
            sender_id: self.sender_id.as_str().to_string(),
            sender_name: self.sender_name.clone(),
            body: self.body.clone(),
            kind: self.kind,
            timestamp: self.timestamp.timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_is_trimmed() {
        let msg = ChatMessage::text(ParticipantId::from("p1"), "alice", "  hello \n");
        assert_eq!(msg.body, "hello");
        assert_eq!(msg.kind, ChatKind::Text);
        assert!(msg.id.starts_with("msg_"));
    }

    #[test]
    fn test_system_entries() {
        let join = ChatMessage::system_join(ParticipantId::from("p1"), "alice");
        assert_eq!(join.kind, ChatKind::SystemJoin);
        assert_eq!(join.body, "alice joined the room");

        let entry = ChatMessage::system_leave(ParticipantId::from("p1"), "alice").to_entry();
        assert_eq!(entry.kind, ChatKind::SystemLeave);
        assert_eq!(entry.sender_id, "p1");
    }
}
