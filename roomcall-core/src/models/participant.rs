use chrono::{DateTime, Utc};
use roomcall_proto::{MediaFlags, ParticipantInfo};

use super::id::ParticipantId;

/// A room member. Lives inside its room and is dropped on leave.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub media: MediaFlags,
    pub is_moderator: bool,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    #[must_use]
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            media: MediaFlags::default(),
            is_moderator: false,
            joined_at: Utc::now(),
        }
    }

    /// Public state shared with other members
    #[must_use]
    pub fn to_info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id.as_str().to_string(),
            name: self.display_name.clone(),
            media: self.media,
            is_moderator: self.is_moderator,
            joined_at: self.joined_at.timestamp_millis(),
        }
    }
}
