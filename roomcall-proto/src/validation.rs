use thiserror::Error;

use crate::messages::ClientMessage;

pub const MAX_ROOM_ID_CHARS: usize = 64;
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;
pub const MAX_CHAT_BODY_CHARS: usize = 2000;
pub const MAX_PARTICIPANT_ID_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("{field} too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },

    #[error("{0} contains control characters")]
    ControlCharacters(&'static str),

    #[error("{0} payload is missing")]
    MissingPayload(&'static str),
}

/// Trim and bound a user supplied text field
pub fn check_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

fn check_identifier(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    check_text(field, value, max)?;
    if value.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters(field));
    }
    Ok(())
}

impl ClientMessage {
    /// Reject malformed payloads before they are dispatched
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::JoinRoom { room, name } => {
                check_identifier("Room", room, MAX_ROOM_ID_CHARS)?;
                check_identifier("Name", name, MAX_DISPLAY_NAME_CHARS)
            }
            Self::Offer { to, payload }
            | Self::Answer { to, payload }
            | Self::IceCandidate { to, payload } => {
                check_identifier("Target", to, MAX_PARTICIPANT_ID_CHARS)?;
                if payload.is_null() {
                    return Err(ValidationError::MissingPayload(self.event_name()));
                }
                Ok(())
            }
            Self::ChatMessage { body } => check_text("Chat message", body, MAX_CHAT_BODY_CHARS),
            Self::LeaveRoom | Self::MediaStateChange { .. } | Self::Ping => Ok(()),
        }
    }
}
