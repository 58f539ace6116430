use thiserror::Error;

use roomcall_proto::ValidationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Room {room_id} is full (max {max} members)")]
    RoomFull { room_id: String, max: usize },

    #[error("Chat is disabled in this room")]
    ChatDisabled,

    #[error("Screen sharing is disabled in this room")]
    ScreenShareDisabled,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport closed: {0}")]
    TransportClosed(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl Error {
    /// Message carried by the `error` event sent back to the client
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::RoomFull { .. } => "Room is full".to_string(),
            Self::ChatDisabled | Self::ScreenShareDisabled | Self::NotInRoom => self.to_string(),
            Self::NotFound(_) => "Participant not found".to_string(),
            Self::TransportClosed(_) | Self::Redis(_) | Self::Serialization(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Relay misses are expected and never reported to the sender
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::TransportClosed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
