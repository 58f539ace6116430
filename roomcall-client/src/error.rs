use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,

    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

pub type Result<T> = std::result::Result<T, ClientError>;
