//! JSON text-frame codec shared by the server and the client transport

use crate::messages::{ClientMessage, ServerMessage};
use crate::validation::ValidationError;

pub struct JsonCodec;

impl JsonCodec {
    /// Decode and validate a client frame
    pub fn decode_client_message(text: &str) -> Result<ClientMessage, ValidationError> {
        let message: ClientMessage = serde_json::from_str(text)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    pub fn encode_server_message(message: &ServerMessage) -> Result<String, serde_json::Error> {
        serde_json::to_string(message)
    }

    pub fn decode_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode_client_message(message: &ClientMessage) -> Result<String, serde_json::Error> {
        serde_json::to_string(message)
    }
}
