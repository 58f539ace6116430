//! Wire schema for the roomcall signaling channel.
//!
//! Every frame is a JSON object tagged by its `event` field. Client frames are
//! validated at the boundary (see [`codec::JsonCodec::decode_client_message`])
//! before they reach any room state.

pub mod codec;
pub mod messages;
pub mod types;
pub mod validation;

pub use codec::JsonCodec;
pub use messages::{ClientMessage, ServerMessage, SignalKind};
pub use types::{
    ChatEntry, ChatKind, MediaFlags, MediaKind, ParticipantInfo, RoomSettings, RoomState,
    RoomStats,
};
pub use validation::ValidationError;
