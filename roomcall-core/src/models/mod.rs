pub mod chat;
pub mod id;
pub mod participant;
pub mod room;

pub use chat::ChatMessage;
pub use id::{generate_id, ParticipantId, RoomId};
pub use participant::Participant;
pub use room::{Room, RoomSettings};
