use roomcall_proto::validation::{check_text, MAX_CHAT_BODY_CHARS};
use roomcall_proto::ServerMessage;
use std::sync::Arc;
use tracing::debug;

use super::registry::RoomRegistry;
use crate::models::{ChatMessage, ParticipantId, RoomId};
use crate::sync::ConnectionHub;
use crate::{Error, Result};

/// Per-room chat: append to the bounded log, then broadcast to every
/// member including the sender. Clients render from the broadcast so all
/// members see one order.
#[derive(Clone)]
pub struct ChatRelay {
    registry: Arc<RoomRegistry>,
    hub: Arc<ConnectionHub>,
}

impl ChatRelay {
    #[must_use]
    pub const fn new(registry: Arc<RoomRegistry>, hub: Arc<ConnectionHub>) -> Self {
        Self { registry, hub }
    }

    pub fn post(&self, participant_id: &ParticipantId, body: &str) -> Result<ChatMessage> {
        self.registry.with_member_room(participant_id, |room| {
            if !room.settings().allow_chat {
                return Err(Error::ChatDisabled);
            }
            check_text("Chat message", body, MAX_CHAT_BODY_CHARS)?;

            let sender = room.member(participant_id).ok_or(Error::NotInRoom)?;
            let message = ChatMessage::text(participant_id.clone(), &sender.display_name, body);
            room.push_chat(message.clone());

            let delivered = self.hub.broadcast(
                room.member_ids(),
                &ServerMessage::ChatMessage(message.to_entry()),
                None,
            );
            debug!(
                room_id = %room.id(),
                participant_id = %participant_id,
                message_id = %message.id,
                delivered,
                "Chat message posted"
            );
            Ok(message)
        })
    }

    /// Current log of a room, oldest first
    #[must_use]
    pub fn history(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        self.registry
            .inspect(room_id, |room| room.chat_history().cloned().collect())
            .unwrap_or_default()
    }
}
