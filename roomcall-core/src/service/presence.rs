use roomcall_proto::{ChatEntry, ParticipantInfo, RoomState, ServerMessage};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{Participant, ParticipantId, Room};
use crate::sync::ConnectionHub;
use crate::{Error, Result};

/// What a joiner learns about the room it entered
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room: RoomState,
    pub you: ParticipantInfo,
    /// Members present before the join, oldest first
    pub members: Vec<ParticipantInfo>,
    pub chat_history: Vec<ChatEntry>,
}

/// Pushes membership deltas to room members.
///
/// All methods are called with the room lock held so that what a member
/// receives always follows the order in which the registry mutated the room.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    hub: Arc<ConnectionHub>,
}

impl PresenceBroadcaster {
    #[must_use]
    pub const fn new(hub: Arc<ConnectionHub>) -> Self {
        Self { hub }
    }

    /// Send the joiner its snapshot, then tell everyone else
    pub fn announce_join(&self, room: &Room, joiner: &ParticipantId) -> Result<RoomSnapshot> {
        let you = room
            .member(joiner)
            .map(Participant::to_info)
            .ok_or_else(|| Error::Internal(format!("joiner {joiner} missing from room")))?;

        let snapshot = RoomSnapshot {
            room: room.state(),
            you: you.clone(),
            members: room.others(joiner),
            chat_history: room.chat_entries(),
        };

        self.deliver(
            joiner,
            ServerMessage::JoinedRoom {
                room: snapshot.room.clone(),
                you: snapshot.you.clone(),
                members: snapshot.members.clone(),
                chat_history: snapshot.chat_history.clone(),
            },
        );
        self.deliver(
            joiner,
            ServerMessage::RoomUsers {
                users: snapshot.members.clone(),
            },
        );

        let notified = self
            .hub
            .broadcast(room.member_ids(), &ServerMessage::UserJoined(you), Some(joiner));
        debug!(
            room_id = %room.id(),
            participant_id = %joiner,
            notified,
            "Announced join"
        );

        self.announce_stats(room);
        Ok(snapshot)
    }

    /// Tell the remaining members that `departed` is gone
    pub fn announce_leave(&self, room: &Room, departed: &Participant, was_sharing: bool) {
        if was_sharing {
            self.hub.broadcast(
                room.member_ids(),
                &ServerMessage::ScreenShareEnded {
                    user_id: departed.id.to_string(),
                },
                None,
            );
        }

        let notified = self.hub.broadcast(
            room.member_ids(),
            &ServerMessage::UserLeft {
                id: departed.id.to_string(),
                name: departed.display_name.clone(),
            },
            None,
        );
        debug!(
            room_id = %room.id(),
            participant_id = %departed.id,
            notified,
            "Announced leave"
        );

        self.announce_stats(room);
    }

    pub fn announce_stats(&self, room: &Room) {
        self.hub.broadcast(
            room.member_ids(),
            &ServerMessage::RoomStatsUpdated(room.stats()),
            None,
        );
    }

    fn deliver(&self, participant_id: &ParticipantId, message: ServerMessage) {
        if let Err(e) = self.hub.send(participant_id, message) {
            warn!(participant_id = %participant_id, error = %e, "Failed to deliver presence event");
        }
    }
}
