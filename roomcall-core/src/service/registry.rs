use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use roomcall_proto::validation::{check_text, MAX_DISPLAY_NAME_CHARS, MAX_ROOM_ID_CHARS};
use roomcall_proto::RoomStats;
use std::sync::Arc;
use tracing::{debug, info};

use super::presence::{PresenceBroadcaster, RoomSnapshot};
use crate::mirror::{MirrorHandle, MirrorOp};
use crate::models::{ChatMessage, Participant, ParticipantId, Room, RoomId, RoomSettings};
use crate::{Error, Result};

/// Result of a successful leave
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub room_id: RoomId,
    pub participant: Participant,
    pub was_screen_sharer: bool,
    pub room_deleted: bool,
}

/// Authoritative room <-> participant mapping.
///
/// Each room sits behind its own mutex, so mutations of one room are
/// serialized while different rooms proceed in parallel. A room is inserted
/// already locked and removed while still locked, which keeps an empty room
/// from ever being observable.
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<Mutex<Room>>>,
    memberships: DashMap<ParticipantId, RoomId>,
    presence: PresenceBroadcaster,
    mirror: MirrorHandle,
    settings: RoomSettings,
    history_limit: usize,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(
        presence: PresenceBroadcaster,
        mirror: MirrorHandle,
        settings: RoomSettings,
        history_limit: usize,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
            presence,
            mirror,
            settings,
            history_limit,
        }
    }

    #[must_use]
    pub const fn presence(&self) -> &PresenceBroadcaster {
        &self.presence
    }

    /// Admit `participant_id` to `room_id`, creating the room if needed.
    ///
    /// A participant already in a room (including this one) leaves it first.
    /// A full room is not modified.
    pub fn join(
        &self,
        participant_id: &ParticipantId,
        room_id: &RoomId,
        display_name: &str,
    ) -> Result<RoomSnapshot> {
        check_text("Room", room_id.as_str(), MAX_ROOM_ID_CHARS)?;
        check_text("Name", display_name, MAX_DISPLAY_NAME_CHARS)?;
        let room_id = &RoomId::from(room_id.as_str().trim());
        let display_name = display_name.trim();

        if self.memberships.contains_key(participant_id) {
            self.leave(participant_id);
        }

        loop {
            let existing = self.rooms.get(room_id).map(|entry| Arc::clone(entry.value()));

            if let Some(room) = existing {
                let mut guard = room.lock();
                if guard.is_closed() {
                    // Deleted between lookup and lock; the map no longer holds it.
                    continue;
                }
                return self.admit(&room, &mut guard, participant_id, display_name);
            }

            let fresh = Arc::new(Mutex::new(Room::new(
                room_id.clone(),
                participant_id.clone(),
                self.settings,
                self.history_limit,
            )));
            let mut guard = fresh.lock();
            match self.rooms.entry(room_id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&fresh));
                }
            }
            info!(
                room_id = %room_id,
                creator_id = %participant_id,
                max_members = self.settings.max_members,
                "Room created"
            );
            return self.admit(&fresh, &mut guard, participant_id, display_name);
        }
    }

    fn admit(
        &self,
        handle: &Arc<Mutex<Room>>,
        room: &mut Room,
        participant_id: &ParticipantId,
        display_name: &str,
    ) -> Result<RoomSnapshot> {
        if let Err(e) = room.add_member(Participant::new(participant_id.clone(), display_name)) {
            // Only a freshly created room can be empty here.
            if room.is_empty() {
                self.unlink(handle, room);
            }
            return Err(e);
        }

        self.memberships.insert(participant_id.clone(), room.id().clone());
        room.push_chat(ChatMessage::system_join(participant_id.clone(), display_name));

        let snapshot = self.presence.announce_join(room, participant_id)?;

        self.mirror.submit(MirrorOp::AddMember {
            room_id: room.id().clone(),
            participant_id: participant_id.clone(),
            display_name: display_name.to_string(),
        });
        self.mirror.submit(MirrorOp::IncrementConnections {
            room_id: room.id().clone(),
        });

        info!(
            room_id = %room.id(),
            participant_id = %participant_id,
            display_name = %display_name,
            member_count = room.member_count(),
            "Participant joined room"
        );
        Ok(snapshot)
    }

    /// Remove a participant from whatever room they are in. Idempotent.
    pub fn leave(&self, participant_id: &ParticipantId) -> Option<LeaveOutcome> {
        let (_, room_id) = self.memberships.remove(participant_id)?;
        let handle = self.rooms.get(&room_id).map(|entry| Arc::clone(entry.value()))?;
        let mut room = handle.lock();

        let (participant, was_screen_sharer) = room.remove_member(participant_id)?;
        room.push_chat(ChatMessage::system_leave(
            participant_id.clone(),
            &participant.display_name,
        ));

        let room_deleted = room.is_empty();
        if room_deleted {
            self.unlink(&handle, &mut room);
        } else {
            self.presence
                .announce_leave(&room, &participant, was_screen_sharer);
        }
        drop(room);

        self.mirror.submit(MirrorOp::RemoveMember {
            room_id: room_id.clone(),
            participant_id: participant_id.clone(),
        });

        info!(
            room_id = %room_id,
            participant_id = %participant_id,
            was_screen_sharer,
            room_deleted,
            "Participant left room"
        );

        Some(LeaveOutcome {
            room_id,
            participant,
            was_screen_sharer,
            room_deleted,
        })
    }

    /// Close an empty room and drop it from the map, unless it was replaced
    fn unlink(&self, handle: &Arc<Mutex<Room>>, room: &mut Room) {
        room.mark_closed();
        let removed = self
            .rooms
            .remove_if(room.id(), |_, current| Arc::ptr_eq(current, handle))
            .is_some();
        if removed {
            info!(room_id = %room.id(), "Room deleted");
        }
    }

    /// Run `f` against a live room with its lock held
    pub fn inspect<R>(&self, room_id: &RoomId, f: impl FnOnce(&Room) -> R) -> Option<R> {
        let handle = self.rooms.get(room_id).map(|entry| Arc::clone(entry.value()))?;
        let room = handle.lock();
        if room.is_closed() || room.is_empty() {
            return None;
        }
        Some(f(&room))
    }

    #[must_use]
    pub fn stats(&self, room_id: &RoomId) -> Option<RoomStats> {
        self.inspect(room_id, Room::stats)
    }

    #[must_use]
    pub fn room_of(&self, participant_id: &ParticipantId) -> Option<RoomId> {
        self.memberships
            .get(participant_id)
            .map(|entry| entry.value().clone())
    }

    /// Run `f` against the participant's room with the room lock held
    pub fn with_member_room<R>(
        &self,
        participant_id: &ParticipantId,
        f: impl FnOnce(&mut Room) -> Result<R>,
    ) -> Result<R> {
        let room_id = self.room_of(participant_id).ok_or(Error::NotInRoom)?;
        let handle = self
            .rooms
            .get(&room_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(Error::NotInRoom)?;
        let mut room = handle.lock();
        if room.is_closed() || !room.contains(participant_id) {
            debug!(participant_id = %participant_id, room_id = %room_id, "Stale membership");
            return Err(Error::NotInRoom);
        }
        f(&mut room)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.memberships.len()
    }
}
