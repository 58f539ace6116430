use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use roomcall_proto::{ChatEntry, ParticipantInfo, RoomState, RoomStats};

pub use roomcall_proto::RoomSettings;

use super::{ChatMessage, Participant, ParticipantId, RoomId};
use crate::{Error, Result};

/// Server-side room state.
///
/// A `Room` is only ever touched behind its registry mutex. Once the last
/// member leaves it is marked closed and unlinked from the registry, so a
/// caller that raced the deletion must look the room up again.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    created_at: DateTime<Utc>,
    creator_id: ParticipantId,
    members: HashMap<ParticipantId, Participant>,
    settings: RoomSettings,
    active_screen_sharer: Option<ParticipantId>,
    chat_history: VecDeque<ChatMessage>,
    history_limit: usize,
    closed: bool,
}

impl Room {
    #[must_use]
    pub fn new(
        id: RoomId,
        creator_id: ParticipantId,
        settings: RoomSettings,
        history_limit: usize,
    ) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            creator_id,
            members: HashMap::new(),
            settings,
            active_screen_sharer: None,
            chat_history: VecDeque::with_capacity(history_limit.min(128)),
            history_limit: history_limit.max(1),
            closed: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &RoomId {
        &self.id
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn creator_id(&self) -> &ParticipantId {
        &self.creator_id
    }

    #[must_use]
    pub const fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    #[must_use]
    pub const fn active_screen_sharer(&self) -> Option<&ParticipantId> {
        self.active_screen_sharer.as_ref()
    }

    pub(crate) fn set_active_screen_sharer(&mut self, sharer: Option<ParticipantId>) {
        self.active_screen_sharer = sharer;
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.settings.max_members
    }

    #[must_use]
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.members.contains_key(id)
    }

    #[must_use]
    pub fn member(&self, id: &ParticipantId) -> Option<&Participant> {
        self.members.get(id)
    }

    pub(crate) fn member_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.members.get_mut(id)
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.members.keys()
    }

    pub(crate) const fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Admit a participant. A full room is left untouched.
    pub(crate) fn add_member(&mut self, mut participant: Participant) -> Result<()> {
        if self.is_full() {
            return Err(Error::RoomFull {
                room_id: self.id.to_string(),
                max: self.settings.max_members,
            });
        }
        participant.is_moderator = participant.id == self.creator_id;
        self.members.insert(participant.id.clone(), participant);
        Ok(())
    }

    /// Remove a participant, clearing the screen share if they held it.
    /// Returns the removed member and whether they were sharing.
    pub(crate) fn remove_member(&mut self, id: &ParticipantId) -> Option<(Participant, bool)> {
        let participant = self.members.remove(id)?;
        let was_sharing = self.active_screen_sharer.as_ref() == Some(id);
        if was_sharing {
            self.active_screen_sharer = None;
        }
        Some((participant, was_sharing))
    }

    /// Members other than `id`, oldest first
    #[must_use]
    pub fn others(&self, id: &ParticipantId) -> Vec<ParticipantInfo> {
        let mut others: Vec<&Participant> =
            self.members.values().filter(|p| &p.id != id).collect();
        others.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        others.into_iter().map(Participant::to_info).collect()
    }

    /// Append to the chat log, evicting the oldest entries beyond the limit
    pub(crate) fn push_chat(&mut self, message: ChatMessage) {
        self.chat_history.push_back(message);
        while self.chat_history.len() > self.history_limit {
            self.chat_history.pop_front();
        }
    }

    pub fn chat_history(&self) -> impl Iterator<Item = &ChatMessage> {
        self.chat_history.iter()
    }

    #[must_use]
    pub fn chat_entries(&self) -> Vec<ChatEntry> {
        self.chat_history.iter().map(ChatMessage::to_entry).collect()
    }

    #[must_use]
    pub fn state(&self) -> RoomState {
        let moderator_id = self
            .members
            .contains_key(&self.creator_id)
            .then(|| self.creator_id.to_string());
        RoomState {
            id: self.id.to_string(),
            settings: self.settings,
            active_screen_sharer: self.active_screen_sharer.as_ref().map(ToString::to_string),
            moderator_id,
            created_at: self.created_at.timestamp_millis(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> RoomStats {
        RoomStats {
            room_id: self.id.to_string(),
            member_count: self.members.len(),
            active_screen_sharer: self.active_screen_sharer.as_ref().map(ToString::to_string),
            chat_enabled: self.settings.allow_chat,
        }
    }
}
