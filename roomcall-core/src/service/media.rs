use roomcall_proto::{MediaFlags, MediaKind, ServerMessage};
use std::sync::Arc;
use tracing::{info, warn};

use super::registry::RoomRegistry;
use crate::models::{ParticipantId, Room};
use crate::sync::ConnectionHub;
use crate::{Error, Result};

/// Reason sent to a participant whose screen share was taken over
pub const SCREEN_SHARE_PREEMPTED: &str = "Another user started sharing";

/// Applies media flag changes and keeps screen share single-owner.
///
/// Enabling screen share while someone else holds it moves ownership to the
/// new sharer and notifies the previous one; it is never queued or rejected.
#[derive(Clone)]
pub struct MediaStateCoordinator {
    registry: Arc<RoomRegistry>,
    hub: Arc<ConnectionHub>,
}

impl MediaStateCoordinator {
    #[must_use]
    pub const fn new(registry: Arc<RoomRegistry>, hub: Arc<ConnectionHub>) -> Self {
        Self { registry, hub }
    }

    pub fn set_media_flag(
        &self,
        participant_id: &ParticipantId,
        kind: MediaKind,
        enabled: bool,
    ) -> Result<MediaFlags> {
        self.registry.with_member_room(participant_id, |room| {
            let mut sharer_changed = false;

            if kind == MediaKind::ScreenShare {
                if enabled {
                    if !room.settings().allow_screen_share {
                        return Err(Error::ScreenShareDisabled);
                    }
                    let previous = room
                        .active_screen_sharer()
                        .filter(|holder| *holder != participant_id)
                        .cloned();
                    if let Some(previous) = previous {
                        self.preempt(room, &previous);
                    }
                    sharer_changed = room.active_screen_sharer() != Some(participant_id);
                    room.set_active_screen_sharer(Some(participant_id.clone()));
                } else if room.active_screen_sharer() == Some(participant_id) {
                    room.set_active_screen_sharer(None);
                    sharer_changed = true;
                }
            }

            let member = room.member_mut(participant_id).ok_or(Error::NotInRoom)?;
            member.media.set(kind, enabled);
            let media = member.media;
            let user_name = member.display_name.clone();

            self.hub.broadcast(
                room.member_ids(),
                &ServerMessage::MediaStateChanged {
                    user_id: participant_id.to_string(),
                    user_name,
                    kind,
                    enabled,
                    media,
                },
                None,
            );

            if sharer_changed {
                self.registry.presence().announce_stats(room);
            }
            Ok(media)
        })
    }

    /// Force the current holder's screen share off
    fn preempt(&self, room: &mut Room, previous: &ParticipantId) {
        let Some(holder) = room.member_mut(previous) else {
            return;
        };
        holder.media.screen_share = false;
        let media = holder.media;
        let user_name = holder.display_name.clone();

        if let Err(e) = self.hub.send(
            previous,
            ServerMessage::ScreenShareStopped {
                reason: SCREEN_SHARE_PREEMPTED.to_string(),
            },
        ) {
            warn!(participant_id = %previous, error = %e, "Failed to notify preempted sharer");
        }

        self.hub.broadcast(
            room.member_ids(),
            &ServerMessage::MediaStateChanged {
                user_id: previous.to_string(),
                user_name,
                kind: MediaKind::ScreenShare,
                enabled: false,
                media,
            },
            None,
        );

        info!(room_id = %room.id(), previous = %previous, "Screen share preempted");
    }
}
