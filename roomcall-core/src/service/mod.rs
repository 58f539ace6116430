pub mod chat;
pub mod media;
pub mod presence;
pub mod registry;
pub mod relay;

pub use chat::ChatRelay;
pub use media::{MediaStateCoordinator, SCREEN_SHARE_PREEMPTED};
pub use presence::{PresenceBroadcaster, RoomSnapshot};
pub use registry::{LeaveOutcome, RoomRegistry};
pub use relay::SignalingRelay;

use std::sync::Arc;

use crate::config::RoomsConfig;
use crate::mirror::MirrorHandle;
use crate::sync::ConnectionHub;

/// The server-side services, wired around one registry and one hub
#[derive(Clone)]
pub struct Rendezvous {
    pub hub: Arc<ConnectionHub>,
    pub registry: Arc<RoomRegistry>,
    pub relay: SignalingRelay,
    pub media: MediaStateCoordinator,
    pub chat: ChatRelay,
}

impl Rendezvous {
    #[must_use]
    pub fn new(config: &RoomsConfig, mirror: MirrorHandle) -> Self {
        let hub = Arc::new(ConnectionHub::new(config.outbound_queue_capacity));
        let presence = PresenceBroadcaster::new(Arc::clone(&hub));
        let registry = Arc::new(RoomRegistry::new(
            presence,
            mirror,
            config.room_settings(),
            config.chat_history_limit,
        ));

        Self {
            relay: SignalingRelay::new(Arc::clone(&hub)),
            media: MediaStateCoordinator::new(Arc::clone(&registry), Arc::clone(&hub)),
            chat: ChatRelay::new(Arc::clone(&registry), Arc::clone(&hub)),
            registry,
            hub,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParticipantId, RoomId};
    use crate::Error;
    use roomcall_proto::{MediaKind, ServerMessage};
    use crate::sync::OutboundReceiver;

    fn rendezvous(max_members: usize) -> Rendezvous {
        let config = RoomsConfig {
            max_members,
            ..RoomsConfig::default()
        };
        Rendezvous::new(&config, MirrorHandle::disabled())
    }

    fn connect(services: &Rendezvous, id: &str) -> (ParticipantId, OutboundReceiver) {
        let id = ParticipantId::from(id);
        let rx = services.hub.register(id.clone());
        (id, rx)
    }

    fn drain(rx: &mut OutboundReceiver) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_join_sends_snapshot_before_anything_else() {
        let services = rendezvous(10);
        let (a, mut rx_a) = connect(&services, "a");
        let room = RoomId::from("r1");

        let snapshot = services.registry.join(&a, &room, "alice").unwrap();
        assert!(snapshot.members.is_empty());
        assert!(snapshot.you.is_moderator);

        let events = drain(&mut rx_a);
        assert_eq!(events[0].event_name(), "joined-room");
        assert_eq!(events[1], ServerMessage::RoomUsers { users: vec![] });
        assert_eq!(events[2].event_name(), "room-stats-updated");
    }

    #[test]
    fn test_room_full_leaves_target_untouched() {
        let services = rendezvous(1);
        let (a, _rx_a) = connect(&services, "a");
        let (b, mut rx_b) = connect(&services, "b");
        let room = RoomId::from("r1");

        services.registry.join(&a, &room, "alice").unwrap();
        let err = services.registry.join(&b, &room, "bob").unwrap_err();
        assert!(matches!(err, Error::RoomFull { max: 1, .. }));

        let current = services.registry.stats(&room).unwrap();
        assert_eq!(current.member_count, 1);
        assert!(services.registry.room_of(&b).is_none());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_join_other_room_leaves_previous() {
        let services = rendezvous(10);
        let (a, _rx_a) = connect(&services, "a");
        let (b, mut rx_b) = connect(&services, "b");

        services.registry.join(&a, &RoomId::from("r1"), "alice").unwrap();
        services.registry.join(&b, &RoomId::from("r1"), "bob").unwrap();
        drain(&mut rx_b);

        services.registry.join(&a, &RoomId::from("r2"), "alice").unwrap();
        assert_eq!(services.registry.room_of(&a), Some(RoomId::from("r2")));
        assert_eq!(services.registry.stats(&RoomId::from("r1")).unwrap().member_count, 1);

        let events = drain(&mut rx_b);
        assert!(events.contains(&ServerMessage::UserLeft {
            id: "a".to_string(),
            name: "alice".to_string()
        }));
    }

    #[test]
    fn test_room_id_is_trimmed() {
        let services = rendezvous(10);
        let (a, _rx_a) = connect(&services, "a");
        let (b, _rx_b) = connect(&services, "b");

        services.registry.join(&a, &RoomId::from("r1"), "alice").unwrap();
        let snapshot = services.registry.join(&b, &RoomId::from(" r1 "), "bob").unwrap();
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(services.registry.room_count(), 1);
        assert_eq!(services.registry.room_of(&b), Some(RoomId::from("r1")));
        assert_eq!(services.registry.stats(&RoomId::from("r1")).unwrap().member_count, 2);
    }

    #[test]
    fn test_room_lookup_reads_counts_only() {
        let services = rendezvous(10);
        let (a, _rx_a) = connect(&services, "a");
        let room = RoomId::from("r1");
        services.registry.join(&a, &room, "alice").unwrap();
        services.chat.post(&a, "hello").unwrap();

        let stats = services.registry.stats(&room).unwrap();
        assert_eq!(stats.room_id, "r1");
        assert_eq!(stats.member_count, 1);
        assert!(stats.active_screen_sharer.is_none());
        assert_eq!(services.registry.inspect(&room, |r| r.chat_history().count()), Some(1));
        assert!(services.registry.stats(&RoomId::from("nope")).is_none());
    }

    #[test]
    fn test_leave_is_idempotent() {
        let services = rendezvous(10);
        let (a, _rx_a) = connect(&services, "a");
        services.registry.join(&a, &RoomId::from("r1"), "alice").unwrap();

        let outcome = services.registry.leave(&a).unwrap();
        assert!(outcome.room_deleted);
        assert!(services.registry.leave(&a).is_none());
        assert_eq!(services.registry.room_count(), 0);
    }

    #[test]
    fn test_invalid_join_is_rejected_without_mutation() {
        let services = rendezvous(10);
        let (a, _rx_a) = connect(&services, "a");
        let err = services.registry.join(&a, &RoomId::from("  "), "alice").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(services.registry.room_count(), 0);
    }

    #[test]
    fn test_screen_share_disabled_room() {
        let config = RoomsConfig {
            allow_screen_share: false,
            ..RoomsConfig::default()
        };
        let services = Rendezvous::new(&config, MirrorHandle::disabled());
        let (a, _rx_a) = connect(&services, "a");
        services.registry.join(&a, &RoomId::from("r1"), "alice").unwrap();

        let err = services
            .media
            .set_media_flag(&a, MediaKind::ScreenShare, true)
            .unwrap_err();
        assert!(matches!(err, Error::ScreenShareDisabled));

        let flags = services.media.set_media_flag(&a, MediaKind::Audio, false).unwrap();
        assert!(!flags.audio);
    }

    #[test]
    fn test_chat_disabled_room() {
        let config = RoomsConfig {
            allow_chat: false,
            ..RoomsConfig::default()
        };
        let services = Rendezvous::new(&config, MirrorHandle::disabled());
        let (a, _rx_a) = connect(&services, "a");
        services.registry.join(&a, &RoomId::from("r1"), "alice").unwrap();

        let err = services.chat.post(&a, "hi").unwrap_err();
        assert!(matches!(err, Error::ChatDisabled));
        assert_eq!(err.client_message(), "Chat is disabled in this room");
    }

    #[test]
    fn test_operations_outside_room() {
        let services = rendezvous(10);
        let (a, _rx_a) = connect(&services, "a");
        assert!(matches!(services.chat.post(&a, "hi"), Err(Error::NotInRoom)));
        assert!(matches!(
            services.media.set_media_flag(&a, MediaKind::Video, false),
            Err(Error::NotInRoom)
        ));
    }
}
