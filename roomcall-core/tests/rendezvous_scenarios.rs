//! End-to-end rendezvous scenarios through the service layer.
//!
//! Run with: cargo test -p roomcall-core --test rendezvous_scenarios

use std::collections::HashSet;
use std::sync::Arc;

use roomcall_core::config::RoomsConfig;
use roomcall_core::mirror::MirrorHandle;
use roomcall_core::models::{ParticipantId, RoomId};
use roomcall_core::service::{Rendezvous, SCREEN_SHARE_PREEMPTED};
use roomcall_core::sync::OutboundReceiver;
use roomcall_proto::{ChatKind, MediaKind, ServerMessage};

fn services() -> Rendezvous {
    Rendezvous::new(&RoomsConfig::default(), MirrorHandle::disabled())
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

fn disconnect(services: &Rendezvous, id: &ParticipantId) {
    services.registry.leave(id);
    services.hub.unregister(id);
}

#[test]
fn test_two_party_join_and_disconnect() {
    let services = services();
    let room = RoomId::from("r1");
    let (a, mut rx_a) = connect(&services, "a");
    let (b, mut rx_b) = connect(&services, "b");

    services.registry.join(&a, &room, "alice").unwrap();
    let events = drain(&mut rx_a);
    assert!(events.contains(&ServerMessage::RoomUsers { users: vec![] }));

    services.registry.join(&b, &room, "bob").unwrap();
    let a_events = drain(&mut rx_a);
    let joined: Vec<_> = a_events
        .iter()
        .filter_map(|e| match e {
            ServerMessage::UserJoined(info) => Some(info.id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(joined, vec!["b".to_string()]);

    let b_events = drain(&mut rx_b);
    let snapshot = b_events
        .iter()
        .find_map(|e| match e {
            ServerMessage::RoomUsers { users } => Some(users.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "a");
    assert_eq!(snapshot[0].name, "alice");

    disconnect(&services, &b);
    let a_events = drain(&mut rx_a);
    assert!(a_events.contains(&ServerMessage::UserLeft {
        id: "b".to_string(),
        name: "bob".to_string()
    }));
    assert!(services.registry.stats(&room).is_some());

    disconnect(&services, &a);
    assert!(services.registry.stats(&room).is_none());
    assert_eq!(services.registry.room_count(), 0);
}

#[test]
fn test_member_set_tracks_join_leave_sequence() {
    let services = services();
    let room = RoomId::from("r1");
    let mut receivers = Vec::new();
    let mut expected = HashSet::new();

    let ids: Vec<ParticipantId> = (0..8).map(|i| ParticipantId::from(format!("p{i}"))).collect();
    for id in &ids {
        receivers.push(services.hub.register(id.clone()));
    }

    let script: [(usize, bool); 12] = [
        (0, true),
        (1, true),
        (2, true),
        (1, false),
        (3, true),
        (1, true),
        (0, false),
        (0, false),
        (4, true),
        (2, false),
        (5, true),
        (3, false),
    ];
    for (index, join) in script {
        let id = &ids[index];
        if join {
            services.registry.join(id, &room, "user").unwrap();
            expected.insert(id.clone());
        } else {
            services.registry.leave(id);
            expected.remove(id);
        }

        let members = services
            .registry
            .inspect(&room, |current| current.member_ids().cloned().collect::<HashSet<_>>());
        match members {
            Some(members) => assert_eq!(members, expected),
            None => assert!(expected.is_empty()),
        }
    }
}

#[test]
fn test_screen_share_preemption() {
    let services = services();
    let room = RoomId::from("r1");
    let (a, mut rx_a) = connect(&services, "a");
    let (b, mut rx_b) = connect(&services, "b");
    services.registry.join(&a, &room, "alice").unwrap();
    services.registry.join(&b, &room, "bob").unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    services
        .media
        .set_media_flag(&a, MediaKind::ScreenShare, true)
        .unwrap();
    let b_events = drain(&mut rx_b);
    assert!(b_events.iter().any(|e| matches!(
        e,
        ServerMessage::MediaStateChanged { user_id, kind: MediaKind::ScreenShare, enabled: true, .. }
            if user_id == "a"
    )));
    drain(&mut rx_a);

    services
        .media
        .set_media_flag(&b, MediaKind::ScreenShare, true)
        .unwrap();

    let a_events = drain(&mut rx_a);
    let stops: Vec<_> = a_events
        .iter()
        .filter(|e| matches!(e, ServerMessage::ScreenShareStopped { .. }))
        .collect();
    assert_eq!(
        stops,
        vec![&ServerMessage::ScreenShareStopped {
            reason: SCREEN_SHARE_PREEMPTED.to_string()
        }]
    );
    assert!(!drain(&mut rx_b)
        .iter()
        .any(|e| matches!(e, ServerMessage::ScreenShareStopped { .. })));

    let current = services.registry.inspect(&room, Clone::clone).unwrap();
    assert_eq!(current.active_screen_sharer(), Some(&b));
    assert!(!current.member(&a).unwrap().media.screen_share);
    assert!(current.member(&b).unwrap().media.screen_share);
}

#[test]
fn test_sharer_leaving_ends_share() {
    let services = services();
    let room = RoomId::from("r1");
    let (a, mut rx_a) = connect(&services, "a");
    let (b, _rx_b) = connect(&services, "b");
    services.registry.join(&a, &room, "alice").unwrap();
    services.registry.join(&b, &room, "bob").unwrap();
    services
        .media
        .set_media_flag(&b, MediaKind::ScreenShare, true)
        .unwrap();
    drain(&mut rx_a);

    disconnect(&services, &b);
    let events = drain(&mut rx_a);
    let ended = events
        .iter()
        .position(|e| matches!(e, ServerMessage::ScreenShareEnded { user_id } if user_id == "b"))
        .unwrap();
    let left = events
        .iter()
        .position(|e| matches!(e, ServerMessage::UserLeft { id, .. } if id == "b"))
        .unwrap();
    assert!(ended < left);
    assert!(services.registry.stats(&room).unwrap().active_screen_sharer.is_none());
}

#[test]
fn test_holder_disabling_clears_share() {
    let services = services();
    let room = RoomId::from("r1");
    let (a, _rx_a) = connect(&services, "a");
    services.registry.join(&a, &room, "alice").unwrap();

    services.media.set_media_flag(&a, MediaKind::ScreenShare, true).unwrap();
    services.media.set_media_flag(&a, MediaKind::ScreenShare, false).unwrap();
    assert!(services.registry.stats(&room).unwrap().active_screen_sharer.is_none());
}

#[test]
fn test_chat_history_is_bounded_fifo() {
    let services = services();
    let room = RoomId::from("r1");
    let (a, mut rx_a) = connect(&services, "a");
    services.registry.join(&a, &room, "alice").unwrap();

    for i in 0..150 {
        services.chat.post(&a, &format!("message {i}")).unwrap();
        drain(&mut rx_a);
    }

    let history = services.chat.history(&room);
    assert_eq!(history.len(), 100);
    assert!(history.iter().all(|m| m.kind == ChatKind::Text));
    assert_eq!(history.first().unwrap().body, "message 50");
    assert_eq!(history.last().unwrap().body, "message 149");
}

#[test]
fn test_chat_reaches_sender_and_peers_in_one_order() {
    let services = services();
    let room = RoomId::from("r1");
    let (a, mut rx_a) = connect(&services, "a");
    let (b, mut rx_b) = connect(&services, "b");
    services.registry.join(&a, &room, "alice").unwrap();
    services.registry.join(&b, &room, "bob").unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    services.chat.post(&a, "first").unwrap();
    services.chat.post(&b, "second").unwrap();

    let bodies = |events: Vec<ServerMessage>| -> Vec<String> {
        events
            .into_iter()
            .filter_map(|e| match e {
                ServerMessage::ChatMessage(entry) => Some(entry.body),
                _ => None,
            })
            .collect()
    };
    let seen_by_a = bodies(drain(&mut rx_a));
    let seen_by_b = bodies(drain(&mut rx_b));
    assert_eq!(seen_by_a, vec!["first", "second"]);
    assert_eq!(seen_by_a, seen_by_b);
}

#[test]
fn test_joiner_history_contains_system_entries() {
    let services = services();
    let room = RoomId::from("r1");
    let (a, _rx_a) = connect(&services, "a");
    let (b, _rx_b) = connect(&services, "b");
    services.registry.join(&a, &room, "alice").unwrap();
    services.chat.post(&a, "hello").unwrap();

    let snapshot = services.registry.join(&b, &room, "bob").unwrap();
    let kinds: Vec<_> = snapshot.chat_history.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ChatKind::SystemJoin, ChatKind::Text, ChatKind::SystemJoin]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_respect_capacity_and_ordering() {
    let config = RoomsConfig {
        max_members: 6,
        ..RoomsConfig::default()
    };
    let services = Arc::new(Rendezvous::new(&config, MirrorHandle::disabled()));
    let room = RoomId::from("busy");

    let mut receivers = Vec::new();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let id = ParticipantId::from(format!("p{i}"));
        receivers.push((id.clone(), services.hub.register(id.clone())));
        let services = Arc::clone(&services);
        let room = room.clone();
        tasks.push(tokio::spawn(async move {
            services.registry.join(&id, &room, "user").is_ok()
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 6);
    assert_eq!(services.registry.stats(&room).unwrap().member_count, 6);

    for (id, mut rx) in receivers {
        let events = drain(&mut rx);
        if services.registry.room_of(&id).is_none() {
            assert!(events.is_empty());
            continue;
        }
        // Nothing about later joiners may precede our own snapshot.
        let snapshot_at = events
            .iter()
            .position(|e| matches!(e, ServerMessage::RoomUsers { .. }))
            .unwrap();
        assert!(events[..snapshot_at]
            .iter()
            .all(|e| !matches!(e, ServerMessage::UserJoined(_))));

        let ServerMessage::RoomUsers { users } = &events[snapshot_at] else {
            unreachable!()
        };
        let joined_after = events
            .iter()
            .filter(|e| matches!(e, ServerMessage::UserJoined(_)))
            .count();
        assert_eq!(users.len() + joined_after, 5);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_join_leave_never_leaves_empty_room() {
    let services = Arc::new(services());
    let room = RoomId::from("churn");

    let mut tasks = Vec::new();
    for i in 0..8 {
        let services = Arc::clone(&services);
        let room = room.clone();
        tasks.push(tokio::spawn(async move {
            let id = ParticipantId::from(format!("c{i}"));
            let _rx = services.hub.register(id.clone());
            for _ in 0..50 {
                services.registry.join(&id, &room, "churner").unwrap();
                if let Some(current) = services.registry.stats(&room) {
                    assert!(current.member_count > 0);
                }
                services.registry.leave(&id);
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(services.registry.stats(&room).is_none());
    assert_eq!(services.registry.room_count(), 0);
    assert_eq!(services.registry.participant_count(), 0);
}
