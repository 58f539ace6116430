//! The collection of links for the room the local participant is in.
//!
//! Roles follow from who arrived first: members listed in `room-users` were
//! already present, so they will offer and we receive. Members announced by
//! `user-joined` arrived after us, so we offer. Exactly one side of every
//! pair initiates.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use roomcall_proto::{ClientMessage, ParticipantInfo};

use crate::engine::{EngineEvent, EngineEventKind, EngineEventSender, LinkId, PeerEngine, Role, VideoSource};
use crate::link::{Applied, PeerLink};
use crate::media::LocalMedia;
use crate::Result;

pub struct PeerSet {
    local_id: Option<String>,
    links: HashMap<String, PeerLink>,
    next_link_id: u64,
    engine: Arc<dyn PeerEngine>,
    media: Arc<LocalMedia>,
    events: EngineEventSender,
}

impl PeerSet {
    #[must_use]
    pub fn new(engine: Arc<dyn PeerEngine>, media: Arc<LocalMedia>, events: EngineEventSender) -> Self {
        Self {
            local_id: None,
            links: HashMap::new(),
            next_link_id: 0,
            engine,
            media,
            events,
        }
    }

    pub fn set_local_id(&mut self, id: impl Into<String>) {
        self.local_id = Some(id.into());
    }

    #[must_use]
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[must_use]
    pub fn get(&self, remote_id: &str) -> Option<&PeerLink> {
        self.links.get(remote_id)
    }

    /// Remote ids in sorted order
    #[must_use]
    pub fn remote_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.links.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Create a link unless one exists or `remote_id` is ourselves
    fn open(&mut self, remote_id: &str, role: Role) -> Result<bool> {
        if self.local_id.as_deref() == Some(remote_id) || self.links.contains_key(remote_id) {
            return Ok(false);
        }

        self.next_link_id += 1;
        let link_id = LinkId(self.next_link_id);
        let connection = self.engine.connect(
            remote_id,
            link_id,
            role,
            self.media.clone(),
            self.events.clone(),
        )?;
        self.links
            .insert(remote_id.to_string(), PeerLink::new(remote_id, link_id, role, connection));
        debug!(remote = %remote_id, ?role, "Opened peer link");
        Ok(true)
    }

    /// Members already present will send us offers
    pub fn on_room_users(&mut self, users: &[ParticipantInfo]) {
        for user in users {
            if let Err(e) = self.open(&user.id, Role::Receiver) {
                warn!(remote = %user.id, error = %e, "Failed to open peer link");
            }
        }
    }

    /// A newcomer: we initiate
    pub async fn on_user_joined(&mut self, user: &ParticipantInfo) -> Option<ClientMessage> {
        match self.open(&user.id, Role::Initiator) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(remote = %user.id, error = %e, "Failed to open peer link");
                return None;
            }
        }

        let result = match self.links.get_mut(&user.id) {
            Some(link) => link.start().await,
            None => return None,
        };
        self.settle(&user.id, result)
    }

    /// Returns whether a link existed
    pub async fn on_user_left(&mut self, remote_id: &str) -> bool {
        match self.links.remove(remote_id) {
            Some(mut link) => {
                link.close().await;
                info!(remote = %remote_id, "Closed peer link");
                true
            }
            None => false,
        }
    }

    pub async fn on_offer(&mut self, from: &str, offer: Value) -> Option<ClientMessage> {
        let Some(link) = self.links.get_mut(from) else {
            debug!(remote = %from, "Dropping offer from unknown participant");
            return None;
        };
        let result = link.handle_offer(offer).await;
        self.settle(from, result)
    }

    pub async fn on_answer(&mut self, from: &str, answer: Value) -> Option<ClientMessage> {
        let Some(link) = self.links.get_mut(from) else {
            debug!(remote = %from, "Dropping answer from unknown participant");
            return None;
        };
        let result = link.handle_answer(answer).await;
        self.settle(from, result)
    }

    pub async fn on_ice_candidate(&mut self, from: &str, candidate: Value) -> Option<ClientMessage> {
        let Some(link) = self.links.get_mut(from) else {
            debug!(remote = %from, "Dropping candidate from unknown participant");
            return None;
        };
        let result = link.handle_ice_candidate(candidate).await;
        self.settle(from, result)
    }

    /// Events from a link that has since been replaced or removed are dropped.
    pub async fn on_engine_event(&mut self, event: EngineEvent) -> Option<ClientMessage> {
        let link = match self.links.get_mut(&event.remote_id) {
            Some(link) if link.link_id() == event.link_id && !link.is_closed() => link,
            _ => {
                debug!(remote = %event.remote_id, "Dropping stale engine event");
                return None;
            }
        };

        match event.kind {
            EngineEventKind::LocalCandidate(candidate) => Some(ClientMessage::IceCandidate {
                to: event.remote_id,
                payload: candidate,
            }),
            EngineEventKind::RemoteStream(stream) => {
                link.on_remote_stream(stream);
                None
            }
            EngineEventKind::Connected => {
                link.on_connected();
                None
            }
            EngineEventKind::Failed(reason) => {
                warn!(remote = %event.remote_id, %reason, "Peer connection failed");
                self.on_user_left(&event.remote_id).await;
                None
            }
        }
    }

    pub async fn replace_video_track(&mut self, source: VideoSource) {
        for (remote_id, link) in &mut self.links {
            if let Err(e) = link.replace_video_track(source).await {
                warn!(remote = %remote_id, error = %e, "Failed to replace video track");
            }
        }
    }

    pub async fn close_all(&mut self) {
        for (_, mut link) in self.links.drain() {
            link.close().await;
        }
    }

    /// A failed link has already closed itself; forget it
    fn settle(&mut self, remote_id: &str, result: Result<Applied>) -> Option<ClientMessage> {
        match result {
            Ok(Applied::Reply(message)) => Some(message),
            Ok(Applied::Accepted | Applied::Ignored) => None,
            Err(e) => {
                warn!(remote = %remote_id, error = %e, "Removing failed peer link");
                self.links.remove(remote_id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PeerConnection;
    use crate::link::NegotiationState;
    use crate::ClientError;
    use async_trait::async_trait;
    use roomcall_proto::MediaFlags;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct NullConnection;

    #[async_trait]
    impl PeerConnection for NullConnection {
        async fn create_offer(&mut self) -> Result<Value> {
            Ok(json!("offer"))
        }
        async fn accept_remote_offer(&mut self, _offer: Value) -> Result<()> {
            Ok(())
        }
        async fn create_answer(&mut self) -> Result<Value> {
            Ok(json!("answer"))
        }
        async fn accept_remote_answer(&mut self, _answer: Value) -> Result<()> {
            Ok(())
        }
        async fn add_ice_candidate(&mut self, _candidate: Value) -> Result<()> {
            Ok(())
        }
        async fn replace_video_track(&mut self, _source: VideoSource) -> Result<()> {
            Ok(())
        }
        async fn close(&mut self) {}
    }

    struct NullEngine {
        refuse: Option<&'static str>,
    }

    impl PeerEngine for NullEngine {
        fn connect(
            &self,
            remote_id: &str,
            _link_id: LinkId,
            _role: Role,
            _media: Arc<LocalMedia>,
            _events: EngineEventSender,
        ) -> Result<Box<dyn PeerConnection>> {
            if self.refuse == Some(remote_id) {
                return Err(ClientError::Engine("refused".into()));
            }
            Ok(Box::new(NullConnection))
        }
    }

    fn peer_set() -> PeerSet {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut set = PeerSet::new(
            Arc::new(NullEngine { refuse: None }),
            Arc::new(LocalMedia::audio_video("me")),
            tx,
        );
        set.set_local_id("me");
        set
    }

    fn info(id: &str) -> ParticipantInfo {
        ParticipantInfo {
            id: id.to_string(),
            name: id.to_uppercase(),
            media: MediaFlags::default(),
            is_moderator: false,
            joined_at: 0,
        }
    }

    #[tokio::test]
    async fn test_room_users_become_receivers() {
        let mut set = peer_set();
        set.on_room_users(&[info("a"), info("b"), info("me")]);
        assert_eq!(set.remote_ids(), vec!["a", "b"]);
        assert_eq!(set.get("a").unwrap().role(), Role::Receiver);
        assert_eq!(set.get("a").unwrap().state(), NegotiationState::Idle);
    }

    #[tokio::test]
    async fn test_newcomer_gets_offer() {
        let mut set = peer_set();
        let message = set.on_user_joined(&info("c")).await;
        assert!(matches!(message, Some(ClientMessage::Offer { ref to, .. }) if to == "c"));
        assert_eq!(set.get("c").unwrap().role(), Role::Initiator);

        // duplicate announcement does not renegotiate
        assert!(set.on_user_joined(&info("c")).await.is_none());
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_signals_from_unknown_remote_are_dropped() {
        let mut set = peer_set();
        assert!(set.on_offer("ghost", json!("offer")).await.is_none());
        assert!(set.on_answer("ghost", json!("answer")).await.is_none());
        assert!(set.on_ice_candidate("ghost", json!("c")).await.is_none());
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_user_left_closes_link() {
        let mut set = peer_set();
        set.on_room_users(&[info("a")]);
        assert!(set.on_user_left("a").await);
        assert!(!set.on_user_left("a").await);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_engine_refusal_leaves_no_link() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut set = PeerSet::new(
            Arc::new(NullEngine { refuse: Some("a") }),
            Arc::new(LocalMedia::audio_video("me")),
            tx,
        );
        set.on_room_users(&[info("a"), info("b")]);
        assert_eq!(set.remote_ids(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_stale_engine_events_are_dropped() {
        let mut set = peer_set();
        set.on_room_users(&[info("a")]);
        let current = set.get("a").unwrap().link_id();

        let stale = EngineEvent {
            remote_id: "a".into(),
            link_id: LinkId(current.0 + 100),
            kind: EngineEventKind::LocalCandidate(json!("c")),
        };
        assert!(set.on_engine_event(stale).await.is_none());

        let fresh = EngineEvent {
            remote_id: "a".into(),
            link_id: current,
            kind: EngineEventKind::LocalCandidate(json!("c")),
        };
        assert_eq!(
            set.on_engine_event(fresh).await,
            Some(ClientMessage::IceCandidate { to: "a".into(), payload: json!("c") })
        );
    }

    #[tokio::test]
    async fn test_engine_failure_removes_link() {
        let mut set = peer_set();
        set.on_room_users(&[info("a")]);
        let link_id = set.get("a").unwrap().link_id();
        let failed = EngineEvent {
            remote_id: "a".into(),
            link_id,
            kind: EngineEventKind::Failed("ice".into()),
        };
        assert!(set.on_engine_event(failed).await.is_none());
        assert!(set.get("a").is_none());
    }
}
