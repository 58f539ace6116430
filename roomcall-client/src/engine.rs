//! Seam between the negotiation logic and the peer-to-peer media stack.
//!
//! A [`PeerEngine`] opens one [`PeerConnection`] per remote participant.
//! Connections report asynchronous happenings (local ICE candidates,
//! arriving media, connectivity) as [`EngineEvent`]s on the channel they were
//! given; the session consumes them on its event loop.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::media::LocalMedia;
use crate::Result;

/// Negotiation role towards one remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends the first offer
    Initiator,
    /// Waits for the remote's offer
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    Camera,
    Screen,
}

/// Distinguishes successive links to the same remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub u64);

/// Media arriving from a remote peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    LocalCandidate(Value),
    RemoteStream(RemoteStream),
    Connected,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub remote_id: String,
    pub link_id: LinkId,
    pub kind: EngineEventKind,
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// One peer connection. Payloads are opaque to everything above the engine.
#[async_trait]
pub trait PeerConnection: Send {
    /// Create an offer and install it as the local description
    async fn create_offer(&mut self) -> Result<Value>;

    async fn accept_remote_offer(&mut self, offer: Value) -> Result<()>;

    /// Create an answer to the installed remote offer and install it locally
    async fn create_answer(&mut self) -> Result<Value>;

    async fn accept_remote_answer(&mut self, answer: Value) -> Result<()>;

    async fn add_ice_candidate(&mut self, candidate: Value) -> Result<()>;

    /// Swap the outgoing video track in place, without renegotiating
    async fn replace_video_track(&mut self, source: VideoSource) -> Result<()>;

    async fn close(&mut self);
}

pub trait PeerEngine: Send + Sync {
    fn connect(
        &self,
        remote_id: &str,
        link_id: LinkId,
        role: Role,
        media: Arc<LocalMedia>,
        events: EngineEventSender,
    ) -> Result<Box<dyn PeerConnection>>;
}
