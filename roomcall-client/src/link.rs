//! Negotiation state machine for a single remote participant.
//!
//! ```text
//! Idle ──create offer──▶ HaveLocalOffer ──answer──▶ Stable
//!  │                                                 │
//!  └──remote offer──▶ HaveRemoteOffer ──answer sent──┘
//!                                       (Stable also accepts a fresh offer)
//! ```
//!
//! Every state can move to `Closed`, which is terminal. Signals that do not
//! fit the current state are dropped, never applied.

use serde_json::Value;
use std::mem;
use tracing::{debug, warn};

use roomcall_proto::{ClientMessage, SignalKind};

use crate::engine::{LinkId, PeerConnection, RemoteStream, Role, VideoSource};
use crate::Result;

/// Remote candidates kept while no remote description is installed
pub const MAX_PENDING_CANDIDATES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    OfferSent,
    AnswerSent,
}

/// Coarse view of a link, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Negotiating(NegotiationStep),
    Connected,
    Closed,
}

/// Result of feeding a signal into a link
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Applied, and this frame must go back to the remote
    Reply(ClientMessage),
    /// Applied, nothing to send
    Accepted,
    /// Out of order for the current state, dropped
    Ignored,
}

pub struct PeerLink {
    remote_id: String,
    link_id: LinkId,
    role: Role,
    state: NegotiationState,
    connected: bool,
    remote_stream: Option<RemoteStream>,
    pending_candidates: Vec<Value>,
    connection: Box<dyn PeerConnection>,
}

impl std::fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerLink")
            .field("remote_id", &self.remote_id)
            .field("link_id", &self.link_id)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("connected", &self.connected)
            .field("pending_candidates", &self.pending_candidates.len())
            .finish_non_exhaustive()
    }
}

impl PeerLink {
    #[must_use]
    pub fn new(
        remote_id: impl Into<String>,
        link_id: LinkId,
        role: Role,
        connection: Box<dyn PeerConnection>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            link_id,
            role,
            state: NegotiationState::Idle,
            connected: false,
            remote_stream: None,
            pending_candidates: Vec::new(),
            connection,
        }
    }

    #[must_use]
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    #[must_use]
    pub const fn link_id(&self) -> LinkId {
        self.link_id
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn state(&self) -> NegotiationState {
        self.state
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, NegotiationState::Closed)
    }

    #[must_use]
    pub const fn remote_stream(&self) -> Option<&RemoteStream> {
        self.remote_stream.as_ref()
    }

    #[must_use]
    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    #[must_use]
    pub const fn status(&self) -> LinkStatus {
        match self.state {
            NegotiationState::Closed => LinkStatus::Closed,
            _ if self.connected => LinkStatus::Connected,
            NegotiationState::Idle => LinkStatus::Idle,
            NegotiationState::HaveLocalOffer => LinkStatus::Negotiating(NegotiationStep::OfferSent),
            NegotiationState::HaveRemoteOffer => {
                LinkStatus::Negotiating(NegotiationStep::AnswerSent)
            }
            NegotiationState::Stable => match self.role {
                Role::Initiator => LinkStatus::Negotiating(NegotiationStep::OfferSent),
                Role::Receiver => LinkStatus::Negotiating(NegotiationStep::AnswerSent),
            },
        }
    }

    const fn has_remote_description(&self) -> bool {
        matches!(
            self.state,
            NegotiationState::HaveRemoteOffer | NegotiationState::Stable
        )
    }

    /// Initiators open negotiation with an offer; anything else is a no-op.
    pub async fn start(&mut self) -> Result<Applied> {
        if self.role != Role::Initiator || self.state != NegotiationState::Idle {
            return Ok(Applied::Ignored);
        }
        let offer = match self.connection.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return Err(self.fail(e).await),
        };
        self.state = NegotiationState::HaveLocalOffer;
        Ok(Applied::Reply(ClientMessage::signal(
            SignalKind::Offer,
            self.remote_id.clone(),
            offer,
        )))
    }

    pub async fn handle_offer(&mut self, offer: Value) -> Result<Applied> {
        if !matches!(
            self.state,
            NegotiationState::Idle | NegotiationState::Stable
        ) {
            debug!(remote = %self.remote_id, state = ?self.state, "Dropping offer");
            return Ok(Applied::Ignored);
        }

        if let Err(e) = self.connection.accept_remote_offer(offer).await {
            return Err(self.fail(e).await);
        }
        self.state = NegotiationState::HaveRemoteOffer;
        self.flush_candidates().await;

        let answer = match self.connection.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return Err(self.fail(e).await),
        };
        self.state = NegotiationState::Stable;
        Ok(Applied::Reply(ClientMessage::signal(
            SignalKind::Answer,
            self.remote_id.clone(),
            answer,
        )))
    }

    pub async fn handle_answer(&mut self, answer: Value) -> Result<Applied> {
        if self.state != NegotiationState::HaveLocalOffer {
            debug!(remote = %self.remote_id, state = ?self.state, "Dropping answer");
            return Ok(Applied::Ignored);
        }

        if let Err(e) = self.connection.accept_remote_answer(answer).await {
            return Err(self.fail(e).await);
        }
        self.state = NegotiationState::Stable;
        self.flush_candidates().await;
        Ok(Applied::Accepted)
    }

    /// Applies the candidate now, or buffers it until a remote description
    /// exists. Rejected candidates are logged and otherwise ignored.
    pub async fn handle_ice_candidate(&mut self, candidate: Value) -> Result<Applied> {
        if self.is_closed() {
            return Ok(Applied::Ignored);
        }

        if !self.has_remote_description() {
            if self.pending_candidates.len() >= MAX_PENDING_CANDIDATES {
                warn!(remote = %self.remote_id, "Candidate buffer full, dropping candidate");
                return Ok(Applied::Ignored);
            }
            self.pending_candidates.push(candidate);
            return Ok(Applied::Accepted);
        }

        if let Err(e) = self.connection.add_ice_candidate(candidate).await {
            warn!(remote = %self.remote_id, error = %e, "Failed to add ICE candidate");
            return Ok(Applied::Ignored);
        }
        Ok(Applied::Accepted)
    }

    async fn flush_candidates(&mut self) {
        for candidate in mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.connection.add_ice_candidate(candidate).await {
                warn!(remote = %self.remote_id, error = %e, "Failed to add buffered ICE candidate");
            }
        }
    }

    pub fn on_remote_stream(&mut self, stream: RemoteStream) {
        if !self.is_closed() {
            self.remote_stream = Some(stream);
        }
    }

    pub fn on_connected(&mut self) {
        if !self.is_closed() {
            self.connected = true;
        }
    }

    pub async fn replace_video_track(&mut self, source: VideoSource) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.connection.replace_video_track(source).await
    }

    /// Release the connection. Idempotent.
    pub async fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.connection.close().await;
        self.state = NegotiationState::Closed;
        self.connected = false;
        self.remote_stream = None;
        self.pending_candidates.clear();
    }

    async fn fail(&mut self, error: crate::ClientError) -> crate::ClientError {
        warn!(remote = %self.remote_id, error = %error, "Negotiation failed, closing link");
        self.close().await;
        error
    }
}
