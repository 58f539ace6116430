//! Transport-agnostic connection handling.
//!
//! A transport only has to provide a [`StreamMessage`] implementation;
//! registration, dispatch, outbound forwarding, liveness checks and the
//! implicit leave on disconnect all live in [`ConnectionHandler`].

use std::time::Duration;

use roomcall_core::models::{ParticipantId, RoomId};
use roomcall_core::service::Rendezvous;
use roomcall_core::Result;
use roomcall_proto::{ClientMessage, ServerMessage, SignalKind, ValidationError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RecvError {
    /// The frame was readable but not a valid client message
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationError),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("client too slow to consume messages")]
    Full,

    #[error("client disconnected")]
    Closed,
}

/// Bidirectional message stream to one client
#[async_trait::async_trait]
pub trait StreamMessage: Send {
    /// Returns `None` once the client has gone away
    async fn recv(&mut self) -> Option<std::result::Result<ClientMessage, RecvError>>;

    fn send(&self, message: ServerMessage) -> std::result::Result<(), SendError>;

    fn is_alive(&self) -> bool;
}

/// Per-connection handler: one instance per live client
pub struct ConnectionHandler {
    participant_id: ParticipantId,
    services: Rendezvous,
    heartbeat_interval: Duration,
}

impl ConnectionHandler {
    #[must_use]
    pub fn new(services: Rendezvous, heartbeat_interval: Duration) -> Self {
        Self {
            participant_id: ParticipantId::new(),
            services,
            heartbeat_interval,
        }
    }

    #[must_use]
    pub const fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Run the message loop until the client disconnects, then leave
    /// whatever room the participant is in.
    pub async fn run<S: StreamMessage>(&self, stream: &mut S) {
        let mut outbound = self.services.hub.register(self.participant_id.clone());
        self.reply(ServerMessage::Welcome {
            id: self.participant_id.to_string(),
        });

        let start = tokio::time::Instant::now() + self.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(start, self.heartbeat_interval);

        loop {
            tokio::select! {
                inbound = stream.recv() => match inbound {
                    Some(Ok(message)) => self.dispatch(message),
                    Some(Err(RecvError::Invalid(e))) => {
                        debug!(participant_id = %self.participant_id, error = %e, "Rejected client message");
                        self.reply(ServerMessage::error(e.to_string()));
                    }
                    Some(Err(RecvError::Transport(e))) => {
                        warn!(participant_id = %self.participant_id, error = %e, "Transport error");
                        break;
                    }
                    None => {
                        info!(participant_id = %self.participant_id, "Client disconnected");
                        break;
                    }
                },

                event = outbound.recv() => match event {
                    Some(message) => match stream.send(message) {
                        Ok(()) => {}
                        Err(SendError::Full) => {
                            warn!(participant_id = %self.participant_id, "Client too slow, dropped event");
                        }
                        Err(SendError::Closed) => {
                            info!(participant_id = %self.participant_id, "Client writer closed");
                            break;
                        }
                    },
                    None => {
                        info!(participant_id = %self.participant_id, "Outbound queue closed");
                        break;
                    }
                },

                _ = heartbeat.tick() => {
                    if !stream.is_alive() {
                        info!(participant_id = %self.participant_id, "Connection no longer alive");
                        break;
                    }
                }
            }
        }

        self.cleanup();
    }

    fn dispatch(&self, message: ClientMessage) {
        let event = message.event_name();
        if let Err(e) = self.handle_client_message(message) {
            if e.is_silent() {
                debug!(participant_id = %self.participant_id, event, error = %e, "Ignored");
            } else {
                debug!(participant_id = %self.participant_id, event, error = %e, "Request failed");
                self.reply(ServerMessage::error(e.client_message()));
            }
        }
    }

    /// Apply one validated client message
    pub fn handle_client_message(&self, message: ClientMessage) -> Result<()> {
        let services = &self.services;
        let me = &self.participant_id;

        match message {
            ClientMessage::JoinRoom { room, name } => {
                services.registry.join(me, &RoomId::from(room), &name)?;
            }
            ClientMessage::LeaveRoom => {
                services.registry.leave(me);
            }
            ClientMessage::Offer { to, payload } => {
                self.relay(SignalKind::Offer, to, payload);
            }
            ClientMessage::Answer { to, payload } => {
                self.relay(SignalKind::Answer, to, payload);
            }
            ClientMessage::IceCandidate { to, payload } => {
                self.relay(SignalKind::IceCandidate, to, payload);
            }
            ClientMessage::MediaStateChange { kind, enabled } => {
                services.media.set_media_flag(me, kind, enabled)?;
            }
            ClientMessage::ChatMessage { body } => {
                services.chat.post(me, &body)?;
            }
            ClientMessage::Ping => self.reply(ServerMessage::Pong),
        }
        Ok(())
    }

    fn relay(&self, kind: SignalKind, to: String, payload: serde_json::Value) {
        self.services
            .relay
            .relay(kind, &self.participant_id, &ParticipantId::from(to), payload);
    }

    fn reply(&self, message: ServerMessage) {
        if let Err(e) = self.services.hub.send(&self.participant_id, message) {
            debug!(participant_id = %self.participant_id, error = %e, "Reply not delivered");
        }
    }

    fn cleanup(&self) {
        let left = self.services.registry.leave(&self.participant_id);
        self.services.hub.unregister(&self.participant_id);
        info!(
            participant_id = %self.participant_id,
            room_id = ?left.map(|outcome| outcome.room_id),
            "Connection cleanup complete"
        );
    }
}
