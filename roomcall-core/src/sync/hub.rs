use dashmap::DashMap;
use roomcall_proto::ServerMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::models::ParticipantId;
use crate::{Error, Result};

/// Outbound queue feeding one client connection
pub type OutboundSender = mpsc::Sender<ServerMessage>;
pub type OutboundReceiver = mpsc::Receiver<ServerMessage>;

/// Registry of live connections, keyed by participant id.
///
/// Every send is a non-blocking `try_send` into a bounded queue so callers
/// may deliver while holding a room lock. A full queue drops the event; a
/// closed queue unregisters the connection.
pub struct ConnectionHub {
    connections: DashMap<ParticipantId, OutboundSender>,
    capacity: usize,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl ConnectionHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            capacity: capacity.max(1),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a connection and return the receiving end of its queue.
    /// A previous registration under the same id is replaced.
    pub fn register(&self, participant_id: ParticipantId) -> OutboundReceiver {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.connections.insert(participant_id.clone(), tx).is_some() {
            warn!(participant_id = %participant_id, "Replaced existing connection registration");
        }
        info!(
            participant_id = %participant_id,
            total = self.connections.len(),
            "Connection registered"
        );
        rx
    }

    pub fn unregister(&self, participant_id: &ParticipantId) -> bool {
        let removed = self.connections.remove(participant_id).is_some();
        if removed {
            info!(
                participant_id = %participant_id,
                total = self.connections.len(),
                "Connection unregistered"
            );
        }
        removed
    }

    #[must_use]
    pub fn is_connected(&self, participant_id: &ParticipantId) -> bool {
        self.connections.contains_key(participant_id)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queue a message for one connection.
    ///
    /// Fails with `NotFound` for unknown ids and `TransportClosed` when the
    /// connection's receiver is gone. A full queue is not an error.
    pub fn send(&self, participant_id: &ParticipantId, message: ServerMessage) -> Result<()> {
        let sender = self
            .connections
            .get(participant_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(participant_id.to_string()))?;

        match sender.try_send(message) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(message)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    participant_id = %participant_id,
                    event = message.event_name(),
                    "Outbound queue full, dropping event"
                );
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                debug!(participant_id = %participant_id, "Outbound queue closed");
                self.unregister(participant_id);
                Err(Error::TransportClosed(participant_id.to_string()))
            }
        }
    }

    /// Queue a message for every id except `except`. Returns the number of
    /// connections that accepted it.
    pub fn broadcast<'a>(
        &self,
        recipients: impl IntoIterator<Item = &'a ParticipantId>,
        message: &ServerMessage,
        except: Option<&ParticipantId>,
    ) -> usize {
        let mut sent = 0;
        for participant_id in recipients {
            if except == Some(participant_id) {
                continue;
            }
            match self.send(participant_id, message.clone()) {
                Ok(()) => sent += 1,
                Err(e) => debug!(
                    participant_id = %participant_id,
                    event = message.event_name(),
                    error = %e,
                    "Skipped recipient"
                ),
            }
        }
        sent
    }

    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
