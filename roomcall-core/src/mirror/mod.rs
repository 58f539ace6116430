//! Best-effort external mirror of room membership.
//!
//! The registry never waits on the mirror: operations are queued on a bounded
//! channel and applied by a background worker. Queue overflow and backend
//! failures are logged and dropped.

mod redis_mirror;

pub use self::redis_mirror::RedisMirror;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{ParticipantId, RoomId};
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipMirror: Send + Sync {
    async fn add_member(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        display_name: &str,
    ) -> Result<()>;

    async fn remove_member(&self, room_id: &RoomId, participant_id: &ParticipantId) -> Result<()>;

    async fn increment_connection_counter(&self, room_id: &RoomId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOp {
    AddMember {
        room_id: RoomId,
        participant_id: ParticipantId,
        display_name: String,
    },
    RemoveMember {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    IncrementConnections {
        room_id: RoomId,
    },
}

impl MirrorOp {
    async fn apply(&self, mirror: &dyn MembershipMirror) -> Result<()> {
        match self {
            Self::AddMember {
                room_id,
                participant_id,
                display_name,
            } => mirror.add_member(room_id, participant_id, display_name).await,
            Self::RemoveMember {
                room_id,
                participant_id,
            } => mirror.remove_member(room_id, participant_id).await,
            Self::IncrementConnections { room_id } => {
                mirror.increment_connection_counter(room_id).await
            }
        }
    }
}

/// Fire-and-forget handle to the mirror worker
#[derive(Clone, Default)]
pub struct MirrorHandle {
    tx: Option<mpsc::Sender<MirrorOp>>,
}

impl MirrorHandle {
    /// A handle that discards every operation
    #[must_use]
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Start a worker applying queued operations to `mirror`.
    /// The worker exits once every handle is dropped.
    pub fn spawn(mirror: Arc<dyn MembershipMirror>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<MirrorOp>(capacity.max(1));
        let task = tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                if let Err(e) = op.apply(mirror.as_ref()).await {
                    warn!(error = %e, op = ?op, "Membership mirror update failed (non-critical)");
                }
            }
            debug!("Membership mirror worker stopped");
        });
        (Self { tx: Some(tx) }, task)
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn submit(&self, op: MirrorOp) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(op) {
            Ok(()) => {}
            Err(TrySendError::Full(op)) => {
                warn!(op = ?op, "Membership mirror queue full, dropping update");
            }
            Err(TrySendError::Closed(op)) => {
                debug!(op = ?op, "Membership mirror worker gone, dropping update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_worker_applies_ops_in_order() {
        let mut mock = MockMembershipMirror::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_add_member()
            .withf(|room, participant, name| {
                room.as_str() == "r1" && participant.as_str() == "a" && name == "alice"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_increment_connection_counter()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_remove_member()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let (handle, task) = MirrorHandle::spawn(Arc::new(mock), 8);
        handle.submit(MirrorOp::AddMember {
            room_id: RoomId::from("r1"),
            participant_id: ParticipantId::from("a"),
            display_name: "alice".to_string(),
        });
        handle.submit(MirrorOp::IncrementConnections {
            room_id: RoomId::from("r1"),
        });
        handle.submit(MirrorOp::RemoveMember {
            room_id: RoomId::from("r1"),
            participant_id: ParticipantId::from("a"),
        });
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_backend_failure_does_not_stop_worker() {
        let mut mock = MockMembershipMirror::new();
        mock.expect_increment_connection_counter()
            .times(2)
            .returning(|_| Err(Error::Internal("backend down".to_string())));

        let (handle, task) = MirrorHandle::spawn(Arc::new(mock), 8);
        for _ in 0..2 {
            handle.submit(MirrorOp::IncrementConnections {
                room_id: RoomId::from("r1"),
            });
        }
        drop(handle);
        task.await.unwrap();
    }

    #[test]
    fn test_disabled_handle_discards() {
        let handle = MirrorHandle::disabled();
        assert!(!handle.is_enabled());
        handle.submit(MirrorOp::IncrementConnections {
            room_id: RoomId::from("r1"),
        });
    }
}
