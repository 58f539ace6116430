use roomcall_proto::{ServerMessage, SignalKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::models::ParticipantId;
use crate::sync::ConnectionHub;

/// Stateless forwarder of negotiation payloads between two participants
#[derive(Clone)]
pub struct SignalingRelay {
    hub: Arc<ConnectionHub>,
}

impl SignalingRelay {
    #[must_use]
    pub const fn new(hub: Arc<ConnectionHub>) -> Self {
        Self { hub }
    }

    /// Forward `payload` unmodified. Returns false when the target is not
    /// connected, which the sender only notices as a missing reply.
    pub fn relay(
        &self,
        kind: SignalKind,
        from: &ParticipantId,
        to: &ParticipantId,
        payload: Value,
    ) -> bool {
        match self
            .hub
            .send(to, ServerMessage::signal(kind, from.as_str(), payload))
        {
            Ok(()) => {
                debug!(kind = %kind, from = %from, to = %to, "Relayed signal");
                true
            }
            Err(e) => {
                debug!(kind = %kind, from = %from, to = %to, error = %e, "Relay target unavailable, dropping");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_relay_forwards_payload_unmodified() {
        let hub = Arc::new(ConnectionHub::new(8));
        let relay = SignalingRelay::new(Arc::clone(&hub));
        let b = ParticipantId::from("b");
        let mut rx = hub.register(b.clone());

        let payload = json!({"type": "offer", "sdp": "v=0\r\n"});
        assert!(relay.relay(SignalKind::Offer, &ParticipantId::from("a"), &b, payload.clone()));

        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Offer {
                from: "a".to_string(),
                payload
            })
        );
    }

    #[test]
    fn test_relay_to_unknown_target_is_silent() {
        let hub = Arc::new(ConnectionHub::new(8));
        let relay = SignalingRelay::new(hub);
        assert!(!relay.relay(
            SignalKind::IceCandidate,
            &ParticipantId::from("a"),
            &ParticipantId::from("nobody"),
            json!({"candidate": "c"}),
        ));
    }
}
