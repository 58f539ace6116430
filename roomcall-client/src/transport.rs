//! WebSocket signaling connection.
//!
//! The socket is split into a writer task draining an outbound queue and a
//! reader task decoding frames into an inbound queue. When either side of the
//! socket goes away the inbound queue closes, which is how the session loop
//! learns the connection is gone.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use roomcall_proto::{ClientMessage, JsonCodec, ServerMessage};

use crate::error::{ClientError, Result};

const OUTGOING_CAPACITY: usize = 256;
const INCOMING_CAPACITY: usize = 256;

pub struct SignalingConnection {
    outgoing: mpsc::Sender<ClientMessage>,
    incoming: mpsc::Receiver<ServerMessage>,
}

impl SignalingConnection {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<ClientMessage>(OUTGOING_CAPACITY);
        let (incoming_tx, incoming_rx) = mpsc::channel::<ServerMessage>(INCOMING_CAPACITY);

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let text = match JsonCodec::encode_client_message(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode client message");
                        continue;
                    }
                };
                if write.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match JsonCodec::decode_server_message(text.as_str()) {
                        Ok(message) => {
                            if incoming_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Dropping undecodable server frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "Signaling socket errored");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }

    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        self.outgoing
            .send(message)
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.incoming.recv().await
    }

    #[must_use]
    pub fn split(self) -> (mpsc::Sender<ClientMessage>, mpsc::Receiver<ServerMessage>) {
        (self.outgoing, self.incoming)
    }
}
