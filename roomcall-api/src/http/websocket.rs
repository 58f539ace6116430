//! WebSocket transport for the signaling channel.
//!
//! Frames are JSON text. All connection logic is in
//! [`ConnectionHandler`]; this module only adapts axum's socket to
//! [`StreamMessage`].

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error};

use roomcall_proto::{ClientMessage, JsonCodec, ServerMessage, ValidationError};

use crate::http::AppState;
use crate::impls::{ConnectionHandler, RecvError, SendError, StreamMessage};

/// Frames buffered between the handler and the socket writer
const WRITER_QUEUE_CAPACITY: usize = 1000;

struct WebSocketStream {
    receiver: SplitStream<WebSocket>,
    sender: mpsc::Sender<String>,
    is_alive: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl StreamMessage for WebSocketStream {
    async fn recv(&mut self) -> Option<Result<ClientMessage, RecvError>> {
        loop {
            match self.receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(
                        JsonCodec::decode_client_message(text.as_str()).map_err(RecvError::from),
                    );
                }
                Some(Ok(Message::Binary(_))) => {
                    return Some(Err(RecvError::Invalid(ValidationError::Malformed(
                        "binary frames are not supported".to_string(),
                    ))));
                }
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => return Some(Err(RecvError::Transport(e.to_string()))),
                // Ping/pong are answered by axum
                Some(Ok(_)) => {}
            }
        }
    }

    fn send(&self, message: ServerMessage) -> Result<(), SendError> {
        let text = match JsonCodec::encode_server_message(&message) {
            Ok(text) => text,
            Err(e) => {
                error!(event = message.event_name(), error = %e, "Failed to encode server message");
                return Ok(());
            }
        };

        self.sender.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Relaxed)
    }
}

/// GET /api/socket
pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(WRITER_QUEUE_CAPACITY);
    let is_alive = Arc::new(AtomicBool::new(true));

    let writer_alive = Arc::clone(&is_alive);
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                debug!("Failed to send WebSocket message: {}", e);
                writer_alive.store(false, Ordering::Relaxed);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let handler = ConnectionHandler::new(state.services.clone(), state.heartbeat_interval);
    let mut stream = WebSocketStream {
        receiver,
        sender: tx,
        is_alive,
    };
    handler.run(&mut stream).await;

    // Dropping the sender lets the writer flush and close the socket.
    drop(stream);
    if let Err(e) = writer.await {
        error!("WebSocket writer task failed: {}", e);
    }
}
