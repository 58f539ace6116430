//! Connect, run the session loop, reconnect on loss.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use roomcall_proto::ClientMessage;

use crate::config::ClientConfig;
use crate::engine::{EngineEvent, PeerEngine};
use crate::error::{ClientError, Result};
use crate::media::LocalMedia;
use crate::reconnect::{ReconnectState, Reconnector};
use crate::session::{CallSession, Command, SessionEvent};
use crate::transport::SignalingConnection;

enum Drive {
    /// Command channel closed; the user is done
    Shutdown,
    Lost,
}

pub struct CallClient {
    config: ClientConfig,
    session: CallSession,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl CallClient {
    #[must_use]
    pub fn new(config: ClientConfig, engine: Arc<dyn PeerEngine>, media: Arc<LocalMedia>) -> Self {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        Self {
            config,
            session: CallSession::new(engine, media, engine_tx),
            engine_events: engine_rx,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.session = self.session.with_events(events);
        self
    }

    #[must_use]
    pub const fn session(&self) -> &CallSession {
        &self.session
    }

    /// Runs until `commands` closes or reconnecting gives up.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Result<()> {
        let mut reconnector = Reconnector::new(self.config.reconnect.clone());

        loop {
            match SignalingConnection::connect(&self.config.server_url).await {
                Ok(connection) => {
                    reconnector.on_connected();
                    match self.drive(connection, &mut commands).await {
                        Drive::Shutdown => return Ok(()),
                        Drive::Lost => self.session.on_transport_lost().await,
                    }
                }
                Err(e) => warn!(url = %self.config.server_url, error = %e, "Failed to connect"),
            }

            match reconnector.on_disconnected() {
                ReconnectState::Reconnecting { attempt, delay } => {
                    info!(attempt, ?delay, "Reconnecting to signaling server");
                    let sleep = tokio::time::sleep(delay);
                    tokio::pin!(sleep);
                    // commands issued while offline only change local intent;
                    // media flags are re-announced once the room confirms the rejoin
                    loop {
                        tokio::select! {
                            () = &mut sleep => break,
                            command = commands.recv() => match command {
                                Some(command) => {
                                    let dropped = self.session.handle_command(command).await;
                                    if !dropped.is_empty() {
                                        debug!(frames = dropped.len(), "Dropping frames issued while offline");
                                    }
                                }
                                None => return Ok(()),
                            },
                        }
                    }
                }
                ReconnectState::Failed { attempts } => {
                    self.session.notify(SessionEvent::ReconnectFailed { attempts });
                    return Err(ClientError::ReconnectExhausted { attempts });
                }
                ReconnectState::Idle | ReconnectState::Connected => {}
            }
        }
    }

    async fn drive(
        &mut self,
        connection: SignalingConnection,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Drive {
        let (outgoing, mut incoming) = connection.split();

        if !Self::flush(&outgoing, self.session.on_transport_connected()).await {
            return Drive::Lost;
        }

        loop {
            let outbound = tokio::select! {
                message = incoming.recv() => match message {
                    Some(message) => self.session.handle_server_message(message).await,
                    None => return Drive::Lost,
                },
                command = commands.recv() => match command {
                    Some(command) => self.session.handle_command(command).await,
                    None => {
                        let farewell = self.session.handle_command(Command::Leave).await;
                        Self::flush(&outgoing, farewell).await;
                        return Drive::Shutdown;
                    }
                },
                Some(event) = self.engine_events.recv() => {
                    self.session.handle_engine_event(event).await
                }
            };

            if !Self::flush(&outgoing, outbound).await {
                return Drive::Lost;
            }
        }
    }

    async fn flush(outgoing: &mpsc::Sender<ClientMessage>, messages: Vec<ClientMessage>) -> bool {
        for message in messages {
            if outgoing.send(message).await.is_err() {
                return false;
            }
        }
        true
    }
}
