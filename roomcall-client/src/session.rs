//! Client-side call state driven by a single event loop.
//!
//! [`CallSession`] is a pure reaction engine: it consumes server frames, user
//! commands, and engine events one at a time and returns the frames that must
//! be written to the signaling connection. It never touches the transport
//! itself, which keeps every transition observable in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use roomcall_proto::{
    ChatEntry, ClientMessage, MediaFlags, MediaKind, ParticipantInfo, RoomState, ServerMessage,
};

use crate::engine::{
    EngineEvent, EngineEventKind, EngineEventSender, PeerEngine, RemoteStream, VideoSource,
};
use crate::media::{LocalMedia, TrackKind};
use crate::peer_set::PeerSet;

const CHAT_LOG_LIMIT: usize = 100;

/// Frames that only mean something inside the room we are currently in
fn is_room_scoped(message: &ServerMessage) -> bool {
    matches!(
        message,
        ServerMessage::RoomUsers { .. }
            | ServerMessage::UserJoined(_)
            | ServerMessage::UserLeft { .. }
            | ServerMessage::Offer { .. }
            | ServerMessage::Answer { .. }
            | ServerMessage::IceCandidate { .. }
            | ServerMessage::MediaStateChanged { .. }
            | ServerMessage::ScreenShareEnded { .. }
            | ServerMessage::ChatMessage(_)
    )
}

/// User intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join { room: String, name: String },
    Leave,
    SetAudio(bool),
    SetVideo(bool),
    StartScreenShare,
    StopScreenShare,
    SendChat(String),
}

/// What the application layer is told about
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected { id: String },
    Joined { room: RoomState, you: ParticipantInfo },
    ParticipantJoined(ParticipantInfo),
    ParticipantLeft { id: String, name: String },
    RemoteStream { remote_id: String, stream: RemoteStream },
    MediaChanged { user_id: String, media: MediaFlags },
    Chat(ChatEntry),
    ScreenShareStopped { reason: String },
    Error { message: String },
    Disconnected,
    ReconnectFailed { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JoinRequest {
    room: String,
    name: String,
}

pub struct CallSession {
    peers: PeerSet,
    media: Arc<LocalMedia>,
    desired_room: Option<JoinRequest>,
    current_room: Option<RoomState>,
    remotes: HashMap<String, ParticipantInfo>,
    chat: VecDeque<ChatEntry>,
    screen_sharing: bool,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl CallSession {
    #[must_use]
    pub fn new(
        engine: Arc<dyn PeerEngine>,
        media: Arc<LocalMedia>,
        engine_events: EngineEventSender,
    ) -> Self {
        Self {
            peers: PeerSet::new(engine, media.clone(), engine_events),
            media,
            desired_room: None,
            current_room: None,
            remotes: HashMap::new(),
            chat: VecDeque::new(),
            screen_sharing: false,
            events: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub const fn peers(&self) -> &PeerSet {
        &self.peers
    }

    #[must_use]
    pub fn local_id(&self) -> Option<&str> {
        self.peers.local_id()
    }

    #[must_use]
    pub const fn room(&self) -> Option<&RoomState> {
        self.current_room.as_ref()
    }

    #[must_use]
    pub fn remote(&self, id: &str) -> Option<&ParticipantInfo> {
        self.remotes.get(id)
    }

    #[must_use]
    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    #[must_use]
    pub fn chat(&self) -> Vec<&ChatEntry> {
        self.chat.iter().collect()
    }

    #[must_use]
    pub const fn is_screen_sharing(&self) -> bool {
        self.screen_sharing
    }

    #[must_use]
    pub fn local_media(&self) -> MediaFlags {
        self.media.flags(self.screen_sharing)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn push_chat(&mut self, entry: ChatEntry) {
        if self.chat.len() >= CHAT_LOG_LIMIT {
            self.chat.pop_front();
        }
        self.chat.push_back(entry);
    }

    /// Tear down every link and forget the room contents
    async fn reset_room(&mut self) {
        self.peers.close_all().await;
        self.remotes.clear();
        self.current_room = None;
        if self.screen_sharing {
            self.screen_sharing = false;
            self.peers.replace_video_track(VideoSource::Camera).await;
        }
    }

    pub async fn handle_server_message(&mut self, message: ServerMessage) -> Vec<ClientMessage> {
        let mut outbound = Vec::new();
        if self.current_room.is_none() && is_room_scoped(&message) {
            debug!(event = message.event_name(), "Dropping frame outside a room");
            return outbound;
        }
        match message {
            ServerMessage::Welcome { id } => {
                info!(%id, "Connected to signaling server");
                self.peers.set_local_id(id.clone());
                self.emit(SessionEvent::Connected { id });
            }
            ServerMessage::JoinedRoom {
                room,
                you,
                chat_history,
                ..
            } => {
                let wanted = self
                    .desired_room
                    .as_ref()
                    .is_some_and(|request| request.room.trim() == room.id);
                if !wanted {
                    debug!(room = %room.id, "Ignoring confirmation for a room we no longer want");
                    return outbound;
                }
                if self.current_room.is_some() {
                    self.reset_room().await;
                }

                info!(room = %room.id, "Joined room");
                self.peers.set_local_id(you.id.clone());
                self.chat.clear();
                for entry in chat_history {
                    self.push_chat(entry);
                }
                self.current_room = Some(room.clone());
                outbound.extend(self.announce_media(you.media));
                self.emit(SessionEvent::Joined { room, you });
            }
            ServerMessage::RoomUsers { users } => {
                self.peers.on_room_users(&users);
                for user in users {
                    if self.local_id() != Some(user.id.as_str()) {
                        self.remotes.insert(user.id.clone(), user);
                    }
                }
            }
            ServerMessage::UserJoined(user) => {
                if let Some(offer) = self.peers.on_user_joined(&user).await {
                    outbound.push(offer);
                }
                self.remotes.insert(user.id.clone(), user.clone());
                self.emit(SessionEvent::ParticipantJoined(user));
            }
            ServerMessage::UserLeft { id, name } => {
                self.peers.on_user_left(&id).await;
                self.remotes.remove(&id);
                if let Some(room) = &mut self.current_room {
                    if room.active_screen_sharer.as_deref() == Some(id.as_str()) {
                        room.active_screen_sharer = None;
                    }
                }
                self.emit(SessionEvent::ParticipantLeft { id, name });
            }
            ServerMessage::Offer { from, payload } => {
                outbound.extend(self.peers.on_offer(&from, payload).await);
            }
            ServerMessage::Answer { from, payload } => {
                outbound.extend(self.peers.on_answer(&from, payload).await);
            }
            ServerMessage::IceCandidate { from, payload } => {
                outbound.extend(self.peers.on_ice_candidate(&from, payload).await);
            }
            ServerMessage::MediaStateChanged {
                user_id,
                kind,
                enabled,
                media,
                ..
            } => {
                if let Some(remote) = self.remotes.get_mut(&user_id) {
                    remote.media = media;
                }
                if kind == MediaKind::ScreenShare {
                    if let Some(room) = &mut self.current_room {
                        if enabled {
                            room.active_screen_sharer = Some(user_id.clone());
                        } else if room.active_screen_sharer.as_deref() == Some(user_id.as_str()) {
                            room.active_screen_sharer = None;
                        }
                    }
                }
                self.emit(SessionEvent::MediaChanged { user_id, media });
            }
            ServerMessage::ScreenShareStopped { reason } => {
                // the server already cleared our flag; only the local track moves back
                if self.screen_sharing {
                    self.screen_sharing = false;
                    self.peers.replace_video_track(VideoSource::Camera).await;
                }
                self.emit(SessionEvent::ScreenShareStopped { reason });
            }
            ServerMessage::ScreenShareEnded { user_id } => {
                if let Some(remote) = self.remotes.get_mut(&user_id) {
                    remote.media.screen_share = false;
                }
                if let Some(room) = &mut self.current_room {
                    if room.active_screen_sharer.as_deref() == Some(user_id.as_str()) {
                        room.active_screen_sharer = None;
                    }
                }
            }
            ServerMessage::ChatMessage(entry) => {
                self.push_chat(entry.clone());
                self.emit(SessionEvent::Chat(entry));
            }
            ServerMessage::RoomStatsUpdated(stats) => {
                debug!(room = %stats.room_id, members = stats.member_count, "Room stats");
            }
            ServerMessage::Error { message } => {
                warn!(%message, "Server reported an error");
                self.emit(SessionEvent::Error { message });
            }
            ServerMessage::Pong => {}
        }
        outbound
    }

    pub async fn handle_command(&mut self, command: Command) -> Vec<ClientMessage> {
        match command {
            Command::Join { room, name } => {
                // frames from the old room are dropped until the new one confirms
                self.reset_room().await;
                self.desired_room = Some(JoinRequest {
                    room: room.clone(),
                    name: name.clone(),
                });
                vec![ClientMessage::JoinRoom { room, name }]
            }
            Command::Leave => {
                // links go before the server hears about it
                self.reset_room().await;
                self.desired_room = None;
                self.chat.clear();
                vec![ClientMessage::LeaveRoom]
            }
            Command::SetAudio(enabled) => self.set_track(TrackKind::Audio, enabled),
            Command::SetVideo(enabled) => self.set_track(TrackKind::Video, enabled),
            Command::StartScreenShare => {
                if self.screen_sharing {
                    return Vec::new();
                }
                let refusal = match &self.current_room {
                    None => Some("Not in a room"),
                    Some(room) if !room.settings.allow_screen_share => {
                        Some("Screen sharing is disabled in this room")
                    }
                    Some(_) => None,
                };
                if let Some(reason) = refusal {
                    warn!(reason, "Screen share refused");
                    self.emit(SessionEvent::Error {
                        message: reason.to_string(),
                    });
                    return Vec::new();
                }
                self.screen_sharing = true;
                self.peers.replace_video_track(VideoSource::Screen).await;
                vec![ClientMessage::MediaStateChange {
                    kind: MediaKind::ScreenShare,
                    enabled: true,
                }]
            }
            Command::StopScreenShare => {
                if !self.screen_sharing {
                    return Vec::new();
                }
                self.screen_sharing = false;
                self.peers.replace_video_track(VideoSource::Camera).await;
                vec![ClientMessage::MediaStateChange {
                    kind: MediaKind::ScreenShare,
                    enabled: false,
                }]
            }
            Command::SendChat(body) => vec![ClientMessage::ChatMessage { body }],
        }
    }

    /// The server starts every member with default flags; correct the ones
    /// that differ from our local tracks
    fn announce_media(&self, announced: MediaFlags) -> Vec<ClientMessage> {
        let local = self.local_media();
        [
            (MediaKind::Audio, announced.audio, local.audio),
            (MediaKind::Video, announced.video, local.video),
            (MediaKind::ScreenShare, announced.screen_share, local.screen_share),
        ]
        .into_iter()
        .filter(|(_, announced, local)| announced != local)
        .map(|(kind, _, enabled)| ClientMessage::MediaStateChange { kind, enabled })
        .collect()
    }

    fn set_track(&self, kind: TrackKind, enabled: bool) -> Vec<ClientMessage> {
        if !self.media.set_enabled(kind, enabled) {
            warn!(?kind, "No local track to toggle");
            return Vec::new();
        }
        if self.current_room.is_none() {
            // announced once the next room confirms
            return Vec::new();
        }
        let kind = match kind {
            TrackKind::Audio => MediaKind::Audio,
            TrackKind::Video => MediaKind::Video,
        };
        vec![ClientMessage::MediaStateChange { kind, enabled }]
    }

    pub async fn handle_engine_event(&mut self, event: EngineEvent) -> Vec<ClientMessage> {
        let remote_id = event.remote_id.clone();
        let stream = match &event.kind {
            EngineEventKind::RemoteStream(stream) => Some(stream.clone()),
            _ => None,
        };
        let outbound: Vec<ClientMessage> = self.peers.on_engine_event(event).await.into_iter().collect();
        if let Some(stream) = stream {
            if self.peers.get(&remote_id).is_some_and(|link| link.remote_stream() == Some(&stream)) {
                self.emit(SessionEvent::RemoteStream { remote_id, stream });
            }
        }
        outbound
    }

    /// The signaling connection dropped. Every link is gone with it; the
    /// desired room survives so it can be rejoined.
    pub async fn on_transport_lost(&mut self) {
        self.reset_room().await;
        self.emit(SessionEvent::Disconnected);
    }

    /// Frames to send on a fresh connection
    #[must_use]
    pub fn on_transport_connected(&self) -> Vec<ClientMessage> {
        self.desired_room
            .iter()
            .map(|request| ClientMessage::JoinRoom {
                room: request.room.clone(),
                name: request.name.clone(),
            })
            .collect()
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        self.emit(event);
    }
}
