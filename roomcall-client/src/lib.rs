//! Client side of roomcall: per-remote negotiation state machines driven by
//! room membership events, plus the signaling transport that feeds them.
//!
//! The actual peer-to-peer media stack is plugged in through [`PeerEngine`].

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod link;
pub mod media;
pub mod peer_set;
pub mod reconnect;
pub mod session;
pub mod transport;

pub use client::CallClient;
pub use config::{ClientConfig, ReconnectConfig};
pub use engine::{
    EngineEvent, EngineEventKind, EngineEventSender, LinkId, PeerConnection, PeerEngine,
    RemoteStream, Role, VideoSource,
};
pub use error::{ClientError, Result};
pub use link::{Applied, LinkStatus, NegotiationState, NegotiationStep, PeerLink};
pub use media::{LocalMedia, LocalTrack, TrackKind};
pub use peer_set::PeerSet;
pub use reconnect::{ReconnectState, Reconnector};
pub use session::{CallSession, Command, SessionEvent};
pub use transport::SignalingConnection;
