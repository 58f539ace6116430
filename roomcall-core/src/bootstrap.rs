//! Service wiring used by the server binary

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, RedisConfig};
use crate::mirror::{MirrorHandle, RedisMirror};
use crate::service::Rendezvous;

/// Connect the membership mirror. Any failure degrades to a disabled
/// mirror; the rendezvous service never depends on it.
pub async fn init_mirror(config: &RedisConfig) -> MirrorHandle {
    if config.url.is_empty() {
        info!("Redis not configured, membership mirror disabled");
        return MirrorHandle::disabled();
    }

    match RedisMirror::connect(config).await {
        Ok(mirror) => {
            let (handle, _worker) = MirrorHandle::spawn(Arc::new(mirror), config.queue_capacity);
            info!("Membership mirror enabled");
            handle
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect membership mirror, continuing without it");
            MirrorHandle::disabled()
        }
    }
}

pub async fn init_services(config: &Config) -> Rendezvous {
    let mirror = init_mirror(&config.redis).await;
    let services = Rendezvous::new(&config.rooms, mirror);
    info!(
        max_members = config.rooms.max_members,
        allow_chat = config.rooms.allow_chat,
        allow_screen_share = config.rooms.allow_screen_share,
        "Rendezvous services initialized"
    );
    services
}
