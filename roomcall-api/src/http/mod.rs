pub mod error;
pub mod rooms;
pub mod websocket;

use axum::{routing::get, Router};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use roomcall_core::service::Rendezvous;
use roomcall_core::Config;

pub use error::{AppError, AppResult};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Rendezvous,
    pub max_message_bytes: usize,
    pub heartbeat_interval: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(services: Rendezvous, config: &Config) -> Self {
        Self {
            services,
            max_message_bytes: config.server.max_message_bytes,
            heartbeat_interval: Duration::from_secs(config.rooms.heartbeat_interval_seconds),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/socket", get(websocket::websocket_handler))
        .route("/api/rooms/{room_id}", get(rooms::get_room))
        .route("/api/stats", get(rooms::get_stats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server shut down gracefully");
    Ok(())
}
