use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rooms: RoomsConfig,
    pub redis: RedisConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Largest accepted WebSocket frame
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 3000,
            max_message_bytes: 64 * 1024,
        }
    }
}

/// Defaults applied to every newly created room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub max_members: usize,
    pub allow_chat: bool,
    pub allow_screen_share: bool,
    pub chat_history_limit: usize,
    /// Per-connection outbound queue; events beyond it are dropped
    pub outbound_queue_capacity: usize,
    pub heartbeat_interval_seconds: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_members: 10,
            allow_chat: true,
            allow_screen_share: true,
            chat_history_limit: 100,
            outbound_queue_capacity: 256,
            heartbeat_interval_seconds: 30,
        }
    }
}

impl RoomsConfig {
    #[must_use]
    pub const fn room_settings(&self) -> roomcall_proto::RoomSettings {
        roomcall_proto::RoomSettings {
            max_members: self.max_members,
            allow_chat: self.allow_chat,
            allow_screen_share: self.allow_screen_share,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Empty disables the membership mirror
    pub url: String,
    pub key_prefix: String,
    pub member_ttl_seconds: u64,
    pub queue_capacity: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_prefix: "roomcall:".to_string(),
            member_ttl_seconds: 3600,
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // ROOMCALL_SERVER__HTTP_PORT, ROOMCALL_ROOMS__MAX_MEMBERS, ...
        builder = builder.add_source(
            Environment::with_prefix("ROOMCALL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Collect every misconfiguration instead of stopping at the first
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.server.max_message_bytes < 1024 {
            errors.push("server.max_message_bytes must be at least 1024".to_string());
        }
        if self.rooms.max_members == 0 {
            errors.push("rooms.max_members must be at least 1".to_string());
        }
        if self.rooms.chat_history_limit == 0 {
            errors.push("rooms.chat_history_limit must be at least 1".to_string());
        }
        if self.rooms.outbound_queue_capacity == 0 {
            errors.push("rooms.outbound_queue_capacity must be at least 1".to_string());
        }
        if self.rooms.heartbeat_interval_seconds == 0 {
            errors.push("rooms.heartbeat_interval_seconds must be at least 1".to_string());
        }
        if !self.redis.url.is_empty() && self.redis.queue_capacity == 0 {
            errors.push("redis.queue_capacity must be at least 1".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    #[must_use]
    pub fn mirror_enabled(&self) -> bool {
        !self.redis.url.is_empty()
    }
}
