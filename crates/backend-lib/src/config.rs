// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management for the termchat server.
//!
//! Settings are resolved in three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Configuration file
//! 3. Environment variables (`TERMCHAT_*`)

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Path the WebSocket join endpoint is mounted on.
    pub join_path: String,
    /// Origins allowed by CORS. Empty means permissive; production
    /// deployments should list their client origins here.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthSettings {
    /// Session lifetime handed out at login.
    pub token_ttl_days: i64,
    /// log2 of the scrypt work factor used when hashing passwords.
    pub scrypt_log_n: u8,
    /// Admission policy for /signup and /login, keyed by client IP.
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatSettings {
    /// Admission policy for chat sends, keyed per connection.
    pub rate_limit: RateLimitSettings,
    pub max_frame_bytes: usize,
    pub pong_timeout_secs: u64,
    pub ping_interval_secs: u64,
    pub write_timeout_secs: u64,
    pub outbound_queue_depth: usize,
    pub broadcast_queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RateLimitSettings {
    pub limit: usize,
    pub window_secs: u64,
}

impl Settings {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("TERMCHAT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Load configuration from a specified file path.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("TERMCHAT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Settings = config.try_deserialize()?;
        settings.server.join_path = normalize_join_path(&settings.server.join_path);
        Ok(settings)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl AuthSettings {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.token_ttl_days)
    }
}

impl ChatSettings {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Guarantees the websocket join path starts with '/', falling back to
/// /join when empty.
pub fn normalize_join_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/join".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Per-user data path for the bundled SQLite file.
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("TERMCHAT_DB_PATH") {
        return PathBuf::from(path);
    }
    if let Ok(dir) = std::env::var("TERMCHAT_DATA_DIR") {
        return PathBuf::from(dir).join("termchat.db");
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("termchat").join("termchat.db");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("termchat")
            .join("termchat.db");
    }
    PathBuf::from(".termchat").join("termchat.db")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            database: DatabaseSettings::default(),
            auth: AuthSettings::default(),
            chat: ChatSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            join_path: "/join".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_ttl_days: 30,
            scrypt_log_n: 15,
            rate_limit: RateLimitSettings {
                limit: 10,
                window_secs: 60,
            },
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitSettings {
                limit: 5,
                window_secs: 3,
            },
            max_frame_bytes: 8192,
            pong_timeout_secs: 60,
            ping_interval_secs: 54,
            write_timeout_secs: 10,
            outbound_queue_depth: 256,
            broadcast_queue_depth: 256,
        }
    }
}
