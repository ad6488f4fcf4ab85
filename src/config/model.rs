//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a sensible default so the client works out of the box.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::nickname::generate_nickname;
use crate::irc::casemap::NickCasing;
use crate::irc::framer::MAX_LINE_LENGTH;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The server `/connect` uses when arguments are left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address of the IRC server.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Carried with the connect request; registration never negotiates SASL.
    #[serde(default)]
    pub sasl_username: Option<String>,
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Joined once the server sends its welcome.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: true,
            nickname: default_nickname(),
            realname: default_realname(),
            sasl_username: None,
            sasl_password: None,
            channels: vec![],
            auto_connect: false,
            accept_invalid_certs: false,
        }
    }
}

/// Protocol behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub nick_casing: NickCasing,
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
    #[serde(default = "default_kick_reason")]
    pub kick_reason: String,
    /// Retry registration as `<nick>_` when the nickname is taken.
    #[serde(default = "default_true")]
    pub alt_nick_on_collision: bool,
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            nick_casing: NickCasing::default(),
            quit_message: default_quit_message(),
            kick_reason: default_kick_reason(),
            alt_nick_on_collision: true,
            max_line_len: default_max_line_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// chrono `strftime` format for message timestamps.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            timestamp_format: default_timestamp_format(),
        }
    }
}

/// Diagnostic log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Filter directive, e.g. `info` or `marina=debug`. `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Overrides the default file under the user data directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_host() -> String {
    "irc.libera.chat".to_string()
}
fn default_port() -> u16 {
    6697
}
fn default_true() -> bool {
    true
}
fn default_nickname() -> String {
    generate_nickname()
}
fn default_realname() -> String {
    "Marina User".to_string()
}
fn default_quit_message() -> String {
    "Leaving".to_string()
}
fn default_kick_reason() -> String {
    "Kicked".to_string()
}
fn default_max_line_len() -> usize {
    MAX_LINE_LENGTH
}
fn default_timestamp_format() -> String {
    "%H:%M".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
