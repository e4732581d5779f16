//! Configuration module for environment variable parsing.
//!
//! Everything the relay needs is resolved once at startup and handed to the
//! handlers through [`crate::AppState`]; nothing reads the environment after
//! that.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

/// Logging tier selected by `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name case-insensitively. Unknown names fall back to `Info`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "WARN" => LogLevel::Warn,
            "ERROR" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    /// `EnvFilter` directive for this level.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Slack signing secret. Empty disables signature verification.
    pub signing_secret: Vec<u8>,

    /// File the signing secret is read from
    pub secret_path: PathBuf,

    /// Redis host for the pub/sub broker
    pub redis_host: String,

    /// Redis port for the pub/sub broker
    pub redis_port: u16,

    /// Channel every command is published to
    pub redis_channel: String,

    /// Configured logging tier
    pub log_level: LogLevel,

    /// Ceiling for a single publish call
    pub publish_timeout: Duration,

    /// Ceiling for the startup liveness probe
    pub redis_probe_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            signing_secret: Vec::new(),
            secret_path: PathBuf::from(".secret"),
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_channel: "slack-commands".to_string(),
            log_level: LogLevel::Info,
            publish_timeout: Duration::from_secs(5),
            redis_probe_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// The signing secret is left empty; call [`Config::load_signing_secret`]
    /// once logging is up so the outcome is recorded.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| parse_port(&v))
                .unwrap_or(defaults.port),

            signing_secret: Vec::new(),

            secret_path: env::var("SLACK_SECRET_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.secret_path),

            redis_host: env::var("REDIS_HOST")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.redis_host),

            redis_port: env::var("REDIS_PORT")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.redis_port),

            redis_channel: env::var("REDIS_CHANNEL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.redis_channel),

            log_level: env::var("LOG_LEVEL")
                .map(|v| LogLevel::parse(&v))
                .unwrap_or_default(),

            publish_timeout: parse_millis("PUBLISH_TIMEOUT_MS", defaults.publish_timeout),

            redis_probe_timeout: parse_millis(
                "REDIS_PROBE_TIMEOUT_MS",
                defaults.redis_probe_timeout,
            ),
        }
    }

    /// Read the signing secret from `secret_path` into the config.
    pub fn load_signing_secret(&mut self) {
        self.signing_secret = load_signing_secret(&self.secret_path);
    }

    /// Connection URL for the Redis broker.
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }

    pub fn signature_verification_enabled(&self) -> bool {
        !self.signing_secret.is_empty()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("signing_secret", &"<redacted>")
            .field("secret_path", &self.secret_path)
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_channel", &self.redis_channel)
            .field("log_level", &self.log_level)
            .field("publish_timeout", &self.publish_timeout)
            .field("redis_probe_timeout", &self.redis_probe_timeout)
            .finish()
    }
}

/// Read the signing secret from `path`, trimmed of surrounding whitespace.
///
/// A missing or unreadable file yields an empty secret, which disables
/// verification.
pub fn load_signing_secret(path: &Path) -> Vec<u8> {
    match fs::read_to_string(path) {
        Ok(raw) => {
            let secret = raw.trim().as_bytes().to_vec();
            if secret.is_empty() {
                warn!(path = %path.display(), "signing_secret_empty");
            } else {
                info!(path = %path.display(), "signing_secret_loaded");
            }
            secret
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "signing_secret_missing_verification_disabled"
            );
            Vec::new()
        }
    }
}

/// Parse a listen port, accepting an optional leading colon (`:8080`).
fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().trim_start_matches(':').parse().ok()
}

/// Parse a millisecond duration variable.
fn parse_millis(name: &str, default: Duration) -> Duration {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Duration::from_millis(ms),
        _ => {
            warn!(env_var = name, value = %raw, "Invalid duration, using default");
            default
        }
    }
}
