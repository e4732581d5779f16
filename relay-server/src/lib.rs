//! Slack Relay - signed slash-command relay.
//!
//! Receives Slack slash commands over HTTP, verifies their signature and
//! republishes each one as JSON on a Redis pub/sub channel.
//!
//! ## Architecture
//!
//! ```text
//! Slack → POST /command → signature check → SlackCommand → Redis PUBLISH
//! ```
//!
//! Redis is optional: if it cannot be reached at startup the relay keeps
//! acknowledging commands and simply does not publish them.

pub mod broker;
pub mod command;
pub mod config;
pub mod error;
pub mod relay;
pub mod web;

// Re-export commonly used types
pub use broker::{CommandPublisher, RedisPublisher};
pub use command::SlackCommand;
pub use config::{Config, LogLevel};
pub use error::{FormError, PublishError};
pub use relay::{relay_command, PublishOutcome};
pub use web::{router, AppState};
