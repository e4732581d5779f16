//! Best-effort relay of a verified command to the broker.
//!
//! Nothing in here can fail a request. Every broker problem ends up as a
//! [`PublishOutcome`] and a log line.

use std::time::Duration;

use tracing::{error, info};

use crate::broker::CommandPublisher;
use crate::command::SlackCommand;
use crate::config::LogLevel;
use crate::error::PublishError;

/// What happened to a command after it was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the broker.
    Published,
    /// No broker configured.
    Skipped,
    /// Encoding, transport or deadline failure. Logged and dropped.
    Failed,
}

/// Publish `command` to `channel`, giving up after `deadline`.
pub async fn relay_command(
    publisher: Option<&dyn CommandPublisher>,
    channel: &str,
    command: &SlackCommand,
    deadline: Duration,
) -> PublishOutcome {
    let Some(publisher) = publisher else {
        return PublishOutcome::Skipped;
    };

    match publish_with_deadline(publisher, channel, command, deadline).await {
        Ok(()) => {
            info!(channel = %channel, "command_published");
            PublishOutcome::Published
        }
        Err(e) => {
            error!(channel = %channel, error = %e, "command_publish_failed");
            PublishOutcome::Failed
        }
    }
}

async fn publish_with_deadline(
    publisher: &dyn CommandPublisher,
    channel: &str,
    command: &SlackCommand,
    deadline: Duration,
) -> Result<(), PublishError> {
    let payload = command.to_wire()?;

    tokio::time::timeout(deadline, publisher.publish(channel, payload))
        .await
        .map_err(|_| PublishError::Timeout(deadline))?
}

/// Pretty JSON of the command for diagnostics, only at the DEBUG level.
///
/// Commands carry tokens and user data, so nothing is rendered at any other
/// level.
pub fn debug_dump(command: &SlackCommand, level: LogLevel) -> Option<String> {
    if level != LogLevel::Debug {
        return None;
    }

    match serde_json::to_string_pretty(command) {
        Ok(rendered) => Some(rendered),
        Err(e) => {
            error!(error = %e, "command_debug_render_failed");
            None
        }
    }
}
