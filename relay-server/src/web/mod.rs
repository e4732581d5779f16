//! Web server module for receiving Slack slash commands.
//!
//! This module provides a small web server that:
//! - Receives slash commands from Slack on `/command`
//! - Verifies the request signature
//! - Publishes the decoded command to Redis, best effort
//! - Acknowledges Slack with 200 whatever the broker does

pub mod handlers;
pub mod signature;

use axum::{
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, slack_command, AppState, HealthResponse};
pub use signature::{verify_slack_signature, verify_slack_signature_at};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/command", any(slack_command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
