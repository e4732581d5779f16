//! Slash command endpoint handlers.
//!
//! The command handler runs the whole request pipeline:
//! 1. Reject anything but POST
//! 2. Read the body
//! 3. Verify the Slack signature
//! 4. Decode the form into a [`SlackCommand`]
//! 5. Publish to Redis (best effort)
//! 6. Acknowledge with 200
//!
//! Only steps 1 to 4 can change the response. Broker trouble is logged and
//! never reaches Slack.

use std::sync::Arc;

use axum::{
    body::{self, Bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::broker::CommandPublisher;
use crate::command::SlackCommand;
use crate::relay::{debug_dump, relay_command};
use crate::web::signature::{verify_slack_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::Config;

/// Largest body the command endpoint will buffer.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared application state.
///
/// Built once at startup. `publisher` is `None` when Redis was unreachable,
/// in which case commands are acknowledged but not relayed.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub publisher: Option<Arc<dyn CommandPublisher>>,
}

impl AppState {
    pub fn new(config: Config, publisher: Option<Arc<dyn CommandPublisher>>) -> Self {
        Self {
            config: Arc::new(config),
            publisher,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub broker: &'static str,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        broker: if state.publisher.is_some() {
            "connected"
        } else {
            "disabled"
        },
    })
}

// =============================================================================
// Slash Command
// =============================================================================

/// Slash command endpoint.
///
/// Mounted for every method so non-POST requests get a 405 from here
/// before the body is touched.
pub async fn slack_command(State(state): State<AppState>, request: Request) -> Response {
    if request.method() != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let (parts, body) = request.into_parts();

    let body = match body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "slack_command_body_read_failed");
            return (StatusCode::BAD_REQUEST, "Error reading request body").into_response();
        }
    };

    if !is_authentic(&state.config, &parts.headers, &body) {
        warn!("slack_signature_invalid");
        return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
    }

    let command = match SlackCommand::from_form_body(&body) {
        Ok(command) => command,
        Err(e) => {
            error!(error = %e, body_length = body.len(), "slack_command_form_parse_failed");
            return (StatusCode::BAD_REQUEST, "Error parsing form data").into_response();
        }
    };

    info!(
        command = %command.command,
        user_name = %command.user_name,
        "slack_command_received"
    );

    if let Some(rendered) = debug_dump(&command, state.config.log_level) {
        debug!(payload = %rendered, "slack_command_payload");
    }

    let outcome = relay_command(
        state.publisher.as_deref(),
        &state.config.redis_channel,
        &command,
        state.config.publish_timeout,
    )
    .await;

    debug!(outcome = ?outcome, "slack_command_relay_finished");

    (
        StatusCode::OK,
        format!("Slash command `{}` received 🎉", command.command),
    )
        .into_response()
}

/// Signature check for a buffered request.
///
/// The timestamp header is required even when verification is disabled.
fn is_authentic(config: &Config, headers: &HeaderMap, body: &Bytes) -> bool {
    let timestamp = header_str(headers, TIMESTAMP_HEADER);
    if timestamp.is_empty() {
        warn!("slack_timestamp_header_missing");
        return false;
    }

    let signature = header_str(headers, SIGNATURE_HEADER);

    verify_slack_signature(&config.signing_secret, body, timestamp, signature)
}

/// Header value as text; absent or non-ASCII values read as empty.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use axum::{body::Body, http, Router};
    use tower::ServiceExt;

    use super::*;
    use crate::relay::testing::{FailingPublisher, HangingPublisher, RecordingPublisher};
    use crate::web::router;
    use crate::web::signature::signature_header_value;

    const SECRET: &[u8] = b"test-signing-secret";
    const BODY: &str = "command=/test&text=hello&user_name=bob";

    fn now() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string()
    }

    fn app(secret: &[u8], publisher: Option<Arc<dyn CommandPublisher>>) -> Router {
        let config = Config {
            signing_secret: secret.to_vec(),
            publish_timeout: Duration::from_millis(100),
            ..Config::default()
        };
        router(AppState::new(config, publisher))
    }

    fn signed_request(body: &str) -> Request {
        let ts = now();
        let sig = signature_header_value(SECRET, &ts, body.as_bytes()).unwrap();
        http::Request::builder()
            .method(Method::POST)
            .uri("/command")
            .header("content-type", "application/x-www-form-urlencoded")
            .header(TIMESTAMP_HEADER, ts)
            .header(SIGNATURE_HEADER, sig)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_body(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_signed_command_is_published() {
        let publisher = Arc::new(RecordingPublisher::default());
        let response = app(SECRET, Some(publisher.clone()))
            .oneshot(signed_request(BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, "Slash command `/test` received 🎉");

        let messages = publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "slack-commands");

        let published: SlackCommand = serde_json::from_slice(&messages[0].1).unwrap();
        assert_eq!(
            published,
            SlackCommand {
                command: "/test".to_string(),
                text: "hello".to_string(),
                user_name: "bob".to_string(),
                ..SlackCommand::default()
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_broker_still_acknowledges() {
        let response = app(SECRET, None).oneshot(signed_request(BODY)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, "Slash command `/test` received 🎉");
    }

    #[tokio::test]
    async fn test_publish_failure_still_acknowledges() {
        let response = app(SECRET, Some(Arc::new(FailingPublisher)))
            .oneshot(signed_request(BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, "Slash command `/test` received 🎉");
    }

    #[tokio::test]
    async fn test_publish_timeout_still_acknowledges() {
        let response = app(SECRET, Some(Arc::new(HangingPublisher)))
            .oneshot(signed_request(BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, "Slash command `/test` received 🎉");
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        // No signature headers: a 401 here would mean verification ran.
        let request = http::Request::builder()
            .method(Method::GET)
            .uri("/command")
            .body(Body::empty())
            .unwrap();
        let response = app(SECRET, None).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(read_body(response).await, "Method not allowed");
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut request = signed_request(BODY);
        request
            .headers_mut()
            .insert(SIGNATURE_HEADER, "v0=deadbeef".parse().unwrap());

        let response = app(SECRET, Some(publisher.clone()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_body(response).await, "Invalid signature");
        assert!(publisher.messages().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_body_is_unauthorized() {
        let ts = now();
        let sig = signature_header_value(SECRET, &ts, BODY.as_bytes()).unwrap();
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/command")
            .header(TIMESTAMP_HEADER, ts)
            .header(SIGNATURE_HEADER, sig)
            .body(Body::from("command=/test&text=hellp&user_name=bob"))
            .unwrap();

        let response = app(SECRET, None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stale_timestamp_is_unauthorized() {
        let ts = "1531420618";
        let sig = signature_header_value(SECRET, ts, BODY.as_bytes()).unwrap();
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/command")
            .header(TIMESTAMP_HEADER, ts)
            .header(SIGNATURE_HEADER, sig)
            .body(Body::from(BODY))
            .unwrap();

        let response = app(SECRET, None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_timestamp_rejected_even_without_secret() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/command")
            .body(Body::from(BODY))
            .unwrap();

        let response = app(b"", None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_verification_disabled_accepts_unsigned() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/command")
            .header(TIMESTAMP_HEADER, "whenever")
            .body(Body::from(BODY))
            .unwrap();

        let response = app(b"", None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unparsable_form_is_bad_request() {
        let publisher = Arc::new(RecordingPublisher::default());
        let response = app(SECRET, Some(publisher.clone()))
            .oneshot(signed_request("command=/test&text=100%"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_body(response).await, "Error parsing form data");
        assert!(publisher.messages().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_bad_request() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/command")
            .body(Body::from(vec![b'a'; MAX_BODY_BYTES + 1]))
            .unwrap();

        let response = app(SECRET, None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_body(response).await, "Error reading request body");
    }

    #[tokio::test]
    async fn test_health_reports_broker_state() {
        let request = http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app(SECRET, None).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["broker"], "disabled");
    }
}
