//! Broker module for publishing commands downstream.
//!
//! ```text
//! Slack → /command → verify → SlackCommand → Redis channel → subscribers
//! ```

pub mod publisher;

pub use publisher::{CommandPublisher, RedisPublisher};
