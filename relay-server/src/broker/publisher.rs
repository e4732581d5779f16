//! Redis pub/sub publisher.
//!
//! A single multiplexed connection is shared by every request handler. The
//! connection is cheap to clone and pipelines concurrent commands, so no
//! extra locking is needed around it.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

use crate::error::PublishError;

/// Anything that can push an encoded command onto a pub/sub channel.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Publish `payload` to `channel`.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// Publisher backed by a Redis `PUBLISH`.
#[derive(Clone)]
pub struct RedisPublisher {
    conn: MultiplexedConnection,
}

impl RedisPublisher {
    /// Connect to Redis and confirm it answers `PING`.
    ///
    /// The whole exchange is bounded by `probe_timeout`. Callers treat any
    /// error as "broker unavailable" and run without publishing.
    pub async fn connect(url: &str, probe_timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::open(url)?;

        let probe = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            debug!(reply = %pong, "redis_ping_ok");
            Ok::<_, PublishError>(conn)
        };

        let conn = tokio::time::timeout(probe_timeout, probe)
            .await
            .map_err(|_| PublishError::Timeout(probe_timeout))??;

        info!("redis_publisher_connected");

        Ok(Self { conn })
    }
}

#[async_trait]
impl CommandPublisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(channel, payload).await?;
        debug!(channel = %channel, receivers = receivers, "redis_published");
        Ok(())
    }
}
