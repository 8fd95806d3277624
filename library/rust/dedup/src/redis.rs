use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};

use crate::store::DedupStore;
use crate::DedupError;

/// Redis-backed dedup store.
///
/// Each fingerprint is written with `SET key 1 NX PX ttl`, so the check and the
/// mark are a single atomic command and the key expires on its own.
#[derive(Clone)]
pub struct RedisDedupStore {
    conn: ConnectionManager,
    key_prefix: String,
    ttl: Duration,
}

impl RedisDedupStore {
    /// Create a new RedisDedupStore from a Redis URL.
    pub async fn new(url: &str, ttl: Duration) -> Result<Self, DedupError> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self::from_connection(conn, ttl))
    }

    /// Create a new RedisDedupStore from a shared connection manager.
    pub fn from_connection(conn: ConnectionManager, ttl: Duration) -> Self {
        Self {
            conn,
            key_prefix: "dedup".to_string(),
            ttl,
        }
    }

    /// Set a custom key prefix for fingerprint keys.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn dedup_key(&self, fingerprint: &str) -> String {
        format_dedup_key(&self.key_prefix, fingerprint)
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn check_and_mark(&self, fingerprint: &str) -> Result<bool, DedupError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.dedup_key(fingerprint))
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(self.ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(reply.is_some())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

fn map_redis_error(err: RedisError) -> DedupError {
    DedupError::Unavailable(err.to_string())
}

/// Helper function to format fingerprint keys (exposed for testing without Redis connection).
pub fn format_dedup_key(prefix: &str, fingerprint: &str) -> String {
    format!("{prefix}:{fingerprint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dedup_key() {
        assert_eq!(
            format_dedup_key("dedup", "req-1::/api/pay"),
            "dedup:req-1::/api/pay"
        );
    }

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::from_secs(600)), 600_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
    }

    #[test]
    fn test_map_redis_error_is_unavailable() {
        let err = map_redis_error(RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )));
        let DedupError::Unavailable(msg) = err;
        assert!(msg.contains("connection refused"));
    }
}
