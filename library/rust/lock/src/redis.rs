use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};

use crate::lock::LockService;
use crate::LockError;

/// Redis-backed re-entrant lock service.
///
/// Each lock is a hash keyed by the lock name whose single field is the holder
/// identity and whose value is the hold count. All mutations run as Lua scripts
/// so the ownership check and the write are atomic, and the key always carries
/// a PX expiry so a crashed holder cannot keep the lock past its lease.
#[derive(Clone)]
pub struct RedisLockService {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisLockService {
    /// Create a new RedisLockService from a Redis URL.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(url: &str) -> Result<Self, LockError> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self::from_connection(conn))
    }

    /// Create a new RedisLockService from a shared connection manager.
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key_prefix: "lock".to_string(),
        }
    }

    /// Set a custom key prefix for lock keys.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn lock_key(&self, key: &str) -> String {
        format_lock_key(&self.key_prefix, key)
    }
}

/// Acquire or re-enter.
/// KEYS[1]: lock key, ARGV[1]: lease millis, ARGV[2]: holder
const ACQUIRE_SCRIPT: &str = r#"
if (redis.call("exists", KEYS[1]) == 0) or (redis.call("hexists", KEYS[1], ARGV[2]) == 1) then
    redis.call("hincrby", KEYS[1], ARGV[2], 1)
    redis.call("pexpire", KEYS[1], ARGV[1])
    return 1
end
return 0
"#;

/// Decrement the hold count; delete the key when it reaches zero.
/// KEYS[1]: lock key, ARGV[1]: holder
const RELEASE_SCRIPT: &str = r#"
if redis.call("hexists", KEYS[1], ARGV[1]) == 0 then
    return 0
end
local counter = redis.call("hincrby", KEYS[1], ARGV[1], -1)
if counter <= 0 then
    redis.call("del", KEYS[1])
end
return 1
"#;

/// Re-arm the lease only for the current holder.
/// KEYS[1]: lock key, ARGV[1]: holder, ARGV[2]: lease millis
const RENEW_SCRIPT: &str = r#"
if redis.call("hexists", KEYS[1], ARGV[1]) == 1 then
    return redis.call("pexpire", KEYS[1], ARGV[2])
end
return 0
"#;

#[allow(clippy::cast_possible_truncation)]
fn lease_millis(lease: Duration) -> u64 {
    lease.as_millis() as u64
}

#[async_trait]
impl LockService for RedisLockService {
    async fn try_lock(&self, key: &str, holder: &str, lease: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let result: i64 = Script::new(ACQUIRE_SCRIPT)
            .key(self.lock_key(key))
            .arg(lease_millis(lease))
            .arg(holder)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(result == 1)
    }

    async fn unlock(&self, key: &str, holder: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let result: i64 = Script::new(RELEASE_SCRIPT)
            .key(self.lock_key(key))
            .arg(holder)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(result == 1)
    }

    async fn renew(&self, key: &str, holder: &str, lease: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let result: i64 = Script::new(RENEW_SCRIPT)
            .key(self.lock_key(key))
            .arg(holder)
            .arg(lease_millis(lease))
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(result == 1)
    }

    async fn is_held_by(&self, key: &str, holder: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let held: bool = conn
            .hexists(self.lock_key(key), holder)
            .await
            .map_err(map_redis_error)?;
        Ok(held)
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(self.lock_key(key))
            .await
            .map_err(map_redis_error)?;
        Ok(exists)
    }

    async fn force_unlock(&self, key: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let count: i64 = conn
            .del(self.lock_key(key))
            .await
            .map_err(map_redis_error)?;
        Ok(count > 0)
    }
}

fn map_redis_error(err: RedisError) -> LockError {
    LockError::Unavailable(err.to_string())
}

/// Helper function to format lock keys (exposed for testing without Redis connection).
pub fn format_lock_key(prefix: &str, key: &str) -> String {
    format!("{prefix}:{key}")
}
