use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::lock::LockService;
use crate::LockError;

struct LockEntry {
    holder: String,
    hold_count: u32,
    expires_at: Instant,
}

impl LockEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 期限切れエントリを掃除するまでの try_lock 回数
const SWEEP_INTERVAL: u32 = 64;

#[derive(Default)]
struct LockTable {
    entries: HashMap<String, LockEntry>,
    ops_since_sweep: u32,
}

impl LockTable {
    /// 解放されずにリースが切れたエントリ（保持者のクラッシュ等）を取り除く。
    fn sweep_if_due(&mut self, now: Instant) {
        self.ops_since_sweep += 1;
        if self.ops_since_sweep < SWEEP_INTERVAL {
            return;
        }
        self.ops_since_sweep = 0;
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired lock entries swept");
        }
    }
}

/// 単一プロセス内で完結する LockService 実装。
/// テストや単一インスタンス構成で使用する。
pub struct InMemoryLockService {
    locks: Mutex<LockTable>,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(LockTable::default()),
        }
    }
}

impl Default for InMemoryLockService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn try_lock(&self, key: &str, holder: &str, lease: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut table = self.locks.lock().await;
        table.sweep_if_due(now);
        let locks = &mut table.entries;
        if let Some(entry) = locks.get_mut(key) {
            if !entry.is_expired(now) {
                if entry.holder != holder {
                    return Ok(false);
                }
                entry.hold_count += 1;
                entry.expires_at = now + lease;
                return Ok(true);
            }
        }
        locks.insert(
            key.to_string(),
            LockEntry {
                holder: holder.to_string(),
                hold_count: 1,
                expires_at: now + lease,
            },
        );
        Ok(true)
    }

    async fn unlock(&self, key: &str, holder: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut table = self.locks.lock().await;
        let locks = &mut table.entries;
        match locks.get_mut(key) {
            Some(entry) if !entry.is_expired(now) && entry.holder == holder => {
                entry.hold_count = entry.hold_count.saturating_sub(1);
                if entry.hold_count == 0 {
                    locks.remove(key);
                }
                Ok(true)
            }
            Some(entry) if entry.is_expired(now) => {
                locks.remove(key);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    async fn renew(&self, key: &str, holder: &str, lease: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut table = self.locks.lock().await;
        let locks = &mut table.entries;
        match locks.get_mut(key) {
            Some(entry) if !entry.is_expired(now) && entry.holder == holder => {
                entry.expires_at = now + lease;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn is_held_by(&self, key: &str, holder: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        let table = self.locks.lock().await;
        let locks = &table.entries;
        Ok(locks
            .get(key)
            .is_some_and(|e| !e.is_expired(now) && e.holder == holder))
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        let table = self.locks.lock().await;
        let locks = &table.entries;
        Ok(locks.get(key).is_some_and(|e| !e.is_expired(now)))
    }

    async fn force_unlock(&self, key: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut table = self.locks.lock().await;
        let locks = &mut table.entries;
        Ok(locks.remove(key).is_some_and(|e| !e.is_expired(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_and_unlock() {
        let service = InMemoryLockService::new();
        assert!(service.try_lock("key1", "a", Duration::from_secs(10)).await.unwrap());
        assert!(service.is_locked("key1").await.unwrap());
        assert!(service.is_held_by("key1", "a").await.unwrap());

        assert!(service.unlock("key1", "a").await.unwrap());
        assert!(!service.is_locked("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_other_holder_is_rejected() {
        let service = InMemoryLockService::new();
        assert!(service.try_lock("key1", "a", Duration::from_secs(10)).await.unwrap());
        assert!(!service.try_lock("key1", "b", Duration::from_secs(10)).await.unwrap());
        assert!(!service.is_held_by("key1", "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_by_other_holder_is_noop() {
        let service = InMemoryLockService::new();
        service.try_lock("key1", "a", Duration::from_secs(10)).await.unwrap();

        assert!(!service.unlock("key1", "b").await.unwrap());
        assert!(service.is_held_by("key1", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_reentrant_lock_counts_holds() {
        let service = InMemoryLockService::new();
        assert!(service.try_lock("key1", "a", Duration::from_secs(10)).await.unwrap());
        assert!(service.try_lock("key1", "a", Duration::from_secs(10)).await.unwrap());

        assert!(service.unlock("key1", "a").await.unwrap());
        assert!(service.is_locked("key1").await.unwrap());
        assert!(service.unlock("key1", "a").await.unwrap());
        assert!(!service.is_locked("key1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_expires_after_lease() {
        let service = InMemoryLockService::new();
        service.try_lock("key1", "a", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_millis(4900)).await;
        assert!(!service.try_lock("key1", "b", Duration::from_secs(5)).await.unwrap());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(!service.is_locked("key1").await.unwrap());
        assert!(service.try_lock("key1", "b", Duration::from_secs(5)).await.unwrap());
        assert!(!service.is_held_by("key1", "a").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_only_for_holder() {
        let service = InMemoryLockService::new();
        service.try_lock("key1", "a", Duration::from_secs(1)).await.unwrap();

        assert!(!service.renew("key1", "b", Duration::from_secs(60)).await.unwrap());
        assert!(service.renew("key1", "a", Duration::from_secs(60)).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(service.is_held_by("key1", "a").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_of_untouched_keys_are_swept() {
        let service = InMemoryLockService::new();
        for i in 0..10 {
            let key = format!("crashed-{i}");
            service.try_lock(&key, "a", Duration::from_secs(1)).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;

        for _ in 0..SWEEP_INTERVAL {
            let held = service.try_lock("live", "b", Duration::from_secs(60)).await.unwrap();
            assert!(held);
            service.unlock("live", "b").await.unwrap();
        }

        let table = service.locks.lock().await;
        assert!(table.entries.keys().all(|k| !k.starts_with("crashed-")));
    }

    #[tokio::test]
    async fn test_force_unlock_ignores_owner() {
        let service = InMemoryLockService::new();
        service.try_lock("key1", "a", Duration::from_secs(10)).await.unwrap();
        service.try_lock("key1", "a", Duration::from_secs(10)).await.unwrap();

        assert!(service.force_unlock("key1").await.unwrap());
        assert!(!service.is_locked("key1").await.unwrap());
        assert!(!service.force_unlock("key1").await.unwrap());
    }
}
