/// InMemoryDedupStore はプロセス内の TTL 付きマップによる重複判定ストア。
/// moka::future::Cache の entry API で判定と登録を 1 操作にまとめる。
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::store::DedupStore;
use crate::DedupError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_CAPACITY: u64 = 100_000;

#[derive(Clone)]
pub struct InMemoryDedupStore {
    inner: Cache<String, ()>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_TTL, DEFAULT_MAX_CAPACITY)
    }

    /// # Arguments
    /// * `ttl` - 指紋を保持する期間。登録からの固定期間で、参照による延長はしない
    /// * `max_capacity` - 保持する最大件数。超えた分は追い出され、次回は新規扱いになる
    pub fn with_settings(ttl: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// 現在保持している指紋の概数。
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for InMemoryDedupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn check_and_mark(&self, fingerprint: &str) -> Result<bool, DedupError> {
        let entry = self
            .inner
            .entry(fingerprint.to_string())
            .or_insert(())
            .await;
        Ok(entry.is_fresh())
    }
}
