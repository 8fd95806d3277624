use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tollgate_dedup::{DedupError, DedupStore};
use tollgate_lock::{LockError, LockService};

const CLOSED: &str = "backend is shut down";

/// BackendSlot は停止可能なバックエンドへの共有ハンドル。
///
/// `close` 後は中身を手放し、以降の呼び出しはバックエンドに届かない。
/// 保持していた接続は実行中の呼び出しが終わった時点で解放される。
pub(crate) struct BackendSlot<T: ?Sized> {
    inner: RwLock<Option<Arc<T>>>,
    token: CancellationToken,
}

impl<T: ?Sized> BackendSlot<T> {
    pub(crate) fn new(inner: Arc<T>, token: CancellationToken) -> Self {
        Self {
            inner: RwLock::new(Some(inner)),
            token,
        }
    }

    async fn get(&self) -> Option<Arc<T>> {
        if self.token.is_cancelled() {
            return None;
        }
        self.inner.read().await.clone()
    }

    pub(crate) async fn close(&self) {
        self.token.cancel();
        self.inner.write().await.take();
    }
}

/// 停止後は `LockError::Unavailable` を返す LockService。
/// 取得は失敗扱いになり、ロックを誤って許可することはない。
pub(crate) struct ClosableLockService {
    slot: Arc<BackendSlot<dyn LockService>>,
}

impl ClosableLockService {
    pub(crate) fn new(slot: Arc<BackendSlot<dyn LockService>>) -> Self {
        Self { slot }
    }

    async fn service(&self) -> Result<Arc<dyn LockService>, LockError> {
        self.slot
            .get()
            .await
            .ok_or_else(|| LockError::Unavailable(CLOSED.to_string()))
    }
}

#[async_trait]
impl LockService for ClosableLockService {
    async fn try_lock(&self, key: &str, holder: &str, lease: Duration) -> Result<bool, LockError> {
        self.service().await?.try_lock(key, holder, lease).await
    }

    async fn unlock(&self, key: &str, holder: &str) -> Result<bool, LockError> {
        self.service().await?.unlock(key, holder).await
    }

    async fn renew(&self, key: &str, holder: &str, lease: Duration) -> Result<bool, LockError> {
        self.service().await?.renew(key, holder, lease).await
    }

    async fn is_held_by(&self, key: &str, holder: &str) -> Result<bool, LockError> {
        self.service().await?.is_held_by(key, holder).await
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        self.service().await?.is_locked(key).await
    }

    async fn force_unlock(&self, key: &str) -> Result<bool, LockError> {
        self.service().await?.force_unlock(key).await
    }
}

/// 停止後は `DedupError::Unavailable` を返す DedupStore。
pub(crate) struct ClosableDedupStore {
    slot: Arc<BackendSlot<dyn DedupStore>>,
}

impl ClosableDedupStore {
    pub(crate) fn new(slot: Arc<BackendSlot<dyn DedupStore>>) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl DedupStore for ClosableDedupStore {
    async fn check_and_mark(&self, fingerprint: &str) -> Result<bool, DedupError> {
        let store = self
            .slot
            .get()
            .await
            .ok_or_else(|| DedupError::Unavailable(CLOSED.to_string()))?;
        store.check_and_mark(fingerprint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_dedup::InMemoryDedupStore;
    use tollgate_lock::InMemoryLockService;

    #[tokio::test]
    async fn test_lock_service_fails_closed_after_close() {
        let inner: Arc<dyn LockService> = Arc::new(InMemoryLockService::new());
        let slot = Arc::new(BackendSlot::new(inner.clone(), CancellationToken::new()));
        let service = ClosableLockService::new(slot.clone());
        assert!(service.try_lock("k", "a", Duration::from_secs(5)).await.unwrap());

        slot.close().await;
        let result = service.try_lock("k", "b", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(LockError::Unavailable(_))));
        // 停止後は中身への参照を手放している
        assert_eq!(Arc::strong_count(&inner), 1);
    }

    #[tokio::test]
    async fn test_dedup_store_fails_closed_after_cancel() {
        let token = CancellationToken::new();
        let inner: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::new());
        let store = ClosableDedupStore::new(Arc::new(BackendSlot::new(inner, token.clone())));
        assert!(store.check_and_mark("req-1::/api/pay").await.unwrap());

        token.cancel();
        let result = store.check_and_mark("req-2::/api/pay").await;
        assert!(matches!(result, Err(DedupError::Unavailable(_))));
    }
}
