use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tollgate_config::{BackendKind, GovernanceConfig};
use tollgate_dedup::{AdmissionFilter, AdmissionState, DedupStore, InMemoryDedupStore};
use tollgate_guard::ExecutionGuard;
use tollgate_lock::{InMemoryLockService, LockManager, LockService};

use crate::error::GovernanceError;
use crate::lifecycle::{BackendSlot, ClosableDedupStore, ClosableLockService};
use crate::mapping;

/// Governance は起動時に一度だけ組み立てる排他制御・重複抑止の一式。
///
/// バックエンドのクライアントは 1 つだけ生成し、ロックサービスと重複判定ストアで共有する。
/// マネージャ・ガード・State はバックエンドを停止可能なハンドル越しに参照するため、
/// `shutdown` 後はクローンも含めてすべての呼び出しが `Unavailable` で失敗する。
pub struct Governance {
    lock_manager: LockManager,
    guard: ExecutionGuard,
    admission: AdmissionState,
    backend: BackendKind,
    lock_slot: Arc<BackendSlot<dyn LockService>>,
    dedup_slot: Arc<BackendSlot<dyn DedupStore>>,
    shutdown: CancellationToken,
}

impl Governance {
    /// 設定を検証し、設定どおりのバックエンドで組み立てる。
    pub async fn from_config(config: &GovernanceConfig) -> Result<Self, GovernanceError> {
        tollgate_config::validate(config)?;

        match config.backend.kind {
            BackendKind::Memory => Self::in_memory(config),
            BackendKind::Redis => Self::with_redis(config).await,
        }
    }

    /// インメモリのバックエンドで組み立てる。単一プロセス構成とテスト向け。
    pub fn in_memory(config: &GovernanceConfig) -> Result<Self, GovernanceError> {
        let lock_service: Arc<dyn LockService> = Arc::new(InMemoryLockService::new());
        let dedup_store: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::with_settings(
            Duration::from_secs(config.dedup.ttl_secs),
            config.dedup.max_capacity,
        ));
        tracing::info!(app = %config.app.name, "governance initialized with in-memory backend");
        Self::assemble(config, BackendKind::Memory, lock_service, dedup_store)
    }

    #[cfg(feature = "redis")]
    async fn with_redis(config: &GovernanceConfig) -> Result<Self, GovernanceError> {
        use tollgate_dedup::RedisDedupStore;
        use tollgate_lock::RedisLockService;

        let url = config
            .backend
            .redis_url
            .as_deref()
            .ok_or_else(|| GovernanceError::Backend("backend.redis_url is not set".into()))?;
        let client =
            redis::Client::open(url).map_err(|e| GovernanceError::Backend(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| GovernanceError::Backend(e.to_string()))?;

        let namespace = config
            .backend
            .key_prefix
            .clone()
            .unwrap_or_else(|| config.app.name.clone());
        let lock_service: Arc<dyn LockService> = Arc::new(
            RedisLockService::from_connection(conn.clone()).with_prefix(format!("{namespace}:lock")),
        );
        let dedup_store: Arc<dyn DedupStore> = Arc::new(
            RedisDedupStore::from_connection(conn, Duration::from_secs(config.dedup.ttl_secs))
                .with_prefix(format!("{namespace}:dedup")),
        );
        tracing::info!(app = %config.app.name, namespace = %namespace, "governance initialized with redis backend");

        Self::assemble(config, BackendKind::Redis, lock_service, dedup_store)
    }

    #[cfg(not(feature = "redis"))]
    async fn with_redis(_config: &GovernanceConfig) -> Result<Self, GovernanceError> {
        Err(GovernanceError::Backend(
            "redis backend requires the `redis` feature".into(),
        ))
    }

    /// 任意の LockService / DedupStore で組み立てる。
    pub fn with_backends(
        config: &GovernanceConfig,
        lock_service: Arc<dyn LockService>,
        dedup_store: Arc<dyn DedupStore>,
    ) -> Result<Self, GovernanceError> {
        Self::assemble(config, config.backend.kind, lock_service, dedup_store)
    }

    fn assemble(
        config: &GovernanceConfig,
        backend: BackendKind,
        lock_service: Arc<dyn LockService>,
        dedup_store: Arc<dyn DedupStore>,
    ) -> Result<Self, GovernanceError> {
        let shutdown = CancellationToken::new();
        let lock_slot = Arc::new(BackendSlot::new(lock_service, shutdown.clone()));
        let dedup_slot = Arc::new(BackendSlot::new(dedup_store, shutdown.clone()));

        let mut lock_manager = LockManager::new(Arc::new(ClosableLockService::new(lock_slot.clone())))
            .with_backoff(mapping::wait_backoff(&config.lock.backoff));
        if let Some(instance_id) = &config.app.instance_id {
            lock_manager = lock_manager.with_instance_id(instance_id.clone());
        }

        let registry = mapping::lock_registry(&config.lock);
        tracing::debug!(operations = registry.len(), instance_id = %lock_manager.instance_id(), "lock declarations loaded");
        let guard = ExecutionGuard::new(lock_manager.clone()).with_registry(registry);

        let filter = AdmissionFilter::new(
            Arc::new(ClosableDedupStore::new(dedup_slot.clone())),
            mapping::admission_config(&config.dedup),
        )?;

        Ok(Self {
            lock_manager,
            guard,
            admission: AdmissionState::new(filter),
            backend,
            lock_slot,
            dedup_slot,
            shutdown,
        })
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    /// `axum::middleware::from_fn_with_state` に渡す State。
    pub fn admission_state(&self) -> AdmissionState {
        self.admission.clone()
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// 停止を通知するトークン。`axum::serve(..).with_graceful_shutdown` などに渡せる。
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// バックエンドを停止し、共有クライアントを手放す。
    /// 実行中の呼び出しが終わった時点で接続が閉じ、以降の呼び出しは失敗する。
    pub async fn shutdown(self) {
        self.lock_slot.close().await;
        self.dedup_slot.close().await;
        tracing::info!(backend = ?self.backend, "governance shut down");
    }
}
