use std::future::Future;
use std::sync::Arc;

use tollgate_lock::{CallContext, LockError, LockHandle, LockManager};

use crate::error::GuardError;
use crate::params::CallParams;
use crate::resolver::{self, DEFAULT_FALLBACK_KEY};
use crate::spec::{LockSpec, LockSpecRegistry, WaitPolicy};

/// ExecutionGuard は宣言されたロック定義に従って業務処理を排他実行する。
///
/// 処理の成功・失敗・パニック・キャンセルのいずれでも、
/// 取得したロックは呼び出し元が保持している場合に限り解放される。
#[derive(Clone)]
pub struct ExecutionGuard {
    manager: LockManager,
    registry: Arc<LockSpecRegistry>,
}

impl ExecutionGuard {
    pub fn new(manager: LockManager) -> Self {
        Self {
            manager,
            registry: Arc::new(LockSpecRegistry::new()),
        }
    }

    pub fn with_registry(mut self, registry: LockSpecRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn manager(&self) -> &LockManager {
        &self.manager
    }

    pub fn registry(&self) -> &LockSpecRegistry {
        &self.registry
    }

    /// 呼び出しに対応するロックキーを組み立てる。同じ引数なら常に同じキーになる。
    pub fn resolve_key(&self, spec: &LockSpec, operation: &str, params: &CallParams) -> String {
        let evaluated = resolver::resolve(&spec.key_template, params, DEFAULT_FALLBACK_KEY);
        let operation = spec.include_operation_name.then_some(operation);
        resolver::compose_key(&spec.prefix, operation, &evaluated)
    }

    /// ロックを取得してから `op` を実行し、結果をそのまま返す。
    ///
    /// ロックが取れなかった場合 `op` は一度も実行されず、
    /// `spec.failure_message` を持つ `GuardError::LockNotAcquired` を返す。
    pub async fn guard<T, E, F, Fut>(
        &self,
        spec: &LockSpec,
        operation: &str,
        ctx: &CallContext,
        params: &CallParams,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.resolve_key(spec, operation, params);
        let handle = match self.acquire(spec, &key, ctx).await {
            Ok(handle) => handle,
            Err(source) => {
                if source.is_contention() {
                    tracing::info!(operation, key = %key, error = %source, "lock not acquired");
                } else {
                    tracing::warn!(operation, key = %key, error = %source, "lock not acquired");
                }
                return Err(GuardError::LockNotAcquired {
                    key,
                    message: spec.failure_message.clone(),
                    source,
                });
            }
        };

        let mut release = ReleaseOnDrop::new(self.manager.clone(), handle, ctx.clone());
        let outcome = op().await;
        release.release_now().await;

        outcome.map_err(GuardError::Operation)
    }

    /// 登録簿から操作名でロック定義を引いて `guard` を実行する。
    pub async fn guard_named<T, E, F, Fut>(
        &self,
        operation: &str,
        ctx: &CallContext,
        params: &CallParams,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let spec = self
            .registry
            .get(operation)
            .cloned()
            .ok_or_else(|| GuardError::UnknownOperation(operation.to_string()))?;
        self.guard(&spec, operation, ctx, params, op).await
    }

    async fn acquire(
        &self,
        spec: &LockSpec,
        key: &str,
        ctx: &CallContext,
    ) -> Result<LockHandle, LockError> {
        match spec.wait_policy {
            WaitPolicy::NoWait => self.manager.try_acquire(key, ctx, spec.lease).await,
            WaitPolicy::WaitUpTo(wait) => {
                self.manager
                    .try_acquire_within(key, ctx, spec.lease, wait)
                    .await
            }
        }
    }
}

/// 取得済みロックの解放責任を持つ。
/// 正常経路では `release_now` で解放し、途中で Future が破棄された場合は Drop で解放タスクを起動する。
struct ReleaseOnDrop {
    manager: LockManager,
    handle: Option<LockHandle>,
    ctx: CallContext,
}

impl ReleaseOnDrop {
    fn new(manager: LockManager, handle: LockHandle, ctx: CallContext) -> Self {
        Self {
            manager,
            handle: Some(handle),
            ctx,
        }
    }

    async fn release_now(&mut self) {
        if let Some(handle) = self.handle.take() {
            release_if_held(&self.manager, &handle.key, &self.ctx).await;
        }
    }
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let manager = self.manager.clone();
                let ctx = self.ctx.clone();
                runtime.spawn(async move {
                    release_if_held(&manager, &handle.key, &ctx).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    key = %handle.key,
                    "no runtime to release lock; it will expire with its lease"
                );
            }
        }
    }
}

/// 呼び出し元が保持者であることを確認してから解放する。
/// 解放の失敗は業務処理の結果を上書きしない。
async fn release_if_held(manager: &LockManager, key: &str, ctx: &CallContext) {
    match manager.is_held_by_caller(key, ctx).await {
        Ok(true) => {
            if let Err(e) = manager.release(key, ctx).await {
                tracing::warn!(key, error = %e, "failed to release lock");
            }
        }
        Ok(false) => {
            tracing::warn!(key, "lock no longer held by caller at release; lease may have expired");
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to check lock ownership before release");
        }
    }
}
