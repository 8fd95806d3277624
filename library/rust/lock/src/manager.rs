use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::backoff::WaitBackoff;
use crate::context::{CallContext, HolderIdentity};
use crate::lock::{LockHandle, LockService};
use crate::LockError;

/// LockManager は LockService の上に取得ポリシーを載せる相互排他マネージャ。
///
/// 待機者のキューやロック状態のローカルキャッシュは持たない。
/// 各待機者はリモートサービスに対して独立にポーリングし、
/// 解放時は必ずサービス側で所有者を確認する。取得順序は保証しない（非公平）。
#[derive(Clone)]
pub struct LockManager {
    service: Arc<dyn LockService>,
    instance_id: String,
    backoff: WaitBackoff,
}

impl LockManager {
    /// インスタンス識別子はプロセス起動ごとに自動生成する。
    pub fn new(service: Arc<dyn LockService>) -> Self {
        Self {
            service,
            instance_id: Uuid::new_v4().to_string(),
            backoff: WaitBackoff::default(),
        }
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn with_backoff(mut self, backoff: WaitBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// 呼び出し元コンテキストに対応する保持者識別子。
    pub fn holder(&self, ctx: &CallContext) -> HolderIdentity {
        HolderIdentity::new(self.instance_id.clone(), ctx)
    }

    /// 待たずに一度だけ取得を試みる。
    pub async fn try_acquire(
        &self,
        key: &str,
        ctx: &CallContext,
        lease: Duration,
    ) -> Result<LockHandle, LockError> {
        validate_lease(lease)?;
        let holder = self.holder(ctx);
        if self.service.try_lock(key, &holder.to_string(), lease).await? {
            tracing::debug!(key, holder = %holder, "lock acquired");
            Ok(new_handle(key, holder, lease))
        } else {
            Err(LockError::AlreadyLocked(key.to_string()))
        }
    }

    /// `wait` を上限に取得を繰り返す。試行の間はタスクを sleep させる。
    ///
    /// 待機中のサービスエラーは取得失敗として扱い、締め切りまで再試行する。
    /// 締め切りを過ぎると `Timeout`（最後の試行がエラーなら `Unavailable`）を返す。
    pub async fn try_acquire_within(
        &self,
        key: &str,
        ctx: &CallContext,
        lease: Duration,
        wait: Duration,
    ) -> Result<LockHandle, LockError> {
        validate_lease(lease)?;
        let holder = self.holder(ctx);
        let holder_str = holder.to_string();
        let deadline = Instant::now() + wait;
        let mut attempt: u32 = 0;

        let last_error = loop {
            let outcome = self.service.try_lock(key, &holder_str, lease).await;
            let last_error = match outcome {
                Ok(true) => {
                    tracing::debug!(key, holder = %holder, attempt, "lock acquired");
                    return Ok(new_handle(key, holder, lease));
                }
                Ok(false) => None,
                Err(e) => {
                    tracing::warn!(key, attempt, error = %e, "lock service error while waiting");
                    Some(e)
                }
            };

            let now = Instant::now();
            if now >= deadline {
                break last_error;
            }
            let delay = self.backoff.compute_delay(attempt).min(deadline - now);
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        };

        match last_error {
            Some(e @ LockError::Unavailable(_)) => Err(e),
            _ => Err(LockError::Timeout {
                key: key.to_string(),
                wait,
            }),
        }
    }

    /// 呼び出し元が保持者である場合のみ解放する。そうでなければ何もせず false。
    pub async fn release(&self, key: &str, ctx: &CallContext) -> Result<bool, LockError> {
        let holder = self.holder(ctx);
        let released = self.service.unlock(key, &holder.to_string()).await?;
        if released {
            tracing::debug!(key, holder = %holder, "lock released");
        } else {
            tracing::debug!(key, holder = %holder, "release skipped: not the holder");
        }
        Ok(released)
    }

    /// 保持中のリースを延長する。保持者でなければ false。
    pub async fn extend(
        &self,
        key: &str,
        ctx: &CallContext,
        lease: Duration,
    ) -> Result<bool, LockError> {
        validate_lease(lease)?;
        let holder = self.holder(ctx);
        self.service.renew(key, &holder.to_string(), lease).await
    }

    pub async fn is_held_by_caller(&self, key: &str, ctx: &CallContext) -> Result<bool, LockError> {
        let holder = self.holder(ctx);
        self.service.is_held_by(key, &holder.to_string()).await
    }

    pub async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        self.service.is_locked(key).await
    }

    /// 所有者を問わず解放する管理用の操作。
    pub async fn force_release(&self, key: &str) -> Result<bool, LockError> {
        let released = self.service.force_unlock(key).await?;
        tracing::warn!(key, released, "lock force-released");
        Ok(released)
    }
}

fn validate_lease(lease: Duration) -> Result<(), LockError> {
    if lease.is_zero() {
        return Err(LockError::InvalidLease(lease));
    }
    Ok(())
}

fn new_handle(key: &str, holder: HolderIdentity, lease: Duration) -> LockHandle {
    LockHandle {
        key: key.to_string(),
        holder,
        acquired_at: Instant::now(),
        lease,
    }
}
