use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::context::HolderIdentity;
use crate::LockError;

/// LockHandle は取得に成功した呼び出しだけが持つロックの控え。
/// 共有されることはなく、解放またはリース満了で役目を終える。
#[derive(Debug)]
pub struct LockHandle {
    pub key: String,
    pub holder: HolderIdentity,
    pub acquired_at: Instant,
    pub lease: Duration,
}

impl LockHandle {
    /// 明示的な解放がなくてもロックサービスが鍵を手放す時刻。
    pub fn expires_at(&self) -> Instant {
        self.acquired_at + self.lease
    }
}

/// LockService はリモートのロックサービスを抽象化する。
///
/// 1 キーにつき 1 つの論理ロックを持ち、同じ保持者による再取得は
/// 保持回数を増やして成功する（再入可能）。
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait LockService: Send + Sync {
    /// 空いているか自分が保持中なら取得してリースを設定する。他者が保持中なら false。
    async fn try_lock(&self, key: &str, holder: &str, lease: Duration) -> Result<bool, LockError>;
    /// 保持回数を 1 減らし、0 になればキーを削除する。保持者でなければ false。
    async fn unlock(&self, key: &str, holder: &str) -> Result<bool, LockError>;
    /// 保持者であればリースを再設定する。
    async fn renew(&self, key: &str, holder: &str, lease: Duration) -> Result<bool, LockError>;
    async fn is_held_by(&self, key: &str, holder: &str) -> Result<bool, LockError>;
    async fn is_locked(&self, key: &str) -> Result<bool, LockError>;
    /// 所有者チェックなしでキーを削除する。管理用。
    async fn force_unlock(&self, key: &str) -> Result<bool, LockError>;
}
