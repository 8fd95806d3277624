use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("既にロック済みです: {0}")]
    AlreadyLocked(String),
    #[error("ロック待機がタイムアウトしました: key={key}, wait={wait:?}")]
    Timeout { key: String, wait: Duration },
    #[error("リース期間は正の値である必要があります: {0:?}")]
    InvalidLease(Duration),
    #[error("ロックサービスに接続できません: {0}")]
    Unavailable(String),
}

impl LockError {
    /// 他の保持者との競合による失敗かどうか（バックエンド障害ではない）。
    pub fn is_contention(&self) -> bool {
        matches!(self, LockError::AlreadyLocked(_) | LockError::Timeout { .. })
    }
}
