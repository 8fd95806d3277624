use thiserror::Error;
use tollgate_lock::LockError;
use tollgate_server_common::error::{lock as lock_codes, ServiceError};

/// キー式の評価エラー。呼び出し元には返さず、テンプレート文字列へのフォールバックに使う。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeyError {
    #[error("キー式の構文エラー: position={position}, {message}")]
    Syntax { position: usize, message: String },
    #[error("未定義の変数です: #{0}")]
    UnknownVariable(String),
    #[error("プロパティを解決できません: {0}")]
    MissingProperty(String),
    #[error("インデックスを解決できません: {0}")]
    InvalidIndex(String),
    #[error("型が一致しません: {0}")]
    TypeMismatch(String),
}

/// ExecutionGuard の失敗。
///
/// 業務処理自体のエラーは `Operation` にそのまま包んで返し、変換はしない。
#[derive(Debug, Error)]
pub enum GuardError<E> {
    #[error("{message}")]
    LockNotAcquired {
        key: String,
        message: String,
        #[source]
        source: LockError,
    },
    #[error("ロック定義が登録されていない操作です: {0}")]
    UnknownOperation(String),
    #[error("{0}")]
    Operation(E),
}

impl<E> GuardError<E> {
    pub fn is_lock_not_acquired(&self) -> bool {
        matches!(self, GuardError::LockNotAcquired { .. })
    }

    /// 業務処理のエラーを取り出す。ロック起因の失敗なら None。
    pub fn into_operation(self) -> Option<E> {
        match self {
            GuardError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// ロック起因の失敗を HTTP 層向けの ServiceError に変換する。
    /// 業務処理のエラーは呼び出し側の責務なので None を返す。
    pub fn to_service_error(&self) -> Option<ServiceError> {
        match self {
            GuardError::LockNotAcquired { message, .. } => Some(ServiceError::Conflict {
                code: lock_codes::not_acquired(),
                message: message.clone(),
            }),
            GuardError::UnknownOperation(operation) => Some(ServiceError::Internal {
                code: lock_codes::internal_error(),
                message: format!("lock declaration missing for operation: {operation}"),
            }),
            GuardError::Operation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_not_acquired_displays_configured_message() {
        let err: GuardError<std::io::Error> = GuardError::LockNotAcquired {
            key: "lock:transfer:42".to_string(),
            message: "処理中です".to_string(),
            source: LockError::AlreadyLocked("lock:transfer:42".to_string()),
        };
        assert_eq!(err.to_string(), "処理中です");
        assert!(err.is_lock_not_acquired());

        let service_error = err.to_service_error().unwrap();
        let body = service_error.to_error_response();
        assert_eq!(body.error.code.as_str(), "SYS_LOCK_NOT_ACQUIRED");
        assert_eq!(body.error.message, "処理中です");
    }

    #[test]
    fn test_operation_error_is_passed_through() {
        let err: GuardError<String> = GuardError::Operation("insufficient funds".to_string());
        assert!(err.to_service_error().is_none());
        assert_eq!(err.into_operation().as_deref(), Some("insufficient funds"));
    }
}
