use thiserror::Error;
use tollgate_server_common::error::{admission as admission_codes, ServiceError};

/// 重複判定ストアの障害。バックエンド固有のエラー型は外に出さない。
#[derive(Debug, Clone, Error)]
pub enum DedupError {
    #[error("重複判定ストアに接続できません: {0}")]
    Unavailable(String),
}

/// リクエスト受付フィルタの拒否理由。
#[derive(Debug, Clone, Error)]
pub enum AdmissionError {
    #[error("重複リクエストです: {fingerprint}")]
    DuplicateRequest { fingerprint: String },
    #[error("リクエスト ID がありません: header={header}")]
    MissingRequestId { header: String },
    #[error("重複判定ストアが利用できません: {0}")]
    StoreUnavailable(#[source] DedupError),
}

impl AdmissionError {
    pub fn to_service_error(&self) -> ServiceError {
        match self {
            AdmissionError::DuplicateRequest { .. } => ServiceError::Conflict {
                code: admission_codes::duplicate_request(),
                message: "同一のリクエストが既に受け付けられています".to_string(),
            },
            AdmissionError::MissingRequestId { header } => ServiceError::BadRequest {
                code: admission_codes::missing_request_id(),
                message: format!("{header} ヘッダーが必要です"),
            },
            AdmissionError::StoreUnavailable(_) => ServiceError::ServiceUnavailable {
                code: admission_codes::store_unavailable(),
                message: "一時的にリクエストを受け付けられません".to_string(),
            },
        }
    }
}
