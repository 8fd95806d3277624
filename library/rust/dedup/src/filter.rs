use std::sync::Arc;
use std::time::Duration;

use crate::memory::DEFAULT_TTL;
use crate::path::{PathMatcher, PatternError};
use crate::store::{fingerprint, DedupStore};
use crate::AdmissionError;

/// リクエスト ID を運ぶヘッダー名のデフォルト値
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const DEFAULT_INCLUDE_PATH: &str = "/api/**";

pub use tollgate_config::{MissingRequestIdPolicy, StoreErrorPolicy};

/// AdmissionFilter の設定
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub enabled: bool,
    pub header_name: String,
    /// 指紋の保持期間。ストア生成時に使う。
    pub ttl: Duration,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub missing_request_id: MissingRequestIdPolicy,
    pub store_error: StoreErrorPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: REQUEST_ID_HEADER.to_string(),
            ttl: DEFAULT_TTL,
            include_paths: vec![DEFAULT_INCLUDE_PATH.to_string()],
            exclude_paths: vec![],
            missing_request_id: MissingRequestIdPolicy::default(),
            store_error: StoreErrorPolicy::default(),
        }
    }
}

/// 受け付け判定の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// 初めて見る指紋として登録して受け付けた
    Accepted { fingerprint: String },
    /// 判定対象外（無効化、対象外パス、ID なしの通過）
    Bypassed,
    /// ストア障害のため判定せずに受け付けた
    Unchecked { fingerprint: String },
}

/// AdmissionFilter はハンドラ実行前に重複リクエストを弾くゲート。
pub struct AdmissionFilter {
    store: Arc<dyn DedupStore>,
    config: AdmissionConfig,
    matcher: PathMatcher,
}

impl AdmissionFilter {
    pub fn new(store: Arc<dyn DedupStore>, config: AdmissionConfig) -> Result<Self, PatternError> {
        let matcher = PathMatcher::new(config.include_paths.as_slice(), config.exclude_paths.as_slice())?;
        Ok(Self {
            store,
            config,
            matcher,
        })
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn header_name(&self) -> &str {
        &self.config.header_name
    }

    /// このパスが重複判定の対象かどうか。
    pub fn applies_to(&self, route: &str) -> bool {
        self.config.enabled && self.matcher.matches(route)
    }

    /// リクエスト ID とルートから受け付け可否を判定する。
    pub async fn admit(
        &self,
        request_id: Option<&str>,
        route: &str,
    ) -> Result<Admission, AdmissionError> {
        if !self.applies_to(route) {
            return Ok(Admission::Bypassed);
        }

        let Some(request_id) = request_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return match self.config.missing_request_id {
                MissingRequestIdPolicy::Reject => {
                    tracing::info!(route, header = %self.config.header_name, "request rejected: missing request id");
                    Err(AdmissionError::MissingRequestId {
                        header: self.config.header_name.clone(),
                    })
                }
                MissingRequestIdPolicy::PassThrough => Ok(Admission::Bypassed),
            };
        };

        let fingerprint = fingerprint(request_id, route);
        match self.store.check_and_mark(&fingerprint).await {
            Ok(true) => {
                tracing::debug!(fingerprint = %fingerprint, "request admitted");
                Ok(Admission::Accepted { fingerprint })
            }
            Ok(false) => {
                tracing::info!(fingerprint = %fingerprint, "duplicate request rejected");
                Err(AdmissionError::DuplicateRequest { fingerprint })
            }
            Err(e) => match self.config.store_error {
                StoreErrorPolicy::FailOpen => {
                    tracing::warn!(fingerprint = %fingerprint, error = %e, "dedup store error; admitting request unchecked");
                    Ok(Admission::Unchecked { fingerprint })
                }
                StoreErrorPolicy::FailClosed => {
                    tracing::warn!(fingerprint = %fingerprint, error = %e, "dedup store error; rejecting request");
                    Err(AdmissionError::StoreUnavailable(e))
                }
            },
        }
    }
}
