use async_trait::async_trait;

use crate::DedupError;

/// リクエスト ID とルートを連結する区切り文字。
pub const FINGERPRINT_SEPARATOR: &str = "::";

/// 重複判定に使う指紋を組み立てる。
pub fn fingerprint(request_id: &str, route: &str) -> String {
    format!("{request_id}{FINGERPRINT_SEPARATOR}{route}")
}

#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// 未登録なら登録して true、TTL 内に登録済みなら false を返す。
    /// 同じ指紋への同時呼び出しのうち true を得るのはちょうど 1 つ。
    async fn check_and_mark(&self, fingerprint: &str) -> Result<bool, DedupError>;
}
