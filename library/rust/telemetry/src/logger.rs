//! 構造化ログユーティリティ。
//! tracing クレートを使用し、JSON またはテキスト形式の構造化ログを出力する。
//!
//! # 使用例
//!
//! ```ignore
//! use tracing::{debug, warn};
//!
//! debug!(key = "lock:transfer:42", holder = %holder, "lock acquired");
//! warn!(fingerprint = %fp, error = %e, "dedup store error; admitting request unchecked");
//! ```

/// 環境ごとのデフォルトのログレベル。
///
/// - dev: debug
/// - staging: info
/// - prod: warn
pub fn default_level_for(environment: &str) -> &'static str {
    match environment {
        "dev" => "debug",
        "staging" => "info",
        _ => "warn",
    }
}
