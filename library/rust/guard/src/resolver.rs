use serde_json::Value;

use crate::expr;
use crate::params::CallParams;

/// テンプレートが空のときに使う固定キー。操作全体が 1 つのロックで直列化される。
pub const DEFAULT_FALLBACK_KEY: &str = "global";

/// キーテンプレートを呼び出し引数で評価し、ロックキー本体を返す。
///
/// - テンプレートが空白のみなら `fallback` を返す（意図的な粗粒度ロック）。
/// - 評価に失敗した場合は例外にせず、警告ログを出してテンプレート文字列をそのまま返す。
/// - 評価結果が null や空文字の場合もテンプレート文字列を返す。空キーは返さない。
pub fn resolve(template: &str, params: &CallParams, fallback: &str) -> String {
    if template.trim().is_empty() {
        return fallback.to_string();
    }
    match expr::evaluate(template, params) {
        Ok(Some(value)) if !value.trim().is_empty() => value,
        Ok(_) => {
            tracing::warn!(template, "key expression evaluated to an empty value; using template text");
            template.to_string()
        }
        Err(e) => {
            tracing::warn!(template, error = %e, "key resolution degraded; using template text");
            template.to_string()
        }
    }
}

/// 引数名と値の配列を直接受け取る版。
pub fn resolve_with(template: &str, names: &[&str], values: &[Value], fallback: &str) -> String {
    resolve(template, &CallParams::from_parts(names, values), fallback)
}

/// `prefix + [operation + ":"] + key` を組み立てる。
pub fn compose_key(prefix: &str, operation: Option<&str>, key: &str) -> String {
    match operation {
        Some(operation) => format!("{prefix}{operation}:{key}"),
        None => format!("{prefix}{key}"),
    }
}
