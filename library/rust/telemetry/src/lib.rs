pub mod logger;


use thiserror::Error;
use tracing_subscriber::{
    fmt, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

pub use logger::default_level_for;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },
    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// TelemetryConfig は telemetry ライブラリの初期化設定を保持する。
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub environment: String,
    /// EnvFilter 形式。空の場合は environment から決める。
    pub log_level: String,
    /// ログ出力フォーマット。"text" の場合はプレーンテキスト、それ以外は JSON。
    pub log_format: String,
}

impl TelemetryConfig {
    /// 実際に使うフィルタ文字列。RUST_LOG があればそれを優先する。
    pub fn effective_filter(&self) -> String {
        if let Ok(from_env) = std::env::var(EnvFilter::DEFAULT_ENV) {
            if !from_env.trim().is_empty() {
                return from_env;
            }
        }
        if self.log_level.trim().is_empty() {
            default_level_for(&self.environment).to_string()
        } else {
            self.log_level.clone()
        }
    }
}

/// init_telemetry は tracing-subscriber を初期化する。
/// プロセスで一度だけ呼ぶ。二度目以降は `AlreadyInitialized` を返す。
pub fn init_telemetry(cfg: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter_str = cfg.effective_filter();
    let filter = EnvFilter::try_new(&filter_str).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter_str.clone(),
        message: e.to_string(),
    })?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if cfg.log_format == "text" {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    };
    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        service = %cfg.service_name,
        environment = %cfg.environment,
        filter = %filter_str,
        "telemetry initialized"
    );
    Ok(())
}
