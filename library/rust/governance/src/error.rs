use thiserror::Error;
use tollgate_config::ConfigError;
use tollgate_dedup::PatternError;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("設定が不正です: {0}")]
    Config(#[from] ConfigError),
    #[error("受付対象パスの設定が不正です: {0}")]
    PathPattern(#[from] PatternError),
    #[error("バックエンドを初期化できません: {0}")]
    Backend(String),
}
