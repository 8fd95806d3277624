mod merge;

use thiserror::Error;

pub use merge::merge_yaml;

mod types;
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

/// YAML を読み込み GovernanceConfig を返す。env_path があればマージしてから解釈する。
pub fn load(base_path: &str, env_path: Option<&str>) -> Result<GovernanceConfig, ConfigError> {
    let base = std::fs::read_to_string(base_path)?;
    let overlay = env_path.map(std::fs::read_to_string).transpose()?;
    from_yaml_str(&base, overlay.as_deref())
}

/// 文字列から読み込む。load と同じマージ規則を使う。
pub fn from_yaml_str(base: &str, overlay: Option<&str>) -> Result<GovernanceConfig, ConfigError> {
    let mut value: serde_yaml::Value = serde_yaml::from_str(base)?;
    if let Some(overlay) = overlay {
        let overlay_value: serde_yaml::Value = serde_yaml::from_str(overlay)?;
        merge_yaml(&mut value, &overlay_value);
    }
    // 空ファイルは全項目デフォルトとして扱う
    if value.is_null() {
        return Ok(GovernanceConfig::default());
    }
    Ok(serde_yaml::from_value(value)?)
}

/// 設定値のバリデーション。
pub fn validate(config: &GovernanceConfig) -> Result<(), ConfigError> {
    if config.app.name.is_empty() {
        return Err(ConfigError::Validation("app.name is required".into()));
    }
    if !["dev", "staging", "prod"].contains(&config.app.environment.as_str()) {
        return Err(ConfigError::Validation(
            "app.environment must be dev, staging, or prod".into(),
        ));
    }
    if config.backend.kind == BackendKind::Redis
        && config
            .backend
            .redis_url
            .as_deref()
            .map_or(true, |url| url.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "backend.redis_url is required when backend.kind is redis".into(),
        ));
    }
    validate_lock(&config.lock)?;
    validate_dedup(&config.dedup)?;
    if !["json", "text"].contains(&config.log.format.as_str()) {
        return Err(ConfigError::Validation(
            "log.format must be json or text".into(),
        ));
    }
    Ok(())
}

fn validate_lock(lock: &LockConfig) -> Result<(), ConfigError> {
    if lock.default_lease_ms == 0 {
        return Err(ConfigError::Validation(
            "lock.default_lease_ms must be > 0".into(),
        ));
    }
    if lock.backoff.initial_delay_ms == 0 || lock.backoff.max_delay_ms < lock.backoff.initial_delay_ms {
        return Err(ConfigError::Validation(
            "lock.backoff delays must satisfy 0 < initial_delay_ms <= max_delay_ms".into(),
        ));
    }
    if lock.backoff.multiplier < 1.0 {
        return Err(ConfigError::Validation(
            "lock.backoff.multiplier must be >= 1.0".into(),
        ));
    }
    for (name, operation) in &lock.operations {
        if operation.lease_ms == Some(0) {
            return Err(ConfigError::Validation(format!(
                "lock.operations.{name}.lease_ms must be > 0"
            )));
        }
    }
    Ok(())
}

fn validate_dedup(dedup: &DedupConfig) -> Result<(), ConfigError> {
    if dedup.header_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dedup.header_name is required".into(),
        ));
    }
    if dedup.ttl_secs == 0 {
        return Err(ConfigError::Validation("dedup.ttl_secs must be > 0".into()));
    }
    if dedup.max_capacity == 0 {
        return Err(ConfigError::Validation(
            "dedup.max_capacity must be > 0".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
