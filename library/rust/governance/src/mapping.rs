//! 設定値から実行時の型への変換。

use std::time::Duration;

use tollgate_config::{BackoffConfig, DedupConfig, GovernanceConfig, LockConfig, LockOperationConfig};
use tollgate_dedup::AdmissionConfig;
use tollgate_guard::spec::DEFAULT_FAILURE_MESSAGE;
use tollgate_guard::{LockSpec, LockSpecRegistry};
use tollgate_lock::WaitBackoff;
use tollgate_telemetry::TelemetryConfig;

/// 操作単位の定義に、省略された項目だけ LockConfig の値を補って LockSpec にする。
pub fn lock_spec(operation: &LockOperationConfig, lock: &LockConfig) -> LockSpec {
    let mut spec = LockSpec::new(operation.key.clone())
        .with_prefix(operation.prefix.clone().unwrap_or_else(|| lock.prefix.clone()))
        .with_lease(Duration::from_millis(
            operation.lease_ms.unwrap_or(lock.default_lease_ms),
        ))
        .with_failure_message(
            operation
                .error_desc
                .clone()
                .or_else(|| lock.failure_message.clone())
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        );
    spec = if operation.need_wait {
        spec.wait_up_to(Duration::from_millis(
            operation.wait_ms.unwrap_or(lock.default_wait_ms),
        ))
    } else {
        spec.no_wait()
    };
    if !operation.need_method_prefix {
        spec = spec.without_operation_name();
    }
    spec
}

pub fn lock_registry(lock: &LockConfig) -> LockSpecRegistry {
    lock.operations
        .iter()
        .fold(LockSpecRegistry::new(), |registry, (name, operation)| {
            registry.with(name.clone(), lock_spec(operation, lock))
        })
}

pub fn wait_backoff(backoff: &BackoffConfig) -> WaitBackoff {
    WaitBackoff::default()
        .with_initial_delay(Duration::from_millis(backoff.initial_delay_ms))
        .with_max_delay(Duration::from_millis(backoff.max_delay_ms))
        .with_multiplier(backoff.multiplier)
        .with_jitter(backoff.jitter)
}

pub fn admission_config(dedup: &DedupConfig) -> AdmissionConfig {
    AdmissionConfig {
        enabled: dedup.enabled,
        header_name: dedup.header_name.clone(),
        ttl: Duration::from_secs(dedup.ttl_secs),
        include_paths: dedup.include_paths.clone(),
        exclude_paths: dedup.exclude_paths.clone(),
        missing_request_id: dedup.missing_request_id,
        store_error: dedup.store_error,
    }
}

pub fn telemetry_config(config: &GovernanceConfig) -> TelemetryConfig {
    TelemetryConfig {
        service_name: config.app.name.clone(),
        environment: config.app.environment.clone(),
        log_level: config.log.level.clone(),
        log_format: config.log.format.clone(),
    }
}
