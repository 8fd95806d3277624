use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

const BASE_CONFIG: &str = r##"
app:
  name: payments
  environment: dev
backend:
  kind: memory
lock:
  default_lease_ms: 5000
  operations:
    transfer:
      key: "#accountId"
      lease_ms: 5000
      wait_ms: 2000
      error_desc: "振替処理が混雑しています"
    settle:
      need_wait: false
      need_method_prefix: false
dedup:
  header_name: x-request-id
  include_paths:
    - "/api/**"
  exclude_paths:
    - "/api/health"
log:
  level: debug
  format: text
"##;

fn write_temp(content: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    write!(f, "{}", content).unwrap();
    f
}

#[test]
fn test_load() {
    let f = write_temp(BASE_CONFIG);
    let cfg = load(f.path().to_str().unwrap(), None).unwrap();
    assert_eq!(cfg.app.name, "payments");
    assert_eq!(cfg.backend.kind, BackendKind::Memory);
    assert_eq!(cfg.lock.default_lease_ms, 5000);
    assert_eq!(cfg.log.format, "text");

    let transfer = &cfg.lock.operations["transfer"];
    assert_eq!(transfer.key, "#accountId");
    assert_eq!(transfer.wait_ms, Some(2000));
    assert!(transfer.need_wait);
    assert!(transfer.need_method_prefix);

    let settle = &cfg.lock.operations["settle"];
    assert_eq!(settle.key, "");
    assert!(!settle.need_wait);
    assert!(!settle.need_method_prefix);
    assert!(validate(&cfg).is_ok());
}

#[test]
fn test_defaults_when_sections_omitted() {
    let cfg = from_yaml_str("app:\n  name: minimal\n", None).unwrap();
    assert_eq!(cfg.lock.prefix, "lock:");
    assert_eq!(cfg.lock.default_lease_ms, 10_000);
    assert_eq!(cfg.lock.default_wait_ms, 3_000);
    assert_eq!(cfg.lock.backoff.initial_delay_ms, 10);
    assert!(cfg.dedup.enabled);
    assert_eq!(cfg.dedup.header_name, "x-request-id");
    assert_eq!(cfg.dedup.ttl_secs, 600);
    assert_eq!(cfg.dedup.max_capacity, 100_000);
    assert_eq!(cfg.dedup.include_paths, vec!["/api/**".to_string()]);
    assert_eq!(cfg.dedup.missing_request_id, MissingRequestIdPolicy::Reject);
    assert_eq!(cfg.dedup.store_error, StoreErrorPolicy::FailOpen);
    assert_eq!(cfg.log.format, "json");
    assert!(validate(&cfg).is_ok());
}

#[test]
fn test_empty_document_is_all_defaults() {
    let cfg = from_yaml_str("", None).unwrap();
    assert_eq!(cfg.app.name, "tollgate");
    assert!(validate(&cfg).is_ok());
}

#[test]
fn test_load_file_not_found() {
    let result = load("/nonexistent/config.yaml", None);
    assert!(result.is_err());
    let err = result.unwrap_err().to_string();
    assert!(err.contains("failed to read file"));
}

#[test]
fn test_load_invalid_yaml() {
    let f = write_temp("invalid: [yaml: broken");
    let result = load(f.path().to_str().unwrap(), None);
    assert!(matches!(result, Err(ConfigError::ParseYaml(_))));
}

#[test]
fn test_load_with_env_override() {
    let base = write_temp(BASE_CONFIG);
    let env = write_temp(
        r#"
app:
  environment: prod
backend:
  kind: redis
  redis_url: "redis://redis.internal:6379"
dedup:
  missing_request_id: pass_through
  store_error: fail_closed
"#,
    );

    let cfg = load(
        base.path().to_str().unwrap(),
        Some(env.path().to_str().unwrap()),
    )
    .unwrap();
    assert_eq!(cfg.app.name, "payments");
    assert_eq!(cfg.app.environment, "prod");
    assert_eq!(cfg.backend.kind, BackendKind::Redis);
    assert_eq!(
        cfg.backend.redis_url.as_deref(),
        Some("redis://redis.internal:6379")
    );
    // マージ対象外の項目は base の値が残る
    assert_eq!(cfg.dedup.header_name, "x-request-id");
    assert_eq!(cfg.dedup.exclude_paths, vec!["/api/health".to_string()]);
    assert_eq!(cfg.dedup.missing_request_id, MissingRequestIdPolicy::PassThrough);
    assert_eq!(cfg.dedup.store_error, StoreErrorPolicy::FailClosed);
    assert_eq!(cfg.lock.operations.len(), 2);
    assert!(validate(&cfg).is_ok());
}

#[test]
fn test_merge_yaml_null_overlay_keeps_base() {
    let mut base: serde_yaml::Value = serde_yaml::from_str("a: 1\nb:\n  c: 2\n").unwrap();
    let overlay: serde_yaml::Value = serde_yaml::from_str("a: ~\nb:\n  d: 3\n").unwrap();
    merge_yaml(&mut base, &overlay);
    assert_eq!(base["a"], serde_yaml::Value::from(1));
    assert_eq!(base["b"]["c"], serde_yaml::Value::from(2));
    assert_eq!(base["b"]["d"], serde_yaml::Value::from(3));
}

#[test]
fn test_validate_redis_requires_url() {
    let mut cfg = GovernanceConfig::default();
    cfg.backend.kind = BackendKind::Redis;
    let err = validate(&cfg).unwrap_err().to_string();
    assert!(err.contains("backend.redis_url"));

    cfg.backend.redis_url = Some("redis://127.0.0.1:6379".to_string());
    assert!(validate(&cfg).is_ok());
}

#[test]
fn test_validate_lock_settings() {
    let mut cfg = GovernanceConfig::default();
    cfg.lock.default_lease_ms = 0;
    assert!(validate(&cfg).unwrap_err().to_string().contains("default_lease_ms"));

    let mut cfg = GovernanceConfig::default();
    cfg.lock.backoff.multiplier = 0.5;
    assert!(validate(&cfg).unwrap_err().to_string().contains("multiplier"));

    let cfg = from_yaml_str(
        "lock:\n  operations:\n    transfer:\n      key: \"#id\"\n      lease_ms: 0\n",
        None,
    )
    .unwrap();
    assert!(validate(&cfg)
        .unwrap_err()
        .to_string()
        .contains("lock.operations.transfer.lease_ms"));
}

#[test]
fn test_validate_dedup_settings() {
    let mut cfg = GovernanceConfig::default();
    cfg.dedup.ttl_secs = 0;
    assert!(validate(&cfg).unwrap_err().to_string().contains("ttl_secs"));

    let mut cfg = GovernanceConfig::default();
    cfg.dedup.max_capacity = 0;
    assert!(validate(&cfg).unwrap_err().to_string().contains("max_capacity"));

    let mut cfg = GovernanceConfig::default();
    cfg.dedup.header_name = " ".to_string();
    assert!(validate(&cfg).unwrap_err().to_string().contains("header_name"));
}

#[test]
fn test_validate_environment_and_log_format() {
    let mut cfg = GovernanceConfig::default();
    cfg.app.environment = "qa".to_string();
    assert!(validate(&cfg).unwrap_err().to_string().contains("app.environment"));

    let mut cfg = GovernanceConfig::default();
    cfg.log.format = "xml".to_string();
    assert!(validate(&cfg).unwrap_err().to_string().contains("log.format"));
}
