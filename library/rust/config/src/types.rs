use std::collections::HashMap;

use serde::Deserialize;

/// GovernanceConfig は排他制御と重複リクエスト抑止の設定全体。
/// すべてのセクションは省略可能で、省略時はデフォルト値になる。
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GovernanceConfig {
    pub app: AppConfig,
    pub backend: BackendConfig,
    pub lock: LockConfig,
    pub dedup: DedupConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// ロックの保持者識別子に使うインスタンス名。省略時は起動ごとに生成する。
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_environment(),
            instance_id: None,
        }
    }
}

fn default_app_name() -> String {
    "tollgate".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// プロセス内のみで完結する。単一インスタンス構成とテスト向け。
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// 例: "redis://127.0.0.1:6379"
    pub redis_url: Option<String>,
    /// Redis キーの名前空間。省略時は app.name を使う。
    pub key_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LockConfig {
    #[serde(default = "default_lock_prefix")]
    pub prefix: String,
    #[serde(default = "default_lease_ms")]
    pub default_lease_ms: u64,
    #[serde(default = "default_wait_ms")]
    pub default_wait_ms: u64,
    #[serde(default)]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// 操作名ごとのロック定義
    #[serde(default)]
    pub operations: HashMap<String, LockOperationConfig>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            prefix: default_lock_prefix(),
            default_lease_ms: default_lease_ms(),
            default_wait_ms: default_wait_ms(),
            failure_message: None,
            backoff: BackoffConfig::default(),
            operations: HashMap::new(),
        }
    }
}

fn default_lock_prefix() -> String {
    "lock:".to_string()
}

fn default_lease_ms() -> u64 {
    10_000
}

fn default_wait_ms() -> u64 {
    3_000
}

/// 操作単位のロック定義。未指定の項目は LockConfig の値を使う。
#[derive(Debug, Deserialize, Clone)]
pub struct LockOperationConfig {
    /// キー式。例: "#accountId"、"#order.customer.id"
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub lease_ms: Option<u64>,
    #[serde(default)]
    pub wait_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub need_wait: bool,
    #[serde(default = "default_true")]
    pub need_method_prefix: bool,
    #[serde(default)]
    pub error_desc: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    10
}

fn default_max_delay_ms() -> u64 {
    200
}

fn default_multiplier() -> f64 {
    2.0
}

/// リクエスト ID が無いリクエストの扱い。
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingRequestIdPolicy {
    /// 400 で拒否する
    #[default]
    Reject,
    /// 重複判定をせずに通す
    PassThrough,
}

/// 重複判定ストアが使えないときの扱い。
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorPolicy {
    /// 警告ログを出して受け付ける
    #[default]
    FailOpen,
    /// 503 で拒否する
    FailClosed,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_header_name")]
    pub header_name: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub missing_request_id: MissingRequestIdPolicy,
    #[serde(default)]
    pub store_error: StoreErrorPolicy,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: default_header_name(),
            ttl_secs: default_ttl_secs(),
            max_capacity: default_max_capacity(),
            include_paths: default_include_paths(),
            exclude_paths: vec![],
            missing_request_id: MissingRequestIdPolicy::default(),
            store_error: StoreErrorPolicy::default(),
        }
    }
}

fn default_header_name() -> String {
    "x-request-id".to_string()
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_max_capacity() -> u64 {
    100_000
}

fn default_include_paths() -> Vec<String> {
    vec!["/api/**".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}
