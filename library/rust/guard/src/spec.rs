use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_PREFIX: &str = "lock:";
pub const DEFAULT_LEASE: Duration = Duration::from_secs(10);
pub const DEFAULT_WAIT: Duration = Duration::from_secs(3);
pub const DEFAULT_FAILURE_MESSAGE: &str = "システムが混雑しています。しばらくしてから再度お試しください";

/// ロックが取れなかったときの振る舞い。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// 一度だけ試して諦める
    NoWait,
    /// 指定時間まで待つ
    WaitUpTo(Duration),
}

/// LockSpec は保護対象の操作に付与するロック定義。呼び出しごとに読み出され、変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSpec {
    pub key_template: String,
    pub prefix: String,
    pub include_operation_name: bool,
    pub lease: Duration,
    pub wait_policy: WaitPolicy,
    pub failure_message: String,
}

impl Default for LockSpec {
    fn default() -> Self {
        Self {
            key_template: String::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            include_operation_name: true,
            lease: DEFAULT_LEASE,
            wait_policy: WaitPolicy::WaitUpTo(DEFAULT_WAIT),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl LockSpec {
    pub fn new(key_template: impl Into<String>) -> Self {
        Self {
            key_template: key_template.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// キーに操作名を含めない。異なる操作間でロックを共有したい場合に使う。
    pub fn without_operation_name(mut self) -> Self {
        self.include_operation_name = false;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.wait_policy = WaitPolicy::NoWait;
        self
    }

    pub fn wait_up_to(mut self, wait: Duration) -> Self {
        self.wait_policy = WaitPolicy::WaitUpTo(wait);
        self
    }

    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }
}

/// 操作名から LockSpec を引く登録簿。設定ファイルから組み立てる。
#[derive(Debug, Clone, Default)]
pub struct LockSpecRegistry {
    specs: HashMap<String, LockSpec>,
}

impl LockSpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: impl Into<String>, spec: LockSpec) -> Option<LockSpec> {
        self.specs.insert(operation.into(), spec)
    }

    pub fn with(mut self, operation: impl Into<String>, spec: LockSpec) -> Self {
        self.register(operation, spec);
        self
    }

    pub fn get(&self, operation: &str) -> Option<&LockSpec> {
        self.specs.get(operation)
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
