use std::fmt;

use uuid::Uuid;

/// CallContext は呼び出し元の識別子と呼び出し単位のトークンを明示的に運ぶコンテキスト。
///
/// `new` のたびに新しい呼び出しトークンを払い出すため、同じ `caller_id` でも
/// 別々に生成したコンテキストは別の保持者になる。入れ子の呼び出しでは
/// 同じコンテキスト（参照またはクローン）を渡すことで再入可能になる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    caller_id: String,
    invocation_id: Uuid,
}

impl CallContext {
    /// 認証済みユーザーなど、呼び出し元を表す識別子から生成する。
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            invocation_id: Uuid::new_v4(),
        }
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }
}

/// HolderIdentity はロックの所有者を表す。
/// インスタンス識別子、呼び出し元識別子、呼び出しトークンの組で一意になる。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HolderIdentity {
    instance_id: String,
    caller_id: String,
    invocation_id: Uuid,
}

impl HolderIdentity {
    pub fn new(instance_id: impl Into<String>, ctx: &CallContext) -> Self {
        Self {
            instance_id: instance_id.into(),
            caller_id: ctx.caller_id.clone(),
            invocation_id: ctx.invocation_id,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }
}

impl fmt::Display for HolderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.instance_id, self.caller_id, self.invocation_id
        )
    }
}
