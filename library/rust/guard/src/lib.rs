//! tollgate-guard: 宣言的なロック定義に基づく業務処理の排他実行。
//!
//! 呼び出し引数からキー式でロックキーを組み立て、
//! `tollgate-lock` の LockManager でロックを取得してから処理を実行する。

pub mod error;
pub mod expr;
pub mod guard;
pub mod params;
pub mod resolver;
pub mod spec;

pub use error::{GuardError, KeyError};
pub use guard::ExecutionGuard;
pub use params::CallParams;
pub use resolver::{compose_key, resolve, resolve_with, DEFAULT_FALLBACK_KEY};
pub use spec::{LockSpec, LockSpecRegistry, WaitPolicy};
