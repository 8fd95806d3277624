pub mod backoff;
pub mod context;
pub mod error;
pub mod lock;
pub mod manager;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use backoff::WaitBackoff;
pub use context::{CallContext, HolderIdentity};
pub use error::LockError;
pub use lock::{LockHandle, LockService};
pub use manager::LockManager;
pub use memory::InMemoryLockService;
#[cfg(feature = "redis")]
pub use self::redis::RedisLockService;

#[cfg(feature = "mock")]
pub use lock::MockLockService;
