pub mod error;
pub mod filter;
pub mod layer;
pub mod memory;
pub mod path;
#[cfg(feature = "redis")]
pub mod redis;
pub mod store;

pub use error::{AdmissionError, DedupError};
pub use filter::{
    Admission, AdmissionConfig, AdmissionFilter, MissingRequestIdPolicy, StoreErrorPolicy,
    DEFAULT_INCLUDE_PATH, REQUEST_ID_HEADER,
};
pub use layer::{admission_middleware, AdmissionState};
pub use memory::InMemoryDedupStore;
pub use path::{PathMatcher, PatternError};
#[cfg(feature = "redis")]
pub use self::redis::RedisDedupStore;
pub use store::{fingerprint, DedupStore, FINGERPRINT_SEPARATOR};

#[cfg(feature = "mock")]
pub use store::MockDedupStore;
