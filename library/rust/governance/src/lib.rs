//! tollgate-governance: 設定から排他制御と重複リクエスト抑止の一式を組み立てる。
//!
//! ```ignore
//! let config = tollgate_config::load("config/config.yaml", Some("config/prod.yaml"))?;
//! tollgate_telemetry::init_telemetry(&tollgate_governance::mapping::telemetry_config(&config))?;
//! let governance = Governance::from_config(&config).await?;
//!
//! let app = Router::new()
//!     .route("/api/pay", post(pay))
//!     .layer(middleware::from_fn_with_state(governance.admission_state(), admission_middleware));
//!
//! // 終了時
//! governance.shutdown().await;
//! ```

pub mod error;
pub mod governance;
mod lifecycle;
pub mod mapping;

pub use error::GovernanceError;
pub use governance::Governance;
