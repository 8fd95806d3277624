//! tollgate-server-common: 重複排除・排他制御ライブラリ共通のサーバー基盤。
//!
//! `SYS_{SERVICE}_{ERROR}` 形式の構造化エラーコードと、
//! HTTP レスポンス用の統一エラー型、axum 連携を提供する。

pub mod error;

pub use error::{ErrorBody, ErrorCode, ErrorResponse, ServiceError};
