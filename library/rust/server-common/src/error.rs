//! Structured error codes for tollgate request governance.
//!
//! Error codes follow the pattern: `SYS_{SERVICE}_{ERROR}`
//!
//! Examples:
//! - `SYS_LOCK_NOT_ACQUIRED`
//! - `SYS_ADMISSION_DUPLICATE_REQUEST`
//! - `SYS_ADMISSION_MISSING_REQUEST_ID`
//!
//! Each error includes a machine-readable code, human-readable message,
//! and a request ID for tracing.

use serde::Serialize;

/// ErrorCode represents a structured error code.
///
/// Error codes follow the `SYS_{SERVICE}_{ERROR}` naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode(String);

impl ErrorCode {
    /// Create a new error code from a string.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Create a standard "internal error" error code for a service.
    pub fn internal(service: &str) -> Self {
        Self(format!("SYS_{}_INTERNAL_ERROR", service.to_uppercase()))
    }

    /// Create a standard "service unavailable" error code for a service.
    pub fn service_unavailable(service: &str) -> Self {
        Self(format!(
            "SYS_{}_SERVICE_UNAVAILABLE",
            service.to_uppercase()
        ))
    }

    /// Return the error code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for ErrorCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// ErrorBody is the structured error payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

/// ErrorResponse wraps ErrorBody in an `{ "error": ... }` envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    /// A fresh request ID is generated.
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        }
    }

    /// Replace the generated request ID with the one the client sent.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.error.request_id = request_id.into();
        self
    }
}

/// ServiceError is a high-level error type that maps to HTTP status codes.
///
/// When the `axum` feature is enabled, ServiceError implements `IntoResponse`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// 400 Bad Request
    #[error("{message}")]
    BadRequest { code: ErrorCode, message: String },

    /// 409 Conflict
    #[error("{message}")]
    Conflict { code: ErrorCode, message: String },

    /// 500 Internal Server Error
    #[error("{message}")]
    Internal { code: ErrorCode, message: String },

    /// 503 Service Unavailable
    #[error("{message}")]
    ServiceUnavailable { code: ErrorCode, message: String },
}

impl ServiceError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::BadRequest { .. } => 400,
            ServiceError::Conflict { .. } => 409,
            ServiceError::Internal { .. } => 500,
            ServiceError::ServiceUnavailable { .. } => 503,
        }
    }

    pub fn code(&self) -> &ErrorCode {
        match self {
            ServiceError::BadRequest { code, .. }
            | ServiceError::Conflict { code, .. }
            | ServiceError::Internal { code, .. }
            | ServiceError::ServiceUnavailable { code, .. } => code,
        }
    }

    /// Convert to an ErrorResponse.
    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            ServiceError::BadRequest { code, message }
            | ServiceError::Conflict { code, message }
            | ServiceError::Internal { code, message }
            | ServiceError::ServiceUnavailable { code, message } => {
                ErrorResponse::new(code.clone(), message.clone())
            }
        }
    }
}

// --- axum integration ---

#[cfg(feature = "axum")]
impl ServiceError {
    /// Build a response whose body carries the given request ID.
    pub fn into_response_with_request_id(
        self,
        request_id: impl Into<String>,
    ) -> axum::response::Response {
        use axum::response::IntoResponse;

        let status = self.axum_status();
        let body = self.to_error_response().with_request_id(request_id);
        (status, axum::Json(body)).into_response()
    }

    fn axum_status(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let status = self.axum_status();
        let body = self.to_error_response();
        (status, axum::Json(body)).into_response()
    }
}

// --- Well-known error codes ---

/// Well-known error codes for lock-guarded execution.
pub mod lock {
    use super::ErrorCode;

    pub fn not_acquired() -> ErrorCode {
        ErrorCode::new("SYS_LOCK_NOT_ACQUIRED")
    }

    pub fn internal_error() -> ErrorCode {
        ErrorCode::internal("LOCK")
    }
}

/// Well-known error codes for request admission (duplicate suppression).
pub mod admission {
    use super::ErrorCode;

    pub fn duplicate_request() -> ErrorCode {
        ErrorCode::new("SYS_ADMISSION_DUPLICATE_REQUEST")
    }

    pub fn missing_request_id() -> ErrorCode {
        ErrorCode::new("SYS_ADMISSION_MISSING_REQUEST_ID")
    }

    pub fn store_unavailable() -> ErrorCode {
        ErrorCode::service_unavailable("ADMISSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_codes() {
        assert_eq!(lock::not_acquired().as_str(), "SYS_LOCK_NOT_ACQUIRED");
        assert_eq!(lock::internal_error().as_str(), "SYS_LOCK_INTERNAL_ERROR");
        assert_eq!(
            admission::store_unavailable().as_str(),
            "SYS_ADMISSION_SERVICE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_error_response_new() {
        let resp = ErrorResponse::new("SYS_LOCK_NOT_ACQUIRED", "busy");
        assert_eq!(resp.error.code.as_str(), "SYS_LOCK_NOT_ACQUIRED");
        assert_eq!(resp.error.message, "busy");
        assert!(!resp.error.request_id.is_empty());
    }

    #[test]
    fn test_error_response_with_request_id() {
        let resp = ErrorResponse::new(admission::duplicate_request(), "duplicate")
            .with_request_id("req-1");
        assert_eq!(resp.error.request_id, "req-1");
    }

    #[test]
    fn test_service_error_status_codes() {
        let bad_request = ServiceError::BadRequest {
            code: admission::missing_request_id(),
            message: "x".to_string(),
        };
        let conflict = ServiceError::Conflict {
            code: lock::not_acquired(),
            message: "busy".to_string(),
        };
        let internal = ServiceError::Internal {
            code: lock::internal_error(),
            message: "x".to_string(),
        };
        let unavailable = ServiceError::ServiceUnavailable {
            code: admission::store_unavailable(),
            message: "x".to_string(),
        };
        assert_eq!(bad_request.status_code(), 400);
        assert_eq!(conflict.status_code(), 409);
        assert_eq!(internal.status_code(), 500);
        assert_eq!(unavailable.status_code(), 503);
        assert_eq!(conflict.to_error_response().error.code.as_str(), "SYS_LOCK_NOT_ACQUIRED");
    }

    #[test]
    fn test_error_response_serialization() {
        let resp = ErrorResponse::new("SYS_ADMISSION_DUPLICATE_REQUEST", "duplicate");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"]["code"], "SYS_ADMISSION_DUPLICATE_REQUEST");
        assert_eq!(json["error"]["message"], "duplicate");
        assert!(json["error"]["request_id"].is_string());
    }

    #[cfg(feature = "axum")]
    #[tokio::test]
    async fn test_into_response_with_request_id() {
        use http_body_util::BodyExt;

        let err = ServiceError::Conflict {
            code: admission::duplicate_request(),
            message: "duplicate".to_string(),
        };
        let resp = err.into_response_with_request_id("req-9");
        assert_eq!(resp.status(), axum::http::StatusCode::CONFLICT);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "SYS_ADMISSION_DUPLICATE_REQUEST");
        assert_eq!(json["error"]["request_id"], "req-9");
    }
}
