//! Application error model with MCP error mapping
//!
//! Defines a typed error hierarchy using `thiserror` for backend and input
//! failures, and maps each variant to the appropriate MCP `ErrorData` type for
//! protocol compliance.

use rmcp::model::ErrorData;
use serde_json::json;
use thiserror::Error;

/// Application error type
///
/// Covers every failure the bridge surfaces to a caller. Lookup failures
/// inside the rendering pipeline use the same type but are recovered locally
/// and never reach the tool host.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid user input (validation failed, malformed request)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The HTTP call could not complete (connect failure, timeout, cancellation)
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The automation server answered with a non-2xx status
    #[error("backend returned HTTP {status}: {body}")]
    BackendError { status: u16, body: String },
    /// The response body did not match the expected shape
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
    /// Internal error (unexpected failure, runtime construction)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for `InvalidInput`
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Classify a transport-level `reqwest` failure
    ///
    /// Anything that prevented a complete HTTP exchange is reported as
    /// `BackendUnavailable`; body decoding problems are `MalformedResponse`.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if err.is_timeout() {
            Self::BackendUnavailable(format!("request timed out: {err}"))
        } else {
            Self::BackendUnavailable(err.to_string())
        }
    }

    /// Convert to MCP `ErrorData`
    ///
    /// # Mappings
    ///
    /// - `InvalidInput` → `invalid_params`
    /// - `BackendUnavailable` → `internal_error`
    /// - `BackendError` → `internal_error` (with `status`)
    /// - `MalformedResponse` → `internal_error`
    /// - `Internal` → `internal_error`
    pub fn to_error_data(&self) -> ErrorData {
        let msg = self.to_string();
        match self {
            Self::InvalidInput(_) => {
                ErrorData::invalid_params(msg, Some(json!({ "code": "invalid_input" })))
            }
            Self::BackendUnavailable(_) => {
                ErrorData::internal_error(msg, Some(json!({ "code": "backend_unavailable" })))
            }
            Self::BackendError { status, .. } => ErrorData::internal_error(
                msg,
                Some(json!({ "code": "backend_error", "status": status })),
            ),
            Self::MalformedResponse(_) => {
                ErrorData::internal_error(msg, Some(json!({ "code": "malformed_response" })))
            }
            Self::Internal(_) => {
                ErrorData::internal_error(msg, Some(json!({ "code": "internal" })))
            }
        }
    }
}

/// Type alias for fallible return values
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn backend_error_carries_status_in_error_data() {
        let err = AppError::BackendError {
            status: 503,
            body: "busy".to_owned(),
        };
        let data = err.to_error_data();
        let extra = data.data.expect("structured data must be present");
        assert_eq!(extra["code"], "backend_error");
        assert_eq!(extra["status"], 503);
        assert!(data.message.contains("HTTP 503"));
    }

    #[test]
    fn invalid_input_maps_to_invalid_params_code() {
        let data = AppError::invalid("count must be >= 1").to_error_data();
        assert_eq!(data.data.expect("data")["code"], "invalid_input");
    }
}
