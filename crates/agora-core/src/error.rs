//! Error types for Agora.
//!
//! This module provides the [`AgoraError`] type, the error taxonomy every
//! exchange failure is reported through. Each variant belongs to an
//! [`ErrorCategory`] which fixes the HTTP status code surfaced to the client:
//!
//! | `ErrorCategory` | Status |
//! |---|---|
//! | `Validation` | 400 |
//! | `Authentication` | 401 |
//! | `Authorization` | 403 |
//! | `NotFound` | 404 |
//! | `Conflict` | 409 |
//! | `PayloadTooLarge` | 413 |
//! | `Storage` | 500 |
//! | `Internal` | 500 |
//! | `NotImplemented` | 501 |
//!
//! Every error is scoped to one exchange; nothing here is fatal to the process.

use agora_schema::SchemaError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`AgoraError`].
pub type AgoraResult<T> = Result<T, AgoraError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input shape or type mismatch, undecodable input.
    Validation,
    /// Missing, expired or unknown session.
    Authentication,
    /// Identified caller lacks a right.
    Authorization,
    /// Addressed resource does not exist.
    NotFound,
    /// Resource already exists.
    Conflict,
    /// Request body exceeded the collection limit.
    PayloadTooLarge,
    /// Method not served by the bound handler.
    NotImplemented,
    /// Transaction or backend failure.
    Storage,
    /// Unhandled evaluation error.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Storage | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Standard error type for Agora exchanges.
///
/// # Example
///
/// ```
/// use agora_core::{AgoraError, ErrorCategory};
///
/// fn require_key(key: Option<&str>) -> Result<&str, AgoraError> {
///     key.ok_or_else(|| AgoraError::not_found("no key segment"))
/// }
///
/// let err = require_key(None).unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// ```
#[derive(Error, Debug)]
pub enum AgoraError {
    /// Request validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Path of the offending field, when known.
        field: Option<String>,
    },

    /// Identification required or rejected.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// Identified but not granted.
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
        /// The right that was missing.
        right: Option<String>,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
        /// The address of the missing resource.
        resource: Option<String>,
    },

    /// Resource already exists.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message.
        message: String,
    },

    /// Request body too large.
    #[error("Payload too large: {message}")]
    PayloadTooLarge {
        /// Human-readable error message.
        message: String,
        /// The collection limit in bytes.
        limit: Option<usize>,
    },

    /// Method not implemented by the bound handler.
    #[error("Not implemented: {method}")]
    NotImplemented {
        /// The rejected method.
        method: String,
    },

    /// Storage failure; the transaction was rolled back.
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl AgoraError {
    /// Creates a validation error with a message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error for a missing right.
    #[must_use]
    pub fn authorization(message: impl Into<String>, right: Option<&str>) -> Self {
        Self::Authorization {
            message: message.into(),
            right: right.map(ToString::to_string),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource: None,
        }
    }

    /// Creates a not found error naming the resource.
    #[must_use]
    pub fn not_found_resource(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::NotFound {
            message: format!("'{resource}' has no value"),
            resource: Some(resource),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a payload too large error.
    #[must_use]
    pub fn payload_too_large(limit: Option<usize>) -> Self {
        Self::PayloadTooLarge {
            message: limit.map_or_else(
                || "request body exceeds the collection limit".to_string(),
                |limit| format!("request body exceeds {limit} bytes"),
            ),
            limit,
        }
    }

    /// Creates a not implemented error for a method.
    #[must_use]
    pub fn not_implemented(method: &http::Method) -> Self {
        Self::NotImplemented {
            method: method.to_string(),
        }
    }

    /// Creates a storage error with a source error.
    pub fn storage(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            Self::NotImplemented { .. } => ErrorCategory::NotImplemented,
            Self::Storage { .. } => ErrorCategory::Storage,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, exchange_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.client_message(),
                category: self.category(),
                details: self.error_details(),
            },
            exchange_id: exchange_id.map(ToString::to_string),
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_REQUIRED",
            Self::Authorization { .. } => "AUTHORIZATION_DENIED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "ALREADY_EXISTS",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Server-side failures never leak their source chain to the client.
    fn client_message(&self) -> String {
        match self {
            Self::Storage { message, .. } | Self::Internal { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            Self::Authorization {
                right: Some(right), ..
            } => Some(serde_json::json!({ "right": right })),
            Self::NotFound {
                resource: Some(resource),
                ..
            } => Some(serde_json::json!({ "resource": resource })),
            Self::PayloadTooLarge {
                limit: Some(limit), ..
            } => Some(serde_json::json!({ "limit": limit })),
            Self::NotImplemented { method } => Some(serde_json::json!({ "method": method })),
            _ => None,
        }
    }
}

impl From<SchemaError> for AgoraError {
    fn from(err: SchemaError) -> Self {
        Self::Validation {
            message: err.to_string(),
            field: Some(err.field),
        }
    }
}

impl From<serde_json::Error> for AgoraError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("undecodable JSON: {err}"))
    }
}

/// Serializable error envelope for responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The exchange ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_becomes_validation_with_field() {
        let err: AgoraError = SchemaError::new("$.age", "expected integer, got string").into();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let envelope = err.to_envelope(Some("ex-1"));
        assert_eq!(envelope.error.details.unwrap()["field"], "$.age");
        assert_eq!(envelope.exchange_id.as_deref(), Some("ex-1"));
    }

    #[test]
    fn test_not_implemented_carries_method() {
        let err = AgoraError::not_implemented(&http::Method::DELETE);
        assert_eq!(err.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(err.to_envelope(None).error.details.unwrap()["method"], "DELETE");
    }

    #[test]
    fn test_storage_error_hides_source() {
        let err = AgoraError::storage("write failed", anyhow::anyhow!("disk I/O error"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = err.to_envelope(None);
        assert_eq!(envelope.error.message, "write failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_envelope_serialization() {
        let err = AgoraError::not_found_resource("people/knows/alice");
        let json = serde_json::to_string(&err.to_envelope(Some("ex-2"))).unwrap();
        assert!(json.contains("\"code\":\"NOT_FOUND\""));
        assert!(json.contains("\"category\":\"not_found\""));
        assert!(json.contains("\"exchange_id\":\"ex-2\""));
    }

    #[test]
    fn test_all_error_categories_have_error_status_codes() {
        let categories = [
            ErrorCategory::Validation,
            ErrorCategory::Authentication,
            ErrorCategory::Authorization,
            ErrorCategory::NotFound,
            ErrorCategory::Conflict,
            ErrorCategory::PayloadTooLarge,
            ErrorCategory::NotImplemented,
            ErrorCategory::Storage,
            ErrorCategory::Internal,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error() || status.is_server_error(),
                "Category {:?} should map to error status code, got {}",
                category,
                status
            );
        }
    }
}
