//! Error handling for the orchestration layer.
//!
//! Two distinct error surfaces exist, and callers should not confuse them:
//!
//! - [`Error`] is this crate's *internal* error type: configuration problems,
//!   storage-engine failures, serialization failures. It's what `Result<_, Error>`
//!   returns from `Manager`, `CacheStore`, and `PromiseStore` constructors and
//!   maintenance operations.
//! - [`ApiError`] is the error payload a business's [`crate::parser::Parser`] builds
//!   and that rides inside [`crate::response::Response::error`]. It is never
//!   constructed from an `Error`; the two don't convert into each other.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error as ThisError;

/// Internal error type: configuration, storage, and serialization failures
/// raised directly by the framework rather than by a business parser.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
        context: Option<ErrorContext>,
    },
}

/// Categories of internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A business identifier was not found in the registry.
    UnknownBusiness,
    /// A value that the framework needed was malformed or missing.
    Configuration,
    /// A request body could not be persisted (e.g. a streaming body on a promise-enabled request).
    NotSerializable,
    /// The cache or promise store was used before `init()` completed.
    NotInitialized,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownBusiness => "UnknownBusiness",
            Self::Configuration => "Configuration",
            Self::NotSerializable => "NotSerializable",
            Self::NotInitialized => "NotInitialized",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured context attached to an [`Error::Internal`].
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub details: Option<serde_json::Value>,
    pub suggestion: Option<Cow<'static, str>>,
}

impl ErrorContext {
    #[must_use]
    pub fn with_detail(key: &str, value: impl serde::Serialize) -> Self {
        Self {
            details: Some(serde_json::json!({ key: value })),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn and_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(Cow::Owned(suggestion.into()));
        self
    }
}

impl Error {
    pub fn unknown_business(business_identifier: impl Into<String>) -> Self {
        let id = business_identifier.into();
        Self::Internal {
            kind: ErrorKind::UnknownBusiness,
            message: Cow::Owned(format!("unknown business identifier '{id}'")),
            context: Some(
                ErrorContext::with_detail("business_identifier", &id).and_suggestion(
                    "register the business with Manager::add_business before sending requests for it",
                ),
            ),
        }
    }

    pub fn not_serializable(reason: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::NotSerializable,
            message: Cow::Owned(reason.into()),
            context: Some(ErrorContext::default().and_suggestion(
                "promise.enable requires data to be a JSON mapping or a string body",
            )),
        }
    }

    pub fn not_initialized(store: &'static str) -> Self {
        Self::Internal {
            kind: ErrorKind::NotInitialized,
            message: Cow::Owned(format!("{store} used before init() completed")),
            context: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Configuration,
            message: Cow::Owned(message.into()),
            context: None,
        }
    }
}

/// The reserved error code for [`ApiError`] instances raised when a `businessIdentifier`
/// resolves to no registered business (§4.5 step A).
pub const CONFIGURATION_ERROR_CODE: i64 = -999_999;

/// Error payload carried by a [`crate::response::Response`].
///
/// Distinguishes the raw, origin-side message from a message suitable for
/// display to an end user; `data` carries any structured error body the
/// server returned, and `origin_error` is an opaque debug rendering of
/// whatever the transport/parser raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub origin_message: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_error: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(code: i64, origin_message: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            origin_message: origin_message.into(),
            message: message.into(),
            data: None,
            origin_error: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_origin_error(mut self, origin_error: impl Into<String>) -> Self {
        self.origin_error = Some(origin_error.into());
        self
    }

    /// Builds the `ConfigurationError` (§7) raised when `businessIdentifier` is unknown.
    #[must_use]
    pub fn configuration(business_identifier: &str) -> Self {
        Self::new(
            CONFIGURATION_ERROR_CODE,
            format!("unknown business identifier '{business_identifier}'"),
            "This request's business line is not registered.",
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_business_carries_identifier_in_context() {
        let err = Error::unknown_business("billing");
        match err {
            Error::Internal { kind, context, .. } => {
                assert_eq!(kind, ErrorKind::UnknownBusiness);
                assert!(context.is_some());
            }
            _ => panic!("expected Internal variant"),
        }
    }

    #[test]
    fn configuration_error_uses_reserved_code() {
        let err = ApiError::configuration("billing");
        assert_eq!(err.code, CONFIGURATION_ERROR_CODE);
    }
}
