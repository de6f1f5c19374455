//! Error type shared by every generated client.
//!
//! Generated code never invents its own error enum; operations, pagers and
//! pollers all return [`RuntimeError`] so callers can match on a single type.
//!
//! # Examples
//!
//! ```
//! use clientgen_runtime::error::{Result, RuntimeError};
//!
//! fn pinned_too_old() -> Result<()> {
//!     Err(RuntimeError::VersionMismatch {
//!         operation: "widgets.analyze".to_string(),
//!         pinned: "2022-12-01".to_string(),
//!         reason: "added in 2024-06-01".to_string(),
//!     })
//! }
//!
//! assert!(pinned_too_old().is_err());
//! ```

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Result type for generated client operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors surfaced by generated clients
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The operation (or one of its parameters) does not exist at the pinned version
    #[error("'{operation}' is not available in service version {pinned}: {reason}")]
    VersionMismatch {
        operation: String,
        pinned: String,
        reason: String,
    },

    /// A version token that the client does not know about
    #[error("unknown service version '{0}'")]
    UnknownVersion(String),

    /// The service answered with a status no declared response covers
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The service answered with a declared error response; `response` is
    /// the status key of the declaration that decoded the body
    #[error("service error {status} ({response}): {body}")]
    Service {
        status: u16,
        response: String,
        body: serde_json::Value,
    },

    /// A long-running operation reached a terminal failure state
    #[error("long-running operation ended with status '{last_status}'")]
    OperationFailed { last_status: String },

    /// A poll request failed; carries the last status observed before the failure
    #[error("polling failed after status '{last_status}': {source}")]
    Polling {
        last_status: String,
        #[source]
        source: Box<RuntimeError>,
    },

    /// The poller gave up after the configured number of attempts
    #[error("gave up after {polls} polls, last status '{last_status}'")]
    PollLimit { polls: u32, last_status: String },

    /// Failure reported by the transport
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A wire encoding could not be applied
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Attempt to store a declared property in an additional-properties map
    #[error("'{0}' is a declared property and cannot be stored as an additional property")]
    KnownProperty(String),

    /// A status pattern that is neither a code, a class, a range nor `default`
    #[error("invalid status pattern '{0}'")]
    StatusPattern(String),

    /// A request could not be assembled
    #[error("invalid request: {0}")]
    Request(String),

    /// A value expected at a JSON path was absent
    #[error("missing value at '{0}'")]
    Missing(String),
}

impl RuntimeError {
    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new request error
    pub fn request<S: Into<String>>(msg: S) -> Self {
        Self::Request(msg.into())
    }

    /// Body of a declared error response decoded as `T`
    pub fn body_as<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            Self::Service { body, .. } => serde_json::from_value(body.clone()).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_body_decodes_on_demand() {
        let error = RuntimeError::Service {
            status: 404,
            response: "404".to_string(),
            body: json!({"code": "NotFound"}),
        };
        let body: Option<JsonMap> = error.body_as();
        assert_eq!(body.and_then(|b| b.get("code").cloned()), Some(json!("NotFound")));
        assert!(RuntimeError::transport("down").body_as::<JsonMap>().is_none());
    }

    type JsonMap = serde_json::Map<String, serde_json::Value>;
}
