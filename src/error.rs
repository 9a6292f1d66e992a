//! Error taxonomy for building and dispatching.
//!
//! # Responsibilities
//! - `HttpError`: the structured error the engine turns into a response
//! - `DispatchError`: everything a middleware or action can fail with
//! - `BuildError`: misuse of the declarative build DSL
//!
//! # Design Decisions
//! - Only `HttpError` is formatted by the engine; every other failure is
//!   returned to whoever called `RestfulApi::handle`
//! - Build errors are returned, never panicked, so a route table can be
//!   assembled from configuration without aborting the process

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error carrying an HTTP status and a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{status} {message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// Wire body: `{"error":{"status":..,"message":..}}`, in that order.
    pub fn body(&self) -> ErrorBody<'_> {
        ErrorBody { error: self }
    }
}

/// Serialized envelope of an [`HttpError`].
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a HttpError,
}

/// Failure raised by a middleware or an action.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Recognized by the engine and written to the response.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The action's return value could not be encoded as JSON.
    #[error("failed to encode action result: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Anything else. Propagates out of `handle`.
    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    /// Wrap an arbitrary error as an unrecognized handler failure.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        DispatchError::Handler(err.into())
    }

    /// The structured error, if this is one.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            DispatchError::Http(e) => Some(e),
            _ => None,
        }
    }
}

/// Misuse of the build DSL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("an action is already defined for this context")]
    DuplicateAction,

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("a top-level build is already running on this thread")]
    BuilderActive,
}
