//! Error types for the QQ Music bridge.

use std::fmt;

use thiserror::Error;

use crate::endpoint::Operation;

/// Errors surfaced by the relay, the login state machine and the resolvers.
#[derive(Debug, Clone, Error)]
pub enum QqMusicError {
    /// Transport failure on a single request (connection refused/reset,
    /// timeout, HTTP 5xx).
    #[error("network error: {0}")]
    Network(String),

    /// Every endpoint configured for an operation was tried and none produced
    /// a usable response. Holds the last failure seen on each endpoint.
    #[error("all endpoints failed for {operation}: {}", FailureList(.failures))]
    AllEndpointsFailed {
        operation: Operation,
        failures: Vec<EndpointFailure>,
    },

    /// The upstream answered with a well-formed payload carrying a non-success
    /// `code`.
    ///
    /// Common codes:
    /// - `1000`  : login required / credential rejected
    /// - `104003`: no copyright for this item
    /// - `-1`    : generic failure
    #[error("upstream error (code {code}): {message}")]
    Upstream {
        /// Upstream status code (not the HTTP status).
        code: i64,
        /// Human-readable message, if the upstream sent one.
        message: String,
    },

    /// Malformed payload from an endpoint that was expected to succeed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The stored credential is past its expiry, or the upstream rejected it.
    #[error("session expired")]
    SessionExpired,

    /// Poll with a login key that is unknown or has been superseded.
    #[error("unknown or stale login key: {0}")]
    InvalidKey(String),

    /// Restricted content requested without a valid credential.
    #[error("authentication required")]
    AuthRequired,

    /// Caller-supplied input was rejected before any upstream call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// The last error recorded for one endpoint of a fallback chain.
#[derive(Debug, Clone)]
pub struct EndpointFailure {
    /// Endpoint URL (template form, before parameter substitution).
    pub url: String,
    /// Whether the failure was a transport failure or an unusable payload.
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Unusable,
}

/// Coarse classification shared with the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Upstream,
    Parse,
    SessionExpired,
    InvalidKey,
    AuthRequired,
    InvalidArgument,
}

impl QqMusicError {
    /// Classify this error into the bridge's error taxonomy.
    ///
    /// Exhaustion counts as a parse failure only when every endpoint returned
    /// an unusable payload; any transport failure makes it a network error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::AllEndpointsFailed { failures, .. } => {
                if !failures.is_empty()
                    && failures.iter().all(|f| f.kind == FailureKind::Unusable)
                {
                    ErrorKind::Parse
                } else {
                    ErrorKind::Network
                }
            }
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Parse(_) => ErrorKind::Parse,
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::AuthRequired => ErrorKind::AuthRequired,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }
}

impl From<reqwest::Error> for QqMusicError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<serde_json::Error> for QqMusicError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

struct FailureList<'a>(&'a [EndpointFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no endpoints configured");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "[{}] {}", failure.url, failure.message)?;
        }
        Ok(())
    }
}

/// Convenience alias for `Result<T, QqMusicError>`.
pub type Result<T> = std::result::Result<T, QqMusicError>;
