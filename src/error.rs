use thiserror::Error;

use crate::request::InvalidReferenceError;
use crate::response::CallError;
use crate::session::DiscoveryError;

/// Failures at the transport boundary: the network exchange itself, or a
/// body that is not the JSON the protocol promises. Retry policy belongs to
/// the caller; nothing here is retried internally.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("server returned invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error type for client operations
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    InvalidReference(#[from] InvalidReferenceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A single method call failed or its response was missing; sibling
    /// calls in the same transaction are unaffected.
    #[error("method call failed: {0}")]
    Call(#[from] CallError),

    #[error("no account available: {0}")]
    NoAccount(&'static str),

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(&'static str),
}
