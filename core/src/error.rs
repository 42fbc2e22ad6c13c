//! Error types for the request controller.
//!
//! # Design
//! Only `Serialization` ever reaches a caller as an `Err`: it is raised while
//! deriving the request identity, before any fetch cycle exists. Every other
//! variant is produced inside a fetch cycle, logged, and collapsed into the
//! idle state. Payloads are plain strings so the error is `Clone` and can be
//! carried across the FFI boundary without lifetime concerns.

use thiserror::Error;

/// Errors produced while deriving or running a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// A fetch cycle started without an operation to send.
    #[error("no operation to execute")]
    MissingOperation,

    /// The transport collaborator failed before yielding a response.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body was not a JSON `{data, errors}` envelope.
    #[error("response decoding failed: {0}")]
    Decode(String),

    /// The request variables could not be serialized to JSON.
    #[error("variable serialization failed: {0}")]
    Serialization(String),
}

impl ClientError {
    /// Shorthand for transport implementations.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ClientError::Transport(err.to_string())
    }
}
