//! Bolt protocol error types.

use std::io;

use thiserror::Error;

use super::packstream::PackStreamError;
use crate::driver::state::SessionState;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Bolt protocol errors.
#[derive(Error, Debug)]
pub enum BoltError {
    /// I/O error, including request timeouts
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Handshake error
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Chunk framing error
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// PackStream or message decoding error
    #[error("Decode error: {0}")]
    Decode(#[from] PackStreamError),

    /// Request not legal in the current state; nothing was sent
    #[error("Protocol violation: {request} not allowed in state {state}")]
    ProtocolViolation {
        state: SessionState,
        request: &'static str,
    },

    /// Server answered with FAILURE
    #[error("Server error: {code} - {message}")]
    Server { code: String, message: String },

    /// Server answered with IGNORED
    #[error("Request ignored by server")]
    Ignored,

    /// Response that makes no sense for the pending request
    #[error("Unexpected {response} in response to {request}")]
    UnexpectedResponse {
        request: &'static str,
        response: &'static str,
    },

    /// Session is defunct and cannot be used
    #[error("Session is defunct")]
    Defunct,
}

impl BoltError {
    /// Whether this error retires the session.
    ///
    /// Transport, framing, handshake and unknown-marker errors leave the
    /// stream unusable. Everything else is recoverable, either without any
    /// action or through ACK_FAILURE / RESET.
    pub fn is_fatal(&self) -> bool {
        match self {
            BoltError::Io(_)
            | BoltError::Handshake(_)
            | BoltError::Framing(_)
            | BoltError::UnexpectedResponse { .. }
            | BoltError::Defunct => true,
            BoltError::Decode(e) => e.is_fatal(),
            BoltError::ProtocolViolation { .. } | BoltError::Server { .. } | BoltError::Ignored => {
                false
            }
        }
    }

    pub(crate) fn protocol_violation(state: SessionState, request: &'static str) -> Self {
        BoltError::ProtocolViolation { state, request }
    }
}

/// Handshake-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Server replied with version 0
    #[error("No compatible protocol version found")]
    NoCompatibleVersion,

    /// Server picked a version this client never proposed
    #[error("Unsupported protocol version: 0x{0:08X}")]
    UnsupportedVersion(u32),

    /// Connection closed during handshake
    #[error("Connection closed during handshake")]
    ConnectionClosed,
}

/// Chunk framing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// End marker with no data chunk before it
    #[error("Empty message: end marker without data")]
    EmptyMessage,

    /// Message exceeds the configured limit
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Stream ended in the middle of a message
    #[error("Connection closed mid-message")]
    ConnectionClosed,
}
