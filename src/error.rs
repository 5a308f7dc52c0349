//! # Error Types
//!
//! Error handling for the session core.
//!
//! This module defines every error the crate can produce, from malformed
//! bytes on the wire to misuse of the session API.
//!
//! ## Error Categories
//! - **Framing Errors**: corrupt length prefixes, unknown type tags, truncated bodies
//! - **State Machine Errors**: valid frames that arrive in the wrong session state
//! - **Usage Errors**: missing mandatory callbacks, double start, calls after teardown
//! - **Transport Errors**: the write callback reported a failure, socket I/O
//! - **Configuration Errors**: unreadable or invalid configuration
//!
//! Framing, state machine and transport-write errors never reach the caller of
//! [`Session::receive`](crate::session::Session::receive) or
//! [`Session::send`](crate::session::Session::send). They stop the session and are
//! reported through the state-change callback; the cause stays available through
//! [`Session::last_error`](crate::session::Session::last_error).
//!
//! ## Example Usage
//! ```rust
//! use meanwhile::error::{ProtocolError, Result};
//! use meanwhile::session::{Session, SessionHandler};
//!
//! fn build() -> Result<Session> {
//!     let handler = SessionHandler::new().on_io_write(|_bytes| Ok(()));
//!     Session::new(handler)
//! }
//!
//! assert!(matches!(build(), Err(ProtocolError::InvalidHandler("io_close"))));
//! ```

use crate::protocol::message::MessageType;
use crate::session::SessionState;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_LENGTH_RESERVED_BIT: &str = "Frame length has the reserved high bit set";
    pub const ERR_LENGTH_OVER_LIMIT: &str = "Frame length exceeds the frame size limit";
    pub const ERR_TRUNCATED_HEADER: &str = "Message shorter than its header";
    pub const ERR_TRUNCATED_BODY: &str = "Message body truncated";
    pub const ERR_INVALID_UTF8: &str = "String field is not valid UTF-8";

    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Transport errors
    pub const ERR_WRITER_GONE: &str = "Socket writer task has exited";
    pub const ERR_CONNECT_TIMEOUT: &str = "Timed out connecting to server";

    /// Session usage errors
    pub const ERR_NOT_REDIRECTED: &str = "Forced login is only valid after a login redirect";
    pub const ERR_NOT_STARTED: &str = "Session has not completed login";
    pub const ERR_CREDENTIALS_LOCKED: &str = "Credentials must be set before the session starts";
}

// ProtocolError is the primary error type for all session operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed bytes: bad length prefix, unknown type tag, truncated body.
    #[error("Frame corrupt: {0}")]
    FrameCorrupt(String),

    #[error("Oversized frame: {0} bytes")]
    OversizedFrame(usize),

    /// A well-formed message that the current session state does not accept.
    #[error("Unexpected {message:?} frame in state {state:?}")]
    UnexpectedFrame {
        state: SessionState,
        message: MessageType,
    },

    /// A mandatory callback (`io_write` or `io_close`) was not supplied.
    #[error("Missing mandatory handler: {0}")]
    InvalidHandler(&'static str),

    #[error("Session already started")]
    AlreadyStarted,

    #[error("Session closed")]
    SessionClosed,

    #[error("Transport write failed: {0}")]
    TransportWriteFailed(String),

    #[error("Operation not valid in state {state:?}: {reason}")]
    InvalidState {
        state: SessionState,
        reason: &'static str,
    },

    #[error("No handler registered for {0}")]
    UnhandledMessage(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error tears the connection down when raised inside the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::FrameCorrupt(_)
                | ProtocolError::OversizedFrame(_)
                | ProtocolError::UnexpectedFrame { .. }
                | ProtocolError::TransportWriteFailed(_)
                | ProtocolError::Io(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ProtocolError::FrameCorrupt("x".into()).is_fatal());
        assert!(ProtocolError::UnexpectedFrame {
            state: SessionState::Login,
            message: MessageType::HandshakeAck,
        }
        .is_fatal());
        assert!(ProtocolError::TransportWriteFailed("broken pipe".into()).is_fatal());
        assert!(!ProtocolError::AlreadyStarted.is_fatal());
        assert!(!ProtocolError::SessionClosed.is_fatal());
        assert!(!ProtocolError::UnhandledMessage("CHANNEL_SEND".into()).is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = ProtocolError::UnexpectedFrame {
            state: SessionState::Handshake,
            message: MessageType::LoginAck,
        };
        assert_eq!(err.to_string(), "Unexpected LoginAck frame in state Handshake");
        assert_eq!(
            ProtocolError::InvalidHandler("io_write").to_string(),
            "Missing mandatory handler: io_write"
        );
    }
}
