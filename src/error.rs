//! Error types for the outbound WebSocket write path.
//!
//! Every failure a caller can observe while opening a message writer, writing
//! data or control frames, or closing a writer is one of these variants.

use thiserror::Error;

use crate::protocol::OpCode;

/// Result type alias for WebSocket write operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which step of a physical frame write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WritePhase {
    /// Serializing the frame header into the sink.
    Header,
    /// Copying (and masking) the payload into the sink.
    Payload,
    /// Flushing the sink to the transport after a final frame.
    Flush,
}

impl std::fmt::Display for WritePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WritePhase::Header => write!(f, "frame header"),
            WritePhase::Payload => write!(f, "frame payload"),
            WritePhase::Flush => write!(f, "flush"),
        }
    }
}

/// Errors that can occur while writing to a WebSocket connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// `write` or `close` was called on a writer that was already closed.
    #[error("cannot use closed writer")]
    ClosedWriter,

    /// The caller's context was cancelled.
    #[error("context canceled")]
    Cancelled,

    /// The caller's context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The connection was torn down; carries the recorded terminal reason.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The entropy source failed while generating a masking key.
    #[error("failed to generate masking key: {0}")]
    RandomSource(String),

    /// The underlying transport failed.
    #[error("failed to write {phase}: {message}")]
    Transport {
        /// Step of the frame write that failed.
        phase: WritePhase,
        /// Transport error description.
        message: String,
    },

    /// The deflate stream reported an error.
    #[error("compression failed: {0}")]
    Compression(String),

    /// A data opcode was passed where a control opcode is required.
    #[error("not a control opcode: {0}")]
    NotControlFrame(OpCode),

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Invalid extension configuration.
    #[error("Invalid extension: {0}")]
    InvalidExtension(String),
}

impl Error {
    pub(crate) fn transport(phase: WritePhase, err: std::io::Error) -> Self {
        Error::Transport {
            phase,
            message: err.to_string(),
        }
    }

    /// Returns `true` if the error came from the caller's own context being
    /// cancelled or timing out, as opposed to connection teardown.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// Returns `true` if the connection's close signal caused the error.
    #[must_use]
    pub const fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed(_))
    }
}
