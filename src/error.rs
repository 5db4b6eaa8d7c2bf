//! Error types for binkwire.

use thiserror::Error;

/// Main error type for all binkwire operations.
#[derive(Debug, Error)]
pub enum BinkError {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame payload would exceed the 15-bit length field (32767 bytes).
    #[error("frame payload length {0} exceeds maximum 32767")]
    FrameTooLarge(usize),

    /// Header declares more payload bytes than are available.
    ///
    /// Nothing is consumed; the caller may retry decode once more
    /// bytes have arrived.
    #[error("truncated frame: {expected} bytes declared, {available} available")]
    Truncated { expected: usize, available: usize },

    /// Command frame that cannot be interpreted: zero-length payload,
    /// unknown command identifier, or a payload grammar violation.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    /// A deadline elapsed on a send or receive. Fatal in this engine;
    /// reconnect policy belongs to the caller.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// No address shared between the peer's list and the expected list.
    #[error("no shared address with peer")]
    AddressRejected,

    /// Password verification failed, or the peer rejected ours.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// A command arrived that is invalid for the current session state.
    /// Signals a peer protocol bug or incompatible version.
    #[error("unexpected command: {0}")]
    UnexpectedCommand(String),

    /// File metadata that does not fit the wire format (size or
    /// timestamp beyond 32 bits, name the grammar cannot carry).
    /// Per-file: the file is skipped, the session continues.
    #[error("unsupported file metadata: {0}")]
    UnsupportedFileMetadata(String),

    /// The peer closed the stream. Success only if both end-of-batch
    /// signals were already exchanged.
    #[error("transport closed by peer")]
    TransportClosed,

    /// The peer reported a session-level error (M_ERR).
    #[error("peer reported error: {0}")]
    Remote(String),
}

/// Result type alias using BinkError.
pub type Result<T> = std::result::Result<T, BinkError>;
