//! Transport abstraction over a duplex byte stream.
//!
//! The session never touches a socket directly; it talks to the
//! [`Connection`] trait. Two implementations:
//! - [`TcpConnection`]: production, backed by `tokio::net::TcpStream`
//! - [`FakeConnection`]: scriptable queue-backed test double for
//!   deterministic protocol tests without a live socket

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

mod fake;
mod socket;

pub use fake::FakeConnection;
pub use socket::TcpConnection;

/// A connected duplex byte stream with per-call deadlines.
///
/// `receive` blocks until at least one byte is available or the
/// deadline elapses (`Timeout`). Short reads are legal: reassembling
/// bytes into whole frames is the caller's job, via
/// [`FrameBuffer`](crate::protocol::FrameBuffer). A deadline expiry is
/// the only cancellation mechanism; there is no separate token.
#[async_trait]
pub trait Connection: Send {
    /// Write all of `data` within `deadline`. Returns bytes written.
    ///
    /// # Errors
    ///
    /// `Timeout` if the deadline elapses, `TransportClosed` if the
    /// stream is no longer writable.
    async fn send(&mut self, data: &[u8], deadline: Duration) -> Result<usize>;

    /// Read up to `max_len` bytes, waiting at most `deadline`.
    ///
    /// # Errors
    ///
    /// `Timeout` if no byte arrives in time, `TransportClosed` once the
    /// peer has closed and nothing is buffered.
    async fn receive(&mut self, max_len: usize, deadline: Duration) -> Result<Bytes>;

    /// Close the stream. Returns `true` if it was open.
    async fn close(&mut self) -> bool;

    /// Check whether the local side still considers the stream open.
    fn is_open(&self) -> bool;
}
