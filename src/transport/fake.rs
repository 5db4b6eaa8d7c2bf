//! Scriptable transport double for protocol tests.
//!
//! Replaces the socket with two in-memory queues, one per direction,
//! so test code can script exactly which frames the peer appears to
//! send, in order, and inspect everything the engine wrote. No live
//! socket, no timing flakiness.
//!
//! # Example
//!
//! ```
//! use binkwire::protocol::Command;
//! use binkwire::transport::FakeConnection;
//!
//! let conn = FakeConnection::new();
//! conn.push_command(&Command::EndOfBatch).unwrap();
//! // hand a clone to the session; `conn` keeps scripting access
//! let peer = conn.clone();
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::Notify;

use super::Connection;
use crate::error::{BinkError, Result};
use crate::protocol::{encode_command, encode_data, Command, Frame, FrameBuffer};

#[derive(Default)]
struct Shared {
    /// Scripted peer-to-engine traffic, chunk per push.
    recv: VecDeque<Bytes>,
    /// Everything the engine sent, raw bytes.
    sent: BytesMut,
    /// Local side closed.
    closed: bool,
    /// Scripted peer close: receive fails once the queue drains.
    remote_closed: bool,
}

/// Queue-backed [`Connection`] for deterministic tests.
///
/// Clones share the same queues: hand one clone to the session and
/// keep another for scripting and inspection.
#[derive(Clone, Default)]
pub struct FakeConnection {
    shared: Arc<Mutex<Shared>>,
    notify: Arc<Notify>,
}

impl FakeConnection {
    /// Create an open connection with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a command frame from the peer.
    pub fn push_command(&self, command: &Command) -> Result<()> {
        self.push_raw(&encode_command(command)?);
        Ok(())
    }

    /// Script a data frame from the peer.
    pub fn push_data(&self, payload: &[u8]) -> Result<()> {
        self.push_raw(&encode_data(payload)?);
        Ok(())
    }

    /// Script arbitrary bytes from the peer. Each call becomes one
    /// receive chunk, so tests can split frames across reads.
    pub fn push_raw(&self, bytes: &[u8]) {
        let mut shared = self.shared.lock().unwrap();
        shared.recv.push_back(Bytes::copy_from_slice(bytes));
        self.notify.notify_one();
    }

    /// Script the peer closing its end: receives fail with
    /// `TransportClosed` once the scripted queue is drained.
    pub fn close_remote(&self) {
        self.shared.lock().unwrap().remote_closed = true;
        self.notify.notify_one();
    }

    /// Check whether the engine has written anything not yet taken.
    pub fn has_sent(&self) -> bool {
        !self.shared.lock().unwrap().sent.is_empty()
    }

    /// Drain and parse everything the engine sent so far.
    pub fn sent_frames(&self) -> Result<Vec<Frame>> {
        let bytes = {
            let mut shared = self.shared.lock().unwrap();
            shared.sent.split().freeze()
        };
        let mut buffer = FrameBuffer::new();
        buffer.push(&bytes)
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn send(&mut self, data: &[u8], _deadline: Duration) -> Result<usize> {
        let mut shared = self.shared.lock().unwrap();
        if shared.closed {
            return Err(BinkError::TransportClosed);
        }
        shared.sent.extend_from_slice(data);
        Ok(data.len())
    }

    async fn receive(&mut self, max_len: usize, deadline: Duration) -> Result<Bytes> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                {
                    let mut shared = self.shared.lock().unwrap();
                    if shared.closed {
                        return Err(BinkError::TransportClosed);
                    }
                    if let Some(mut chunk) = shared.recv.pop_front() {
                        if chunk.len() > max_len {
                            let rest = chunk.split_off(max_len);
                            shared.recv.push_front(rest);
                        }
                        return Ok(chunk);
                    }
                    if shared.remote_closed {
                        return Err(BinkError::TransportClosed);
                    }
                }
                notified.await;
            }
        };
        match tokio::time::timeout(deadline, wait).await {
            Ok(result) => result,
            Err(_) => Err(BinkError::Timeout("receive")),
        }
    }

    async fn close(&mut self) -> bool {
        let mut shared = self.shared.lock().unwrap();
        let was_open = !shared.closed;
        shared.closed = true;
        self.notify.notify_one();
        was_open
    }

    fn is_open(&self) -> bool {
        !self.shared.lock().unwrap().closed
    }
}
