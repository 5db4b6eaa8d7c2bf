//! Per-session configuration and the end-of-session report.
//!
//! Everything a connection needs is carried here explicitly and passed
//! in at construction: address lists, shared secret, the outbound
//! queue. No process-wide mutable state.

use std::path::PathBuf;

use crate::timeouts::TimeoutPolicy;
use crate::transfer::{FileOutcome, OutboundFile, ReceivedFile};

/// Default data frame payload size (16 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

/// Which side of the session this engine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The connecting side.
    Originator,
    /// The accepting side.
    Answering,
}

/// Configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Originator or Answering (connecting vs accepting side).
    pub role: Role,
    /// System name sent in the greeting.
    pub system_name: String,
    /// Local FTN address list, sent as M_ADR.
    pub addresses: Vec<String>,
    /// Addresses the peer is expected to present. Empty accepts any
    /// non-empty peer list.
    pub expected_addresses: Vec<String>,
    /// Shared secret. Originator sends it; Answering verifies against
    /// it. `None` sends/accepts the `-` placeholder.
    pub password: Option<String>,
    /// Ordered outbound queue.
    pub files: Vec<OutboundFile>,
    /// Delivery directory for fully received files. Partials live in
    /// a `partial` subdirectory.
    pub inbound_dir: PathBuf,
    /// Data frame payload size, clamped to the wire maximum.
    pub block_size: usize,
    /// Per-operation deadlines.
    pub timeouts: TimeoutPolicy,
}

impl SessionConfig {
    /// Minimal configuration; adjust with the `with_*` methods.
    pub fn new<P: Into<PathBuf>>(role: Role, system_name: &str, inbound_dir: P) -> Self {
        Self {
            role,
            system_name: system_name.to_string(),
            addresses: Vec::new(),
            expected_addresses: Vec::new(),
            password: None,
            files: Vec::new(),
            inbound_dir: inbound_dir.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            timeouts: TimeoutPolicy::default(),
        }
    }

    /// Set the local address list.
    pub fn with_addresses(mut self, addresses: Vec<String>) -> Self {
        self.addresses = addresses;
        self
    }

    /// Set the addresses the peer must present.
    pub fn with_expected_addresses(mut self, addresses: Vec<String>) -> Self {
        self.expected_addresses = addresses;
        self
    }

    /// Set the session password.
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Set the outbound file queue.
    pub fn with_files(mut self, files: Vec<OutboundFile>) -> Self {
        self.files = files;
        self
    }

    /// Set the data frame payload size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the timeout policy.
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// What a finished session accomplished.
#[derive(Debug)]
pub struct SessionSummary {
    /// Peer's address list as presented during the handshake.
    pub remote_addresses: Vec<String>,
    /// Per-file outcome of the outbound queue, in order.
    pub outcomes: Vec<(String, FileOutcome)>,
    /// Fully received and delivered inbound files.
    pub received: Vec<ReceivedFile>,
    /// Data payload bytes sent.
    pub bytes_sent: u64,
    /// Data payload bytes received.
    pub bytes_received: u64,
}
