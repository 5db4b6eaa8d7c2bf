//! Per-operation deadlines.
//!
//! Every transport call carries a deadline. One fatal timeout ends the
//! session; retry and reconnect policy belong to the caller, not this
//! engine. While outbound data frames are pending the session probes
//! the receive side with a zero-duration deadline instead, so these
//! values only govern genuine waits.

use std::time::Duration;

/// Deadlines applied by the session to transport operations.
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    /// Deadline for control commands and idle handshake waits.
    pub command: Duration,
    /// Deadline while an inbound file is mid-transfer. Bulk data gets a
    /// proportionally longer allowance than control traffic.
    pub data: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(30),
            data: Duration::from_secs(120),
        }
    }
}
