//! Frame buffer for accumulating partial reads.
//!
//! The transport may hand back any byte slicing of the stream; this
//! buffer owns reassembly. Uses `bytes::BytesMut` for zero-copy buffer
//! management and a two-state machine for fragmented frames:
//! - `WaitingForHeader`: need at least 2 bytes
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! # Example
//!
//! ```
//! use binkwire::protocol::{Command, Frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = Frame::Command(Command::EndOfBatch).encode().unwrap();
//!
//! let frames = buffer.push(&bytes).unwrap();
//! assert_eq!(frames, vec![Frame::Command(Command::EndOfBatch)]);
//! ```

use bytes::BytesMut;

use super::command::Command;
use super::wire_format::{Header, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete header (need 2 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for the declared payload bytes.
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Never yields a frame until exactly the declared payload bytes are
/// present; partial bytes stay buffered for the next push.
pub struct FrameBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl FrameBuffer {
    /// Create a new frame buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns every frame completed by this push (may be empty while
    /// still waiting for bytes).
    ///
    /// # Errors
    ///
    /// `MalformedCommand` for a zero-length command frame, an unknown
    /// command identifier, or a payload grammar violation. Framing
    /// cannot be resynchronized afterwards, so the caller must treat
    /// this as fatal.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                let Some(header) = Header::decode(&self.buffer) else {
                    return Ok(None);
                };
                header.validate()?;

                let _ = self.buffer.split_to(HEADER_SIZE);
                self.state = State::WaitingForPayload { header };

                // Payload may already be buffered.
                self.try_extract_one()
            }

            State::WaitingForPayload { header } => {
                let declared = header.payload_length as usize;
                if self.buffer.len() < declared {
                    return Ok(None);
                }

                let is_command = header.is_command;
                let payload = self.buffer.split_to(declared).freeze();
                self.state = State::WaitingForHeader;

                let frame = if is_command {
                    Frame::Command(Command::parse(payload[0], &payload[1..])?)
                } else {
                    Frame::Data(payload)
                };
                Ok(Some(frame))
            }
        }
    }

    /// Get the number of buffered bytes not yet part of a frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
