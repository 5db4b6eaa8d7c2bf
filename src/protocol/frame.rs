//! Frame type with whole-frame encode/decode.
//!
//! A frame is one header-delimited unit of the wire protocol: either a
//! parsed control command or raw data bytes belonging to the file
//! currently in transfer. Uses `bytes::Bytes` for zero-copy payload
//! sharing.
//!
//! # Example
//!
//! ```
//! use binkwire::protocol::{Command, Frame};
//!
//! let frame = Frame::Command(Command::EndOfBatch);
//! let bytes = frame.encode().unwrap();
//! let (decoded, consumed) = Frame::decode(&bytes).unwrap();
//! assert_eq!(decoded, frame);
//! assert_eq!(consumed, bytes.len());
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::command::Command;
use super::wire_format::{Header, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{BinkError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Control command with its typed payload.
    Command(Command),
    /// Raw payload bytes for the file currently being transferred.
    Data(Bytes),
}

impl Frame {
    /// Check if this is a command frame.
    #[inline]
    pub fn is_command(&self) -> bool {
        matches!(self, Frame::Command(_))
    }

    /// Encode the frame as header + payload.
    ///
    /// For command frames the declared length includes the command
    /// identifier byte.
    ///
    /// # Errors
    ///
    /// `FrameTooLarge` if the payload would exceed 32767 bytes.
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Frame::Command(command) => {
                let payload = command.render_payload();
                let declared = payload.len() + 1;
                if declared > MAX_PAYLOAD {
                    return Err(BinkError::FrameTooLarge(declared));
                }
                let header = Header::new(true, declared as u16);
                let mut buf = BytesMut::with_capacity(HEADER_SIZE + declared);
                buf.put_slice(&header.encode());
                buf.put_u8(command.id().as_u8());
                buf.put_slice(payload.as_bytes());
                Ok(buf.freeze())
            }
            Frame::Data(payload) => {
                if payload.len() > MAX_PAYLOAD {
                    return Err(BinkError::FrameTooLarge(payload.len()));
                }
                let header = Header::new(false, payload.len() as u16);
                let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
                buf.put_slice(&header.encode());
                buf.put_slice(payload);
                Ok(buf.freeze())
            }
        }
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns the frame and the number of bytes consumed. On error
    /// nothing is consumed; a `Truncated` error in particular means the
    /// caller may retry once more bytes have arrived.
    ///
    /// # Errors
    ///
    /// - `Truncated`: fewer bytes available than the header declares.
    /// - `MalformedCommand`: zero-length command frame, unknown
    ///   identifier, or payload grammar violation.
    pub fn decode(buf: &[u8]) -> Result<(Frame, usize)> {
        let header = Header::decode(buf).ok_or(BinkError::Truncated {
            expected: HEADER_SIZE,
            available: buf.len(),
        })?;
        header.validate()?;

        let declared = header.payload_length as usize;
        let available = buf.len() - HEADER_SIZE;
        if available < declared {
            return Err(BinkError::Truncated {
                expected: declared,
                available,
            });
        }

        let payload = &buf[HEADER_SIZE..HEADER_SIZE + declared];
        let frame = if header.is_command {
            Frame::Command(Command::parse(payload[0], &payload[1..])?)
        } else {
            Frame::Data(Bytes::copy_from_slice(payload))
        };
        Ok((frame, HEADER_SIZE + declared))
    }
}

/// Encode a command as a complete frame (convenience).
#[inline]
pub fn encode_command(command: &Command) -> Result<Bytes> {
    Frame::Command(command.clone()).encode()
}

/// Encode raw file bytes as a complete data frame (convenience).
#[inline]
pub fn encode_data(payload: &[u8]) -> Result<Bytes> {
    Frame::Data(Bytes::copy_from_slice(payload)).encode()
}
