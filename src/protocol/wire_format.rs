//! Wire format encoding and decoding.
//!
//! Implements the 2-byte binkp frame header:
//! ```text
//! ┌─────────┬──────────────────────┐
//! │ bit 15  │ bits 14-0            │
//! │ command │ payload length       │
//! │ flag    │ 0-32767              │
//! └─────────┴──────────────────────┘
//! ```
//!
//! The two bytes form a Big Endian u16. For command frames the payload
//! begins with a 1-byte command identifier which counts toward the
//! declared length.

use crate::error::{BinkError, Result};

/// Header size in bytes (fixed, exactly 2).
pub const HEADER_SIZE: usize = 2;

/// Maximum payload size (15-bit length field).
pub const MAX_PAYLOAD: usize = 0x7FFF;

/// Command flag: top bit of the first header byte.
pub const COMMAND_FLAG: u8 = 0x80;

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command frame (true) or data frame (false).
    pub is_command: bool,
    /// Payload length in bytes. For command frames this includes the
    /// command identifier byte.
    pub payload_length: u16,
}

impl Header {
    /// Create a new header.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `payload_length` fits in 15 bits.
    pub fn new(is_command: bool, payload_length: u16) -> Self {
        debug_assert!(payload_length as usize <= MAX_PAYLOAD);
        Self {
            is_command,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use binkwire::protocol::Header;
    ///
    /// let header = Header::new(true, 5);
    /// assert_eq!(header.encode(), [0x80, 0x05]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = (self.payload_length & 0x7FFF).to_be_bytes();
        if self.is_command {
            bytes[0] |= COMMAND_FLAG;
        }
        bytes
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use binkwire::protocol::Header;
    ///
    /// let header = Header::decode(&[0x80, 0x05]).unwrap();
    /// assert!(header.is_command);
    /// assert_eq!(header.payload_length, 5);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            is_command: buf[0] & COMMAND_FLAG != 0,
            payload_length: u16::from_be_bytes([buf[0] & !COMMAND_FLAG, buf[1]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// A command frame must declare at least the command identifier
    /// byte; length 0 cannot be interpreted and the byte stream cannot
    /// be resynchronized after it.
    pub fn validate(&self) -> Result<()> {
        if self.is_command && self.payload_length == 0 {
            return Err(BinkError::MalformedCommand(
                "command frame declares length 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        for (is_command, len) in [(true, 1u16), (false, 0), (true, 32767), (false, 32767)] {
            let original = Header::new(is_command, len);
            let decoded = Header::decode(&original.encode()).unwrap();
            assert_eq!(original, decoded);
        }
    }

    #[test]
    fn test_header_big_endian_byte_order() {
        let header = Header::new(false, 0x0102);
        assert_eq!(header.encode(), [0x01, 0x02]);

        let header = Header::new(true, 0x0102);
        assert_eq!(header.encode(), [0x81, 0x02]);
    }

    #[test]
    fn test_command_flag_is_top_bit() {
        let data = Header::decode(&[0x7F, 0xFF]).unwrap();
        assert!(!data.is_command);
        assert_eq!(data.payload_length as usize, MAX_PAYLOAD);

        let command = Header::decode(&[0xFF, 0xFF]).unwrap();
        assert!(command.is_command);
        assert_eq!(command.payload_length as usize, MAX_PAYLOAD);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[]).is_none());
        assert!(Header::decode(&[0x80]).is_none());
    }

    #[test]
    fn test_validate_zero_length_command_rejected() {
        let header = Header::new(true, 0);
        let result = header.validate();
        assert!(matches!(result, Err(BinkError::MalformedCommand(_))));
    }

    #[test]
    fn test_validate_zero_length_data_allowed() {
        let header = Header::new(false, 0);
        assert!(header.validate().is_ok());
    }
}
