//! Wire protocol: header format, command vocabulary, frame codec and
//! the streaming accumulator for partial reads.

pub mod command;
pub mod frame;
pub mod frame_buffer;
pub mod wire_format;

pub use command::{Command, CommandId, FileInfo};
pub use frame::{encode_command, encode_data, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{Header, COMMAND_FLAG, HEADER_SIZE, MAX_PAYLOAD};
