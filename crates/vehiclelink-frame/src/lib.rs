//! CRC8-checked binary framing for the vehiclelink serial protocol.
//!
//! Every message on the wire is one frame:
//! - A 0xAA header sentinel
//! - A 1-byte payload length and a 1-byte message type
//! - The payload, then a CRC8 over length, type and payload
//! - A 0x0D terminator sentinel
//!
//! [`RecordCodec`] carries frames over the serial byte stream, either as hex
//! lines or as raw bytes.

pub mod codec;
pub mod crc;
pub mod error;
pub mod message;
pub mod record;

pub use codec::{
    decode_frame, encode_frame, Frame, FRAME_OVERHEAD, HEADER, MAX_PAYLOAD, MIN_FRAME_SIZE,
    TERMINATOR,
};
pub use crc::{crc8, crc8_update};
pub use error::{FrameError, Result};
pub use message::{MessageType, ACK, COMMAND, EVENT};
pub use record::{FrameConfig, RecordCodec, RecordFormat, DEFAULT_MAX_RECORD_LEN};
