/// Errors that can occur during frame encoding/decoding.
///
/// Everything except [`FrameError::Io`] describes a single bad record and is
/// recoverable: drop the record and keep reading.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than the smallest possible frame.
    #[error("frame truncated ({len} bytes, minimum {min})")]
    Truncated { len: usize, min: usize },

    /// The first byte is not the 0xAA header sentinel.
    #[error("invalid frame header 0x{0:02X} (expected 0xAA)")]
    InvalidHeader(u8),

    /// The last byte is not the 0x0D terminator sentinel.
    #[error("invalid frame terminator 0x{0:02X} (expected 0x0D)")]
    InvalidTerminator(u8),

    /// The CRC8 over length, type and payload does not match the CRC byte.
    #[error("checksum mismatch (computed 0x{expected:02X}, received 0x{actual:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The checksum is valid but the length byte disagrees with the payload.
    #[error("declared payload length {declared} does not match actual length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The payload does not fit the single-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A record could not be converted to frame bytes (e.g. bad hex).
    #[error("record is not a valid frame encoding: {0}")]
    InvalidEncoding(String),

    /// An I/O error occurred while reading or writing records.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the stream can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FrameError::Io(_))
    }

    /// Short machine-readable label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::Truncated { .. } => "truncated",
            FrameError::InvalidHeader(_) => "invalid_header",
            FrameError::InvalidTerminator(_) => "invalid_terminator",
            FrameError::ChecksumMismatch { .. } => "checksum_mismatch",
            FrameError::LengthMismatch { .. } => "length_mismatch",
            FrameError::PayloadTooLarge { .. } => "payload_too_large",
            FrameError::InvalidEncoding(_) => "invalid_encoding",
            FrameError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
