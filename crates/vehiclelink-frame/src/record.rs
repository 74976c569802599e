use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::codec::{decode_frame, encode_frame, Frame, FRAME_OVERHEAD, HEADER};
use crate::error::FrameError;

/// Default cap on a single hex record, in bytes (before decoding).
pub const DEFAULT_MAX_RECORD_LEN: usize = 1024;

/// How frames are carried on the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    /// One frame per line as ASCII hex, lines end in `\r\n`.
    #[default]
    Hex,
    /// Raw frame bytes back to back. Frame extent comes from the length byte.
    Binary,
}

impl RecordFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFormat::Hex => "hex",
            RecordFormat::Binary => "binary",
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" => Ok(RecordFormat::Hex),
            "binary" | "raw" => Ok(RecordFormat::Binary),
            other => Err(format!("unknown record format '{other}' (expected hex or binary)")),
        }
    }
}

/// Configuration for record framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    pub record_format: RecordFormat,
    /// Longest hex line accepted; longer lines are dropped up to the next newline.
    pub max_record_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            record_format: RecordFormat::Hex,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }
}

impl FrameConfig {
    pub fn with_record_format(mut self, record_format: RecordFormat) -> Self {
        self.record_format = record_format;
        self
    }

    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len;
        self
    }
}

/// Splits the serial byte stream into records and records into frames.
///
/// Each decoded item is itself a `Result`: a bad record yields `Some(Err(_))`
/// and decoding continues with the next one. The outer error is reserved for
/// I/O failures, which end the stream.
#[derive(Debug, Clone, Default)]
pub struct RecordCodec {
    config: FrameConfig,
    // Where to resume the newline scan in hex mode.
    next_index: usize,
    // Dropping the tail of an overlong hex line.
    discarding: bool,
}

impl RecordCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn decode_hex(&mut self, buf: &mut BytesMut) -> Option<Result<Frame, FrameError>> {
        let max = self.config.max_record_len;
        loop {
            // Scan at most one byte past the limit for the delimiter.
            let read_to = buf.len().min(max.saturating_add(1));
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return None;
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    if let Some(item) = parse_hex_record(&line[..end]) {
                        return Some(item);
                    }
                }
                (false, None) if buf.len() > max => {
                    warn!(max, "record exceeds maximum length, discarding");
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return None;
                }
            }
        }
    }

    fn decode_binary(&mut self, buf: &mut BytesMut) -> Option<Result<Frame, FrameError>> {
        match buf.iter().position(|b| *b == HEADER) {
            Some(0) => {}
            Some(skip) => {
                trace!(skipped = skip, "skipping bytes before frame header");
                buf.advance(skip);
            }
            None => {
                if !buf.is_empty() {
                    trace!(skipped = buf.len(), "skipping bytes without frame header");
                    buf.clear();
                }
                return None;
            }
        }

        if buf.len() < 2 {
            return None;
        }
        let total = buf[1] as usize + FRAME_OVERHEAD;
        if buf.len() < total {
            // Give up on this header once a later one holds a complete frame.
            if let Some(start) = next_complete_frame(buf) {
                warn!(
                    declared = total,
                    available = start,
                    "frame cut short by the next header, resyncing"
                );
                buf.advance(start);
                return Some(Err(FrameError::Truncated {
                    len: start,
                    min: total,
                }));
            }
            buf.reserve(total - buf.len());
            return None;
        }

        // Consume only a frame that checks out; otherwise drop the header byte.
        match decode_frame(&buf[..total]) {
            Ok(frame) => {
                buf.advance(total);
                Some(Ok(frame))
            }
            Err(err) => {
                buf.advance(1);
                Some(Err(err))
            }
        }
    }
}

/// Offset of the first header after position 0 that starts a complete, valid frame.
fn next_complete_frame(buf: &[u8]) -> Option<usize> {
    (1..buf.len())
        .filter(|&start| buf[start] == HEADER)
        .find(|&start| {
            let rest = &buf[start..];
            if rest.len() < 2 {
                return false;
            }
            let total = rest[1] as usize + FRAME_OVERHEAD;
            rest.len() >= total && decode_frame(&rest[..total]).is_ok()
        })
}

fn parse_hex_record(line: &[u8]) -> Option<Result<Frame, FrameError>> {
    let text = line.trim_ascii();
    if text.is_empty() {
        return None;
    }
    let raw = match hex::decode(text) {
        Ok(raw) => raw,
        Err(err) => return Some(Err(FrameError::InvalidEncoding(err.to_string()))),
    };
    Some(decode_frame(&raw))
}

impl Decoder for RecordCodec {
    type Item = Result<Frame, FrameError>;
    type Error = FrameError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, FrameError> {
        let item = match self.config.record_format {
            RecordFormat::Hex => self.decode_hex(buf),
            RecordFormat::Binary => self.decode_binary(buf),
        };
        Ok(item)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, FrameError> {
        if let Some(item) = self.decode(buf)? {
            return Ok(Some(item));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        if self.config.record_format == RecordFormat::Binary {
            // Incomplete frame at end of stream. Report it, then rescan past
            // its header.
            let item = decode_frame(&buf[..]);
            buf.advance(1);
            return Ok(Some(item));
        }

        // Unterminated tail at end of stream.
        let tail = buf.split();
        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            return Ok(None);
        }
        Ok(parse_hex_record(&tail))
    }
}

impl Encoder<Frame> for RecordCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        match self.config.record_format {
            RecordFormat::Binary => encode_frame(frame.message_type, &frame.payload, dst),
            RecordFormat::Hex => {
                let raw = frame.encode()?;
                let text = hex::encode_upper(&raw);
                dst.reserve(text.len() + 2);
                dst.put_slice(text.as_bytes());
                dst.put_slice(b"\r\n");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::message::MessageType;

    fn hex_codec() -> RecordCodec {
        RecordCodec::new(FrameConfig::default())
    }

    fn binary_codec() -> RecordCodec {
        RecordCodec::new(FrameConfig::default().with_record_format(RecordFormat::Binary))
    }

    fn next(codec: &mut RecordCodec, buf: &mut BytesMut) -> Option<Result<Frame, FrameError>> {
        codec.decode(buf).unwrap()
    }

    #[test]
    fn hex_line_decodes_to_frame() {
        let mut codec = hex_codec();
        let mut buf = BytesMut::from(&b"AA01010A480D\r\n"[..]);

        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Event);
        assert_eq!(frame.payload.as_ref(), &[0x0A]);
        assert!(buf.is_empty());
    }

    #[test]
    fn hex_is_case_insensitive_and_trimmed() {
        let mut codec = hex_codec();
        let mut buf = BytesMut::from(&b"  aa0003090d \r\n"[..]);

        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut codec = hex_codec();
        let mut buf = BytesMut::from(&b"AA0101"[..]);
        assert!(next(&mut codec, &mut buf).is_none());

        buf.extend_from_slice(b"0A480D\r\n");
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), &[0x0A]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut codec = hex_codec();
        let mut buf = BytesMut::from(&b"\r\n\n  \r\nAA0003090D\r\n"[..]);

        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
        assert!(next(&mut codec, &mut buf).is_none());
    }

    #[test]
    fn bad_records_do_not_poison_the_stream() {
        let mut codec = hex_codec();
        let mut buf = BytesMut::from(&b"not hex\r\nAA01010A490D\r\nAA01010D\r\nAA01010A480D\r\n"[..]);

        assert!(matches!(
            next(&mut codec, &mut buf),
            Some(Err(FrameError::InvalidEncoding(_)))
        ));
        assert!(matches!(
            next(&mut codec, &mut buf),
            Some(Err(FrameError::ChecksumMismatch { .. }))
        ));
        assert!(matches!(
            next(&mut codec, &mut buf),
            Some(Err(FrameError::Truncated { .. }))
        ));
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), &[0x0A]);
    }

    #[test]
    fn overlong_line_is_discarded_up_to_newline() {
        let mut codec = RecordCodec::new(FrameConfig::default().with_max_record_len(16));
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[b'F'; 40]);
        assert!(next(&mut codec, &mut buf).is_none());

        buf.extend_from_slice(b"FFFF\r\nAA0003090D\r\n");
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
    }

    #[test]
    fn eof_flushes_unterminated_hex_record() {
        let mut codec = hex_codec();
        let mut buf = BytesMut::from(&b"AA0003090D"[..]);

        let frame = codec.decode_eof(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn hex_encoder_writes_upper_case_line() {
        let mut codec = hex_codec();
        let mut dst = BytesMut::new();
        codec
            .encode(Frame::new(MessageType::Event, Bytes::from_static(&[0x0A])), &mut dst)
            .unwrap();
        assert_eq!(dst.as_ref(), b"AA01010A480D\r\n");
    }

    #[test]
    fn binary_encoder_writes_raw_frame() {
        let mut codec = binary_codec();
        let mut dst = BytesMut::new();
        codec.encode(Frame::ack(0x0A), &mut dst).unwrap();
        assert_eq!(dst.as_ref(), &[0xAA, 0x01, 0x03, 0x0A, 0x62, 0x0D]);
    }

    #[test]
    fn binary_frames_are_split_by_length() {
        let mut codec = binary_codec();
        // Payload contains 0x0A, which must not act as a delimiter here.
        let mut buf = BytesMut::from(&[0xAA, 0x01, 0x01, 0x0A, 0x48, 0x0D, 0xAA, 0x00][..]);

        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), &[0x0A]);
        assert!(next(&mut codec, &mut buf).is_none());

        buf.extend_from_slice(&[0x03, 0x09, 0x0D]);
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
    }

    #[test]
    fn binary_skips_noise_before_header() {
        let mut codec = binary_codec();
        let mut buf = BytesMut::from(&[0x00, 0x13, 0xAA, 0x00, 0x03, 0x09, 0x0D][..]);

        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
        assert!(buf.is_empty());
    }

    #[test]
    fn binary_bad_terminator_is_reported_and_skipped() {
        let mut codec = binary_codec();
        let mut buf = BytesMut::from(&[0xAA, 0x00, 0x03, 0x09, 0x00, 0xAA, 0x00, 0x03, 0x09, 0x0D][..]);

        assert!(matches!(
            next(&mut codec, &mut buf),
            Some(Err(FrameError::InvalidTerminator(0x00)))
        ));
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
    }

    fn drain_eof(codec: &mut RecordCodec, buf: &mut BytesMut) -> Vec<Result<Frame, FrameError>> {
        let mut items = Vec::new();
        while let Some(item) = codec.decode_eof(buf).unwrap() {
            items.push(item);
        }
        items
    }

    #[test]
    fn binary_corrupt_length_does_not_swallow_next_frame() {
        let mut codec = binary_codec();
        // Event whose length byte reads 5 instead of 1, then an empty ACK.
        let mut buf = BytesMut::from(
            &[0xAA, 0x05, 0x01, 0x0A, 0x48, 0x0D, 0xAA, 0x00, 0x03, 0x09, 0x0D][..],
        );

        let items = drain_eof(&mut codec, &mut buf);
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Err(FrameError::InvalidTerminator(0x09))));
        let ack = items[1].as_ref().unwrap();
        assert_eq!(ack.message_type, MessageType::Ack);
        assert!(ack.payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn binary_oversized_length_resyncs_on_complete_frame() {
        let mut codec = binary_codec();
        // Length byte claims 0x20 bytes; the ACK after it is already complete.
        let mut buf = BytesMut::from(
            &[0xAA, 0x20, 0x01, 0x0A, 0x48, 0x0D, 0xAA, 0x00, 0x03, 0x09, 0x0D][..],
        );

        assert!(matches!(
            next(&mut codec, &mut buf),
            Some(Err(FrameError::Truncated { len: 6, min: 37 }))
        ));
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
        assert!(buf.is_empty());
    }

    #[test]
    fn binary_stray_header_byte_does_not_delay_frame() {
        let mut codec = binary_codec();
        let mut buf = BytesMut::from(&[0xAA, 0xAA, 0x01, 0x01, 0x0A, 0x48, 0x0D][..]);

        assert!(matches!(
            next(&mut codec, &mut buf),
            Some(Err(FrameError::Truncated { len: 1, .. }))
        ));
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Event);
        assert_eq!(frame.payload.as_ref(), &[0x0A]);
        assert!(next(&mut codec, &mut buf).is_none());
    }

    #[test]
    fn binary_stray_header_with_small_length_is_skipped() {
        let mut codec = binary_codec();
        // Noise `AA 00` reads as an empty frame whose terminator is wrong.
        let mut buf = BytesMut::from(&[0xAA, 0x00, 0xAA, 0x00, 0x03, 0x09, 0x0D][..]);

        assert!(matches!(
            next(&mut codec, &mut buf),
            Some(Err(FrameError::InvalidTerminator(0x03)))
        ));
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
    }

    #[test]
    fn binary_partial_frame_waits_without_later_header() {
        let mut codec = binary_codec();
        let mut buf = BytesMut::from(&[0xAA, 0x03, 0x01, 0x0B][..]);
        assert!(next(&mut codec, &mut buf).is_none());

        buf.extend_from_slice(&[0x00, 0x7C, 0x2F, 0x0D]);
        let frame = next(&mut codec, &mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), &[0x0B, 0x00, 0x7C]);
    }

    #[test]
    fn binary_eof_reports_incomplete_tail() {
        let mut codec = binary_codec();
        let mut buf = BytesMut::from(&[0xAA, 0x03, 0x01, 0x0B][..]);

        let items = drain_eof(&mut codec, &mut buf);
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn record_format_parses_from_str() {
        assert_eq!("hex".parse::<RecordFormat>().unwrap(), RecordFormat::Hex);
        assert_eq!("BINARY".parse::<RecordFormat>().unwrap(), RecordFormat::Binary);
        assert!("base64".parse::<RecordFormat>().is_err());
        assert_eq!(RecordFormat::default().to_string(), "hex");
    }
}
