use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::{crc8, crc8_update};
use crate::error::{FrameError, Result};
use crate::message::MessageType;

/// Header sentinel, first byte of every frame.
pub const HEADER: u8 = 0xAA;

/// Terminator sentinel, last byte of every frame.
pub const TERMINATOR: u8 = 0x0D;

/// Bytes around the payload: header + length + type + crc + terminator.
pub const FRAME_OVERHEAD: usize = 5;

/// Smallest valid frame (empty payload).
pub const MIN_FRAME_SIZE: usize = FRAME_OVERHEAD;

/// The length field is a single byte.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// A validated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded TYPE byte.
    pub message_type: MessageType,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(message_type: MessageType, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            payload: payload.into(),
        }
    }

    /// An ACK frame echoing `id` (the acknowledged event or command id).
    pub fn ack(id: u8) -> Self {
        Self::new(MessageType::Ack, Bytes::copy_from_slice(&[id]))
    }

    /// First payload byte: the event id, command id or acknowledged id.
    pub fn leading_byte(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.message_type, &self.payload, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬────────┬────────┬──────────────┬────────┬────────────┐
/// │ Header │ Length │ Type   │ Payload      │ CRC8   │ Terminator │
/// │ 0xAA   │ (1B)   │ (1B)   │ (Length B)   │ (1B)   │ 0x0D       │
/// └────────┴────────┴────────┴──────────────┴────────┴────────────┘
/// ```
/// The CRC covers length, type and payload.
pub fn encode_frame(message_type: MessageType, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let prefix = [payload.len() as u8, message_type.as_u8()];
    let crc = crc8_update(crc8(&prefix), payload);

    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_u8(HEADER);
    dst.put_slice(&prefix);
    dst.put_slice(payload);
    dst.put_u8(crc);
    dst.put_u8(TERMINATOR);
    Ok(())
}

/// Decode one frame from a complete record.
///
/// The record boundary comes from the transport, so `src` must hold exactly
/// one frame: the CRC byte is the second-to-last byte and the payload is
/// everything between the type byte and the CRC. The CRC therefore always
/// covers the declared length byte; a corrupted length shows up as a checksum
/// mismatch rather than a misparse.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < MIN_FRAME_SIZE {
        return Err(FrameError::Truncated {
            len: src.len(),
            min: MIN_FRAME_SIZE,
        });
    }

    let first = src[0];
    if first != HEADER {
        return Err(FrameError::InvalidHeader(first));
    }
    let last = src[src.len() - 1];
    if last != TERMINATOR {
        return Err(FrameError::InvalidTerminator(last));
    }

    let crc_pos = src.len() - 2;
    let received = src[crc_pos];
    let computed = crc8(&src[1..crc_pos]);
    if computed != received {
        return Err(FrameError::ChecksumMismatch {
            expected: computed,
            actual: received,
        });
    }

    let declared = src[1] as usize;
    let payload = &src[3..crc_pos];
    if declared != payload.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    Ok(Frame {
        message_type: MessageType::from_u8(src[2]),
        payload: Bytes::copy_from_slice(payload),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::message::{ACK, COMMAND, EVENT};

    fn encode(message_type: MessageType, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(message_type, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn test_alarm_trip_event_golden_bytes() {
        let wire = encode(MessageType::Event, &[0x0A]);
        assert_eq!(wire, vec![0xAA, 0x01, 0x01, 0x0A, 0x48, 0x0D]);
    }

    #[test]
    fn test_decode_empty_ack() {
        let frame = decode_frame(&[0xAA, 0x00, 0x03, 0x09, 0x0D]).unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.leading_byte(), None);
    }

    #[test]
    fn test_shutdown_command_golden_bytes() {
        let wire = encode(MessageType::Command, &[0x01]);
        assert_eq!(wire, vec![0xAA, 0x01, COMMAND, 0x01, 0x46, 0x0D]);
    }

    #[test]
    fn test_ack_constructor() {
        let frame = Frame::ack(0x0B);
        assert_eq!(frame.message_type, MessageType::Ack);
        let wire = frame.encode().unwrap();
        assert_eq!(wire.as_ref(), &[0xAA, 0x01, ACK, 0x0B, 0x4F, 0x0D]);
        assert_eq!(frame.wire_size(), wire.len());
    }

    #[test]
    fn test_low_battery_event_decodes() {
        let wire = [0xAA, 0x03, EVENT, 0x0B, 0x00, 0x7C, 0x2F, 0x0D];
        let frame = decode_frame(&wire).unwrap();
        assert_eq!(frame.message_type, MessageType::Event);
        assert_eq!(frame.payload.as_ref(), &[0x0B, 0x00, 0x7C]);
    }

    #[test]
    fn test_decode_truncated() {
        for len in 0..MIN_FRAME_SIZE {
            let buf = vec![HEADER; len];
            assert!(matches!(
                decode_frame(&buf),
                Err(FrameError::Truncated { len: l, min: MIN_FRAME_SIZE }) if l == len
            ));
        }
    }

    #[test]
    fn test_decode_invalid_header() {
        let mut wire = encode(MessageType::Event, &[0x04]);
        wire[0] = 0xAB;
        assert!(matches!(
            decode_frame(&wire),
            Err(FrameError::InvalidHeader(0xAB))
        ));
    }

    #[test]
    fn test_decode_invalid_terminator() {
        let mut wire = encode(MessageType::Event, &[0x04]);
        let last = wire.len() - 1;
        wire[last] = 0x0A;
        assert!(matches!(
            decode_frame(&wire),
            Err(FrameError::InvalidTerminator(0x0A))
        ));
    }

    #[test]
    fn test_sentinels_checked_before_crc() {
        // Valid CRC, wrong sentinels on both ends: header wins.
        let mut wire = encode(MessageType::Ack, &[0x01]);
        wire[0] = 0x00;
        let last = wire.len() - 1;
        wire[last] = 0x00;
        assert!(matches!(
            decode_frame(&wire),
            Err(FrameError::InvalidHeader(0x00))
        ));
    }

    #[test]
    fn test_every_single_bit_flip_is_a_checksum_mismatch() {
        let wire = encode(MessageType::Command, &[0x03, 0x00, 0x00, 0x0E, 0x10]);
        // Everything between header and terminator: length, type, payload, crc.
        for byte in 1..wire.len() - 1 {
            for bit in 0..8 {
                let mut mutated = wire.clone();
                mutated[byte] ^= 1 << bit;
                let result = decode_frame(&mutated);
                assert!(
                    matches!(result, Err(FrameError::ChecksumMismatch { .. })),
                    "byte {byte} bit {bit}: {result:?}"
                );
            }
        }
    }

    #[test]
    fn test_length_mismatch_with_valid_crc() {
        // Declared length 2, one payload byte, CRC computed over what was sent.
        let body = [0x02, EVENT, 0x04];
        let mut wire = vec![HEADER];
        wire.extend_from_slice(&body);
        wire.push(crc8(&body));
        wire.push(TERMINATOR);

        assert!(matches!(
            decode_frame(&wire),
            Err(FrameError::LengthMismatch {
                declared: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let wire = encode(MessageType::Unknown(0x42), &[0x01, 0x02]);
        let frame = decode_frame(&wire).unwrap();
        assert_eq!(frame.message_type, MessageType::Unknown(0x42));
        assert_eq!(frame.payload.as_ref(), &[0x01, 0x02]);
    }

    #[test]
    fn test_payload_too_large() {
        let mut buf = BytesMut::new();
        let err = encode_frame(MessageType::Command, &[0u8; MAX_PAYLOAD + 1], &mut buf)
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 256,
                max: MAX_PAYLOAD
            }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_max_payload_encodes() {
        let payload = vec![0x5A; MAX_PAYLOAD];
        let wire = encode(MessageType::Event, &payload);
        assert_eq!(wire.len(), MAX_PAYLOAD + FRAME_OVERHEAD);
        assert_eq!(wire[1], 0xFF);
        let frame = decode_frame(&wire).unwrap();
        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip(
            tag in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD),
        ) {
            let message_type = MessageType::from_u8(tag);
            let wire = encode(message_type, &payload);
            prop_assert_eq!(wire.len(), payload.len() + FRAME_OVERHEAD);

            let frame = decode_frame(&wire).unwrap();
            prop_assert_eq!(frame.message_type, message_type);
            prop_assert_eq!(frame.payload.as_ref(), payload.as_slice());
        }

        #[test]
        fn prop_foreign_sentinels_rejected(
            first in any::<u8>(),
            last in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..16),
        ) {
            prop_assume!(first != HEADER || last != TERMINATOR);
            let mut wire = encode(MessageType::Event, &payload);
            wire[0] = first;
            let end = wire.len() - 1;
            wire[end] = last;

            let result = decode_frame(&wire);
            let rejected_by_sentinel = matches!(
                result,
                Err(FrameError::InvalidHeader(_)) | Err(FrameError::InvalidTerminator(_))
            );
            prop_assert!(rejected_by_sentinel);
        }
    }
}
