//! Message type tags carried in the frame TYPE byte.

/// Device → host vehicle event.
pub const EVENT: u8 = 0x01;

/// Host → device power-management command.
pub const COMMAND: u8 = 0x02;

/// Acknowledgment of an event or command (either direction).
pub const ACK: u8 = 0x03;

/// Decoded TYPE byte.
///
/// Unknown tags are preserved rather than rejected so newer firmware can add
/// message types without breaking older hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Event,
    Command,
    Ack,
    Unknown(u8),
}

impl MessageType {
    pub const fn from_u8(tag: u8) -> Self {
        match tag {
            EVENT => MessageType::Event,
            COMMAND => MessageType::Command,
            ACK => MessageType::Ack,
            other => MessageType::Unknown(other),
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            MessageType::Event => EVENT,
            MessageType::Command => COMMAND,
            MessageType::Ack => ACK,
            MessageType::Unknown(tag) => tag,
        }
    }

    /// Returns true for EVENT, COMMAND and ACK.
    pub const fn is_known(self) -> bool {
        !matches!(self, MessageType::Unknown(_))
    }

    /// Returns a human-readable name for the type.
    pub const fn name(self) -> &'static str {
        match self {
            MessageType::Event => "EVENT",
            MessageType::Command => "COMMAND",
            MessageType::Ack => "ACK",
            MessageType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for MessageType {
    fn from(tag: u8) -> Self {
        Self::from_u8(tag)
    }
}

impl From<MessageType> for u8 {
    fn from(message_type: MessageType) -> Self {
        message_type.as_u8()
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Unknown(tag) => write!(f, "UNKNOWN(0x{tag:02X})"),
            known => f.write_str(known.name()),
        }
    }
}
