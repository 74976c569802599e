use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Power-management commands the host can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandId {
    Shutdown,
    ShutdownAck,
    KeepSentry,
    DisableSentry,
    ForcePowerOff,
}

impl CommandId {
    pub const ALL: [CommandId; 5] = [
        CommandId::Shutdown,
        CommandId::ShutdownAck,
        CommandId::KeepSentry,
        CommandId::DisableSentry,
        CommandId::ForcePowerOff,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(CommandId::Shutdown),
            0x02 => Some(CommandId::ShutdownAck),
            0x03 => Some(CommandId::KeepSentry),
            0x04 => Some(CommandId::DisableSentry),
            0x05 => Some(CommandId::ForcePowerOff),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CommandId::Shutdown => 0x01,
            CommandId::ShutdownAck => 0x02,
            CommandId::KeepSentry => 0x03,
            CommandId::DisableSentry => 0x04,
            CommandId::ForcePowerOff => 0x05,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandId::Shutdown => "shutdown",
            CommandId::ShutdownAck => "shutdown-ack",
            CommandId::KeepSentry => "keep-sentry",
            CommandId::DisableSentry => "disable-sentry",
            CommandId::ForcePowerOff => "force-power-off",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandId {
    type Err = String;

    /// Accepts `shutdown`, `SHUTDOWN_ACK`, `keep-sentry`, `Keep_Sentry`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.name() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|cmd| cmd.name()).collect();
                format!("unknown command '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Optional command data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Appended as a big-endian u32 when present. Units are firmware-defined.
    pub duration: Option<u32>,
}

impl CommandOptions {
    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Build a COMMAND payload: the command id, then the optional duration.
pub fn encode_command(command: CommandId, options: &CommandOptions) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(command.as_u8());
    if let Some(duration) = options.duration {
        buf.put_u32(duration);
    }
    buf.freeze()
}
