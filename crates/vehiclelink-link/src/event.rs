//! Vehicle events reported by the microcontroller.
//!
//! An EVENT payload starts with the event id. LOW_BATT carries a big-endian
//! voltage in tenths of a volt; ALARM_TRIP may carry a trigger source byte.

use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

/// Event identifiers (payload byte 0 of an EVENT frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventId {
    ReverseOn,
    ReverseOff,
    TurnLeftOn,
    TurnLeftOff,
    TurnRightOn,
    TurnRightOff,
    AlarmTrip,
    LowBattery,
    IgnitionOn,
    IgnitionOff,
}

impl EventId {
    pub const ALL: [EventId; 10] = [
        EventId::ReverseOn,
        EventId::ReverseOff,
        EventId::TurnLeftOn,
        EventId::TurnLeftOff,
        EventId::TurnRightOn,
        EventId::TurnRightOff,
        EventId::AlarmTrip,
        EventId::LowBattery,
        EventId::IgnitionOn,
        EventId::IgnitionOff,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x04 => Some(EventId::ReverseOn),
            0x05 => Some(EventId::ReverseOff),
            0x06 => Some(EventId::TurnLeftOn),
            0x07 => Some(EventId::TurnLeftOff),
            0x08 => Some(EventId::TurnRightOn),
            0x09 => Some(EventId::TurnRightOff),
            0x0A => Some(EventId::AlarmTrip),
            0x0B => Some(EventId::LowBattery),
            0x0C => Some(EventId::IgnitionOn),
            0x0D => Some(EventId::IgnitionOff),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            EventId::ReverseOn => 0x04,
            EventId::ReverseOff => 0x05,
            EventId::TurnLeftOn => 0x06,
            EventId::TurnLeftOff => 0x07,
            EventId::TurnRightOn => 0x08,
            EventId::TurnRightOff => 0x09,
            EventId::AlarmTrip => 0x0A,
            EventId::LowBattery => 0x0B,
            EventId::IgnitionOn => 0x0C,
            EventId::IgnitionOff => 0x0D,
        }
    }

    /// Stable notification name, e.g. `alarm-trip`.
    pub fn name(&self) -> &'static str {
        match self {
            EventId::ReverseOn => "reverse-on",
            EventId::ReverseOff => "reverse-off",
            EventId::TurnLeftOn => "turn-left-on",
            EventId::TurnLeftOff => "turn-left-off",
            EventId::TurnRightOn => "turn-right-on",
            EventId::TurnRightOff => "turn-right-off",
            EventId::AlarmTrip => "alarm-trip",
            EventId::LowBattery => "low-battery",
            EventId::IgnitionOn => "ignition-on",
            EventId::IgnitionOff => "ignition-off",
        }
    }

    /// Look up an event by its notification name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What tripped the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlarmSource {
    DoorSensor,
    Motion,
}

impl AlarmSource {
    fn from_u8(value: u8) -> Self {
        if value == 1 {
            AlarmSource::DoorSensor
        } else {
            AlarmSource::Motion
        }
    }
}

/// Event-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetail {
    None,
    LowBattery { voltage: f64 },
    AlarmTrip { source: Option<AlarmSource> },
}

/// A decoded vehicle event, stamped with its receipt time.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub id: EventId,
    pub timestamp: SystemTime,
    pub detail: EventDetail,
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Battery voltage in volts (LOW_BATT only).
    pub fn voltage(&self) -> Option<f64> {
        match self.detail {
            EventDetail::LowBattery { voltage } => Some(voltage),
            _ => None,
        }
    }

    /// Alarm trigger source (ALARM_TRIP only, when reported).
    pub fn alarm_source(&self) -> Option<AlarmSource> {
        match self.detail {
            EventDetail::AlarmTrip { source } => source,
            _ => None,
        }
    }
}

/// Errors decoding an EVENT payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("event payload is empty")]
    Empty,

    #[error("unknown event id 0x{0:02X}")]
    UnknownEvent(u8),

    #[error("{event} payload truncated ({len} bytes, need {need})")]
    Truncated {
        event: EventId,
        len: usize,
        need: usize,
    },
}

const LOW_BATTERY_PAYLOAD_LEN: usize = 3;

/// Decode an EVENT payload received at `received_at`.
pub fn decode_event(payload: &[u8], received_at: SystemTime) -> Result<DomainEvent, EventError> {
    let (&raw_id, data) = payload.split_first().ok_or(EventError::Empty)?;
    let id = EventId::from_u8(raw_id).ok_or(EventError::UnknownEvent(raw_id))?;

    let detail = match id {
        EventId::LowBattery => {
            if payload.len() < LOW_BATTERY_PAYLOAD_LEN {
                return Err(EventError::Truncated {
                    event: id,
                    len: payload.len(),
                    need: LOW_BATTERY_PAYLOAD_LEN,
                });
            }
            let raw = u16::from_be_bytes([data[0], data[1]]);
            EventDetail::LowBattery {
                voltage: f64::from(raw) / 10.0,
            }
        }
        EventId::AlarmTrip => EventDetail::AlarmTrip {
            source: data.first().copied().map(AlarmSource::from_u8),
        },
        _ => EventDetail::None,
    };

    Ok(DomainEvent {
        id,
        timestamp: received_at,
        detail,
    })
}
