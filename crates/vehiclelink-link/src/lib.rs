//! Link management for the vehiclelink serial protocol.
//!
//! This is the "just works" layer. Connect to a microcontroller, receive
//! typed vehicle events, and send power-management commands that are
//! retransmitted until the device acknowledges them.

pub mod ack;
pub mod bus;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod liveness;
pub mod manager;

pub use ack::{AckConfig, AckCorrelator, DEFAULT_ACK_TIMEOUT, DEFAULT_MAX_RETRIES};
pub use bus::{
    DisconnectReason, EventBus, Handler, LinkNotification, SubscriptionId, Topic, CONNECTION_LOST,
    DISCONNECTED, UNRECOGNIZED,
};
pub use command::{encode_command, CommandId, CommandOptions};
pub use config::{LinkConfig, DEFAULT_OUTBOUND_QUEUE};
pub use error::{LinkError, Result};
pub use event::{decode_event, AlarmSource, DomainEvent, EventDetail, EventError, EventId};
pub use liveness::{
    LivenessConfig, LivenessMonitor, DEFAULT_CHECK_INTERVAL, DEFAULT_SILENCE_THRESHOLD,
};
pub use manager::{ConnectionManager, LinkState};
