//! Host-side serial link to a vehicle microcontroller.
//!
//! vehiclelink receives vehicle events (reverse, turn signals, alarm, battery,
//! ignition) over a CRC-checked serial protocol and sends power-management
//! commands that are retransmitted until the device acknowledges them.
//!
//! # Crate Structure
//!
//! - [`transport`]: Port access (serial via `tokio-serial`, in-memory loopback)
//! - [`frame`]: Binary frame codec, CRC8 and line record codec
//! - [`link`]: Connection manager, event decoding, ACK correlation, liveness
//!   (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use vehiclelink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use vehiclelink_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use vehiclelink_link::*;
}
