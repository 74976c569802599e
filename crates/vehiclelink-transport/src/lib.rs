//! Byte-stream transports for the vehiclelink protocol.
//!
//! The microcontroller is reached over a serial port; everything above this
//! crate only sees a [`LinkStream`] (any `AsyncRead + AsyncWrite`) handed out
//! by a [`Connector`]:
//! - [`SerialConnector`] opens real ports (behind the `serial` feature)
//! - [`LoopbackConnector`] serves in-memory device ends for tests and simulation
//!
//! This is the lowest layer of vehiclelink.

pub mod error;
pub mod loopback;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use loopback::LoopbackConnector;
pub use serial::{Parity, SerialConfig};
#[cfg(feature = "serial")]
pub use serial::{list_serial_ports, SerialConnector};
pub use traits::{Connector, LinkIo, LinkStream, PortInfo, UsbPortDetails};
