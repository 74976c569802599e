use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// A connected duplex byte stream to the device.
///
/// Blanket-implemented for every `AsyncRead + AsyncWrite` type that can move
/// between tasks, so serial streams and in-memory duplex pipes both qualify.
pub trait LinkIo: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> LinkIo for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Owned, type-erased link stream returned by [`Connector::open`].
pub type LinkStream = Box<dyn LinkIo>;

/// USB metadata reported for a port, when available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbPortDetails {
    pub vid: u16,
    pub pid: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// A port that a [`Connector`] can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Name passed to [`Connector::open`] (e.g. `/dev/ttyUSB0`, `COM3`).
    pub name: String,
    /// Short description of the port kind (`usb`, `pci`, `bluetooth`, ...).
    pub kind: &'static str,
    /// USB details for USB-serial adapters.
    pub usb: Option<UsbPortDetails>,
}

impl PortInfo {
    /// Create a port entry without USB details.
    pub fn new(name: impl Into<String>, kind: &'static str) -> Self {
        Self {
            name: name.into(),
            kind,
            usb: None,
        }
    }
}

/// Opens link streams by port identifier.
///
/// Implementations must be cheap to share; the connection manager holds one
/// behind an `Arc` for its whole lifetime.
pub trait Connector: Send + Sync {
    /// Open the named port. Must be called from within a tokio runtime.
    fn open(&self, port: &str) -> Result<LinkStream>;

    /// Enumerate ports this connector can open.
    fn list_ports(&self) -> Result<Vec<PortInfo>>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}
