use vehiclelink_frame::FrameError;
use vehiclelink_transport::TransportError;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The operation needs a connected link.
    #[error("link is not connected")]
    NotConnected,

    /// `connect` was called while a link is already up or coming up.
    #[error("link is already connected")]
    AlreadyConnected,

    /// The port could not be opened.
    #[error("port {port} unavailable: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: TransportError,
    },

    /// A command with the same id is still waiting for its ACK.
    #[error("command 0x{0:02X} is already awaiting acknowledgment")]
    CommandPending(u8),

    /// No ACK arrived after every retry.
    #[error("command 0x{command:02X} not acknowledged after {attempts} attempts")]
    AckTimeout { command: u8, attempts: u32 },

    /// The link went down while the operation was in flight.
    #[error("link disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, LinkError>;
