/// Errors that can occur while opening or enumerating link transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The port could not be opened.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: std::io::Error,
    },

    /// Port enumeration failed.
    #[error("failed to enumerate ports: {0}")]
    Enumerate(std::io::Error),

    /// Line settings were rejected before touching the device.
    #[error("invalid serial configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
