use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::{Mutex, PoisonError};

use tokio::io::DuplexStream;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, LinkStream, PortInfo};

/// Default in-memory pipe capacity per direction.
pub const DEFAULT_LOOPBACK_BUFFER: usize = 8 * 1024;

/// In-memory transport for tests and device simulation.
///
/// [`attach`](Self::attach) registers a simulated device under a port name and
/// returns the device end of a duplex pipe. The next [`Connector::open`] on
/// that name hands out the host end. Each attachment serves exactly one open.
pub struct LoopbackConnector {
    ports: Mutex<HashMap<String, DuplexStream>>,
    buffer_size: usize,
}

impl LoopbackConnector {
    /// Create a connector with no attached devices.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_LOOPBACK_BUFFER)
    }

    /// Create a connector with an explicit per-direction pipe capacity.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            ports: Mutex::new(HashMap::new()),
            buffer_size,
        }
    }

    /// Attach a simulated device to `port` and return the device end.
    ///
    /// Replaces any earlier attachment that has not been opened yet.
    pub fn attach(&self, port: &str) -> DuplexStream {
        let (host, device) = tokio::io::duplex(self.buffer_size);
        let mut ports = self.ports.lock().unwrap_or_else(PoisonError::into_inner);
        if ports.insert(port.to_string(), host).is_some() {
            debug!(port, "replacing unopened loopback attachment");
        }
        device
    }
}

impl Default for LoopbackConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for LoopbackConnector {
    fn open(&self, port: &str) -> Result<LinkStream> {
        let mut ports = self.ports.lock().unwrap_or_else(PoisonError::into_inner);
        match ports.remove(port) {
            Some(host) => {
                debug!(port, "loopback port opened");
                Ok(Box::new(host))
            }
            None => Err(TransportError::Open {
                port: port.to_string(),
                source: std::io::Error::new(ErrorKind::NotFound, "no device attached"),
            }),
        }
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        let ports = self.ports.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<PortInfo> = ports
            .keys()
            .map(|name| PortInfo::new(name.clone(), "loopback"))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn transport_name(&self) -> &'static str {
        "loopback"
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn attached_device_exchanges_bytes_with_host() {
        let connector = LoopbackConnector::new();
        let mut device = connector.attach("sim0");

        let mut host = connector.open("sim0").unwrap();
        host.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        device.write_all(b"pong").await.unwrap();
        host.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn open_unattached_port_is_not_found() {
        let connector = LoopbackConnector::new();
        let err = connector.open("missing").err().unwrap();
        match err {
            TransportError::Open { port, source } => {
                assert_eq!(port, "missing");
                assert_eq!(source.kind(), ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn attachment_serves_a_single_open() {
        let connector = LoopbackConnector::new();
        let _device = connector.attach("sim0");

        assert!(connector.open("sim0").is_ok());
        assert!(connector.open("sim0").is_err());
    }

    #[test]
    fn list_ports_reports_unopened_attachments_sorted() {
        let connector = LoopbackConnector::new();
        let _b = connector.attach("sim-b");
        let _a = connector.attach("sim-a");

        let names: Vec<String> = connector
            .list_ports()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["sim-a".to_string(), "sim-b".to_string()]);
        assert_eq!(connector.transport_name(), "loopback");
    }
}
