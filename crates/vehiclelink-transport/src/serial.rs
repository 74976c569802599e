use std::time::Duration;

#[cfg(feature = "serial")]
use tokio_serial::{SerialPortBuilderExt, SerialPortType};
#[cfg(feature = "serial")]
use tracing::{debug, info};

use crate::error::{Result, TransportError};
#[cfg(feature = "serial")]
use crate::traits::{Connector, LinkStream, PortInfo, UsbPortDetails};

/// Parity setting for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Serial line settings.
///
/// Defaults match the microcontroller firmware: 115200 baud, 8N1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Data bits per character (5-8).
    pub data_bits: u8,
    /// Stop bits (1 or 2).
    pub stop_bits: u8,
    pub parity: Parity,
    /// Driver-level timeout for blocking port operations.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            timeout: Duration::from_millis(100),
        }
    }
}

impl SerialConfig {
    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Reject settings no UART accepts.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(TransportError::InvalidConfig(
                "baud rate must be greater than zero".to_string(),
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(TransportError::InvalidConfig(format!(
                "data bits must be 5-8, got {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(TransportError::InvalidConfig(format!(
                "stop bits must be 1 or 2, got {}",
                self.stop_bits
            )));
        }
        Ok(())
    }
}

/// Opens real serial ports through `tokio-serial`.
#[cfg(feature = "serial")]
#[derive(Debug, Clone, Default)]
pub struct SerialConnector {
    config: SerialConfig,
}

#[cfg(feature = "serial")]
impl SerialConnector {
    /// Create a connector with explicit line settings.
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    /// Line settings applied to every opened port.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

#[cfg(feature = "serial")]
impl Connector for SerialConnector {
    fn open(&self, port: &str) -> Result<LinkStream> {
        self.config.validate()?;
        debug!(port, baud = self.config.baud_rate, "opening serial port");

        let data_bits = match self.config.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match self.config.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };
        let parity = match self.config.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        };

        let stream = tokio_serial::new(port, self.config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.config.timeout)
            .open_native_async()
            .map_err(|err| TransportError::Open {
                port: port.to_string(),
                source: err.into(),
            })?;

        info!(port, baud = self.config.baud_rate, "serial port opened");
        Ok(Box::new(stream))
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        list_serial_ports()
    }

    fn transport_name(&self) -> &'static str {
        "serial"
    }
}

/// Enumerate serial ports present on this host.
#[cfg(feature = "serial")]
pub fn list_serial_ports() -> Result<Vec<PortInfo>> {
    let ports =
        tokio_serial::available_ports().map_err(|err| TransportError::Enumerate(err.into()))?;

    let mut out: Vec<PortInfo> = ports
        .into_iter()
        .map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) => PortInfo {
                name: port.port_name,
                kind: "usb",
                usb: Some(UsbPortDetails {
                    vid: usb.vid,
                    pid: usb.pid,
                    serial_number: usb.serial_number,
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                }),
            },
            SerialPortType::PciPort => PortInfo::new(port.port_name, "pci"),
            SerialPortType::BluetoothPort => PortInfo::new(port.port_name, "bluetooth"),
            _ => PortInfo::new(port.port_name, "unknown"),
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}
