use tracing::info;
use vehiclelink_transport::list_serial_ports;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let ports =
        list_serial_ports().map_err(|err| transport_error("port enumeration failed", err))?;
    if ports.is_empty() {
        info!("no serial ports found");
    }
    print_ports(&ports, format);
    Ok(SUCCESS)
}
