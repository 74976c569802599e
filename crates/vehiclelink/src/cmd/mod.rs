use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use vehiclelink_frame::{FrameConfig, RecordFormat};
use vehiclelink_link::{AckConfig, CommandId, ConnectionManager, LinkConfig, LivenessConfig};
use vehiclelink_transport::{SerialConfig, SerialConnector};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod frame;
pub mod monitor;
pub mod ports;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports(PortsArgs),
    /// Connect and print vehicle events until interrupted.
    Monitor(MonitorArgs),
    /// Send one command and wait for the acknowledgment.
    Send(SendArgs),
    /// Encode or decode frames offline.
    #[command(subcommand)]
    Frame(FrameCommand),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Frame(command) => frame::run(command, format),
        Command::Version(args) => version::run(args),
    }
}

/// Port and line settings shared by commands that open a link.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial port (e.g. /dev/ttyUSB0, COM3).
    #[arg(env = "VEHICLELINK_PORT")]
    pub port: String,
    /// Baud rate.
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// How long to wait for each ACK (e.g. 2500ms, 3s).
    #[arg(long, default_value = "2500ms")]
    pub ack_timeout: String,
    /// Retransmissions before a command fails.
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,
    /// Record encoding on the wire: hex or binary.
    #[arg(long, default_value = "hex")]
    pub record_format: RecordFormat,
    /// Send an empty COMMAND frame on every liveness tick.
    #[arg(long)]
    pub heartbeat: bool,
}

impl LinkArgs {
    pub fn link_config(&self) -> CliResult<LinkConfig> {
        let ack = AckConfig::default()
            .with_ack_timeout(parse_duration(&self.ack_timeout)?)
            .with_max_retries(self.max_retries);
        Ok(LinkConfig::default()
            .with_frame_config(FrameConfig::default().with_record_format(self.record_format))
            .with_ack_config(ack)
            .with_liveness_config(LivenessConfig::default().with_heartbeat(self.heartbeat)))
    }

    pub fn manager(&self) -> CliResult<ConnectionManager> {
        let serial = SerialConfig::default().with_baud_rate(self.baud);
        serial
            .validate()
            .map_err(|err| CliError::new(USAGE, err.to_string()))?;
        Ok(ConnectionManager::new(
            self.link_config()?,
            Arc::new(SerialConnector::new(serial)),
        ))
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Only print notifications with this name (e.g. alarm-trip). Repeatable.
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,
    /// Exit after printing N notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Command to send: shutdown, shutdown-ack, keep-sentry, disable-sentry, force-power-off.
    pub command: CommandId,
    /// Optional duration appended to the command (big-endian u32).
    #[arg(long)]
    pub duration: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum FrameCommand {
    /// Build a frame and print it.
    Encode(FrameEncodeArgs),
    /// Validate a hex-encoded frame and print its fields.
    Decode(FrameDecodeArgs),
}

#[derive(Args, Debug)]
pub struct FrameEncodeArgs {
    /// Message type: event, command, ack, or a numeric tag (e.g. 0x7F).
    #[arg(long = "type", value_name = "TYPE")]
    pub message_type: String,
    /// Payload as hex (e.g. 0A, 0B007C).
    #[arg(long, default_value = "")]
    pub payload: String,
}

#[derive(Args, Debug)]
pub struct FrameDecodeArgs {
    /// Frame bytes as hex (e.g. AA01010A480D).
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Multi-threaded runtime for commands that talk to a device.
pub fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "ms")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "s" => Duration::from_secs(value),
        _ => Duration::from_millis(value),
    })
}
