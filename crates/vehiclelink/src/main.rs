mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "vehiclelink",
    version,
    about = "Talk to a vehicle microcontroller over a serial link"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::FrameCommand;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "vehiclelink",
            "send",
            "/dev/ttyUSB0",
            "keep_sentry",
            "--duration",
            "300",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.link.port, "/dev/ttyUSB0");
        assert_eq!(args.command, vehiclelink_link::CommandId::KeepSentry);
        assert_eq!(args.duration, Some(300));
    }

    #[test]
    fn rejects_unknown_command_name() {
        let err = Cli::try_parse_from(["vehiclelink", "send", "/dev/ttyUSB0", "self-destruct"])
            .expect_err("unknown command should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_monitor_filters() {
        let cli = Cli::try_parse_from([
            "vehiclelink",
            "--format",
            "json",
            "monitor",
            "COM3",
            "--only",
            "alarm-trip",
            "--only",
            "low-battery",
            "--count",
            "5",
            "--record-format",
            "binary",
        ])
        .expect("monitor args should parse");

        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(args.only, vec!["alarm-trip", "low-battery"]);
        assert_eq!(args.count, Some(5));
        assert_eq!(
            args.link.record_format,
            vehiclelink_frame::RecordFormat::Binary
        );
    }

    #[test]
    fn parses_frame_encode() {
        let cli = Cli::try_parse_from([
            "vehiclelink",
            "frame",
            "encode",
            "--type",
            "event",
            "--payload",
            "0A",
        ])
        .expect("frame args should parse");
        assert!(matches!(
            cli.command,
            Command::Frame(FrameCommand::Encode(_))
        ));
    }
}
