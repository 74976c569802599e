use vehiclelink_link::CommandOptions;

use crate::cmd::{runtime, SendArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS};
use crate::output::{print_command_ack, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let manager = args.link.manager()?;
    let mut options = CommandOptions::default();
    if let Some(duration) = args.duration {
        options = options.with_duration(duration);
    }

    runtime()?.block_on(async {
        manager
            .connect(&args.link.port)
            .await
            .map_err(|err| link_error("connect failed", err))?;

        let result = manager.send_command(args.command, options).await;
        manager.disconnect().await;
        result.map_err(|err| link_error("send failed", err))?;

        print_command_ack(&args.link.port, args.command, args.duration, format);
        Ok::<_, CliError>(SUCCESS)
    })
}
