use tokio::sync::mpsc;
use tracing::{info, warn};
use vehiclelink_link::{ConnectionManager, DisconnectReason, LinkNotification};

use crate::cmd::{runtime, MonitorArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_notification, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let manager = args.link.manager()?;
    runtime()?.block_on(monitor(manager, args, format))
}

async fn monitor(
    manager: ConnectionManager,
    args: MonitorArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let (tx, mut notifications) = mpsc::unbounded_channel();
    manager.subscribe("*", move |notification: &LinkNotification| {
        let _ = tx.send(notification.clone());
    });

    manager
        .connect(&args.link.port)
        .await
        .map_err(|err| link_error("connect failed", err))?;
    info!(port = %args.link.port, "monitoring, press Ctrl-C to stop");

    let mut printed = 0usize;
    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "could not listen for Ctrl-C");
                }
                break Ok(SUCCESS);
            }
            notification = notifications.recv() => {
                let Some(notification) = notification else {
                    break Ok(SUCCESS);
                };

                if args.only.is_empty() || args.only.iter().any(|name| name == notification.name()) {
                    print_notification(&notification, format);
                    printed = printed.saturating_add(1);
                }

                if let LinkNotification::Disconnected { reason } = &notification {
                    if *reason != DisconnectReason::Requested {
                        break Err(CliError::new(
                            TRANSPORT_ERROR,
                            format!("link to {} lost: {reason}", args.link.port),
                        ));
                    }
                }
                if args.count.is_some_and(|count| printed >= count) {
                    break Ok(SUCCESS);
                }
            }
        }
    };

    manager.disconnect().await;
    outcome
}
