use vehiclelink_frame::{FrameConfig, MAX_PAYLOAD};
use vehiclelink_link::LinkConfig;
use vehiclelink_transport::SerialConfig;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("vehiclelink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let serial = SerialConfig::default();
    let link = LinkConfig::default();
    let frame = FrameConfig::default();

    println!("name: vehiclelink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("VEHICLELINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("VEHICLELINK_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: link={}, cli=true", cfg!(feature = "link"));
    println!("serial_defaults: {} baud 8N1", serial.baud_rate);
    println!("record_format: {}", frame.record_format);
    println!("max_payload: {MAX_PAYLOAD}");
    println!(
        "ack: timeout={:?} max_retries={}",
        link.ack.ack_timeout, link.ack.max_retries
    );
    println!(
        "liveness: interval={:?} threshold={:?}",
        link.liveness.check_interval, link.liveness.silence_threshold
    );

    Ok(SUCCESS)
}
