use vehiclelink_frame::{decode_frame, Frame, MessageType};

use crate::cmd::{FrameCommand, FrameDecodeArgs, FrameEncodeArgs};
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(command: FrameCommand, format: OutputFormat) -> CliResult<i32> {
    match command {
        FrameCommand::Encode(args) => encode(args, format),
        FrameCommand::Decode(args) => decode(args, format),
    }
}

fn encode(args: FrameEncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let message_type = parse_message_type(&args.message_type)?;
    let payload = parse_hex(&args.payload)
        .map_err(|err| CliError::new(USAGE, format!("--payload is not valid hex: {err}")))?;

    let frame = Frame::new(message_type, payload);
    let wire = frame
        .encode()
        .map_err(|err| frame_error("encode failed", err))?;
    print_frame(&frame, &wire, format);
    Ok(SUCCESS)
}

fn decode(args: FrameDecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let wire = parse_hex(&args.hex)
        .map_err(|err| CliError::new(DATA_INVALID, format!("frame is not valid hex: {err}")))?;
    let frame = decode_frame(&wire).map_err(|err| frame_error("decode failed", err))?;
    print_frame(&frame, &wire, format);
    Ok(SUCCESS)
}

fn parse_hex(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(compact)
}

fn parse_message_type(input: &str) -> CliResult<MessageType> {
    let lowered = input.trim().to_ascii_lowercase();
    let tag = match lowered.as_str() {
        "event" => return Ok(MessageType::Event),
        "command" => return Ok(MessageType::Command),
        "ack" => return Ok(MessageType::Ack),
        other => match other.strip_prefix("0x") {
            Some(hex_tag) => u8::from_str_radix(hex_tag, 16),
            None => other.parse::<u8>(),
        },
    };
    tag.map(MessageType::from_u8).map_err(|_| {
        CliError::new(
            USAGE,
            format!("unknown message type '{input}' (expected event, command, ack or 0-255)"),
        )
    })
}
