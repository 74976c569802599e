use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use vehiclelink_frame::Frame;
use vehiclelink_link::{AlarmSource, CommandId, LinkNotification};
use vehiclelink_transport::PortInfo;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(header: Vec<&str>, rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manufacturer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<&'a str>,
}

impl<'a> From<&'a PortInfo> for PortOutput<'a> {
    fn from(port: &'a PortInfo) -> Self {
        let usb = port.usb.as_ref();
        Self {
            name: &port.name,
            kind: port.kind,
            vid: usb.map(|usb| format!("{:04x}", usb.vid)),
            pid: usb.map(|usb| format!("{:04x}", usb.pid)),
            serial_number: usb.and_then(|usb| usb.serial_number.as_deref()),
            manufacturer: usb.and_then(|usb| usb.manufacturer.as_deref()),
            product: usb.and_then(|usb| usb.product.as_deref()),
        }
    }
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports.iter().map(PortOutput::from).collect();
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => print_table(
            vec!["PORT", "KIND", "VID:PID", "MANUFACTURER", "PRODUCT"],
            rows.iter()
                .map(|row| {
                    vec![
                        row.name.to_string(),
                        row.kind.to_string(),
                        match (&row.vid, &row.pid) {
                            (Some(vid), Some(pid)) => format!("{vid}:{pid}"),
                            _ => "-".to_string(),
                        },
                        row.manufacturer.unwrap_or("-").to_string(),
                        row.product.unwrap_or("-").to_string(),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for row in &rows {
                println!("{} ({})", row.name, row.kind);
            }
        }
        OutputFormat::Raw => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }
}

#[derive(Serialize)]
struct NotificationOutput<'a> {
    name: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    voltage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<AlarmSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    silent_for_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl<'a> From<&'a LinkNotification> for NotificationOutput<'a> {
    fn from(notification: &'a LinkNotification) -> Self {
        let mut out = Self {
            name: notification.name(),
            timestamp: unix_millis(SystemTime::now()),
            voltage: None,
            source: None,
            message_type: None,
            payload: None,
            silent_for_ms: None,
            reason: None,
        };
        match notification {
            LinkNotification::Event(event) => {
                out.timestamp = unix_millis(event.timestamp);
                out.voltage = event.voltage();
                out.source = event.alarm_source();
            }
            LinkNotification::Unrecognized {
                message_type,
                payload,
            } => {
                out.message_type = Some(message_type.to_string());
                out.payload = Some(hex::encode_upper(payload));
            }
            LinkNotification::ConnectionLost { silent_for } => {
                out.silent_for_ms = Some(silent_for.as_millis());
            }
            LinkNotification::Disconnected { reason } => {
                out.reason = Some(reason.to_string());
            }
        }
        out
    }
}

impl NotificationOutput<'_> {
    fn detail(&self) -> String {
        let mut parts = Vec::new();
        if let Some(voltage) = self.voltage {
            parts.push(format!("voltage={voltage:.1}V"));
        }
        if let Some(source) = self.source {
            let source = match source {
                AlarmSource::DoorSensor => "door-sensor",
                AlarmSource::Motion => "motion",
            };
            parts.push(format!("source={source}"));
        }
        if let Some(message_type) = &self.message_type {
            parts.push(format!("type={message_type}"));
        }
        if let Some(payload) = &self.payload {
            parts.push(format!("payload={payload}"));
        }
        if let Some(ms) = self.silent_for_ms {
            parts.push(format!("silent_for={ms}ms"));
        }
        if let Some(reason) = &self.reason {
            parts.push(format!("reason={reason}"));
        }
        parts.join(" ")
    }
}

pub fn print_notification(notification: &LinkNotification, format: OutputFormat) {
    let out = NotificationOutput::from(notification);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            vec!["TIME", "NOTIFICATION", "DETAIL"],
            vec![vec![out.timestamp.clone(), out.name.to_string(), out.detail()]],
        ),
        OutputFormat::Pretty => {
            let detail = out.detail();
            if detail.is_empty() {
                println!("[{}] {}", out.timestamp, out.name);
            } else {
                println!("[{}] {} {}", out.timestamp, out.name, detail);
            }
        }
        OutputFormat::Raw => println!("{}", out.name),
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    port: &'a str,
    command: CommandId,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
    acknowledged: bool,
}

pub fn print_command_ack(port: &str, command: CommandId, duration: Option<u32>, format: OutputFormat) {
    let out = CommandOutput {
        port,
        command,
        duration,
        acknowledged: true,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            vec!["PORT", "COMMAND", "DURATION", "ACKNOWLEDGED"],
            vec![vec![
                port.to_string(),
                command.to_string(),
                duration.map_or_else(|| "-".to_string(), |d| d.to_string()),
                "yes".to_string(),
            ]],
        ),
        OutputFormat::Pretty => println!("{command} acknowledged by {port}"),
        OutputFormat::Raw => println!("ok"),
    }
}

#[derive(Serialize)]
struct FrameOutput {
    message_type: String,
    type_tag: u8,
    length: usize,
    payload: String,
    frame: String,
}

pub fn print_frame(frame: &Frame, wire: &[u8], format: OutputFormat) {
    let out = FrameOutput {
        message_type: frame.message_type.to_string(),
        type_tag: frame.message_type.as_u8(),
        length: frame.payload.len(),
        payload: hex::encode_upper(&frame.payload),
        frame: hex::encode_upper(wire),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            vec!["TYPE", "TAG", "LENGTH", "PAYLOAD", "FRAME"],
            vec![vec![
                out.message_type.clone(),
                format!("0x{:02X}", out.type_tag),
                out.length.to_string(),
                out.payload.clone(),
                out.frame.clone(),
            ]],
        ),
        OutputFormat::Pretty => println!(
            "type={} (0x{:02X}) length={} payload={} frame={}",
            out.message_type, out.type_tag, out.length, out.payload, out.frame
        ),
        OutputFormat::Raw => print_raw(wire),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn unix_millis(at: SystemTime) -> String {
    at.duration_since(UNIX_EPOCH)
        .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
        .unwrap_or_else(|_| "0.000".to_string())
}
