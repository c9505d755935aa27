use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use muonlink_frame::{ChipCommand, Frame, LinkStats, Rejection, COMMAND_SIZE};
use muonlink_transport::PortInfo;
use serde::Serialize;

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

#[derive(Serialize)]
struct FrameOutput<'a> {
    event: &'static str,
    source: &'a str,
    payload_size: usize,
    payload: String,
    payload_hex: String,
    checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, source: &str, chip_commands: bool, format: OutputFormat) {
    let payload = frame.payload.as_ref();
    let command = if chip_commands && payload.len() == COMMAND_SIZE {
        ChipCommand::from_payload(payload)
            .ok()
            .map(|cmd| cmd.to_string())
    } else {
        None
    };

    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                event: "frame",
                source,
                payload_size: payload.len(),
                payload: payload_preview(payload),
                payload_hex: hex_string(payload),
                checksum: frame.checksum().to_string(),
                command,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOURCE", "SIZE", "CHECKSUM", "PAYLOAD"])
                .add_row(vec![
                    source.to_string(),
                    payload.len().to_string(),
                    frame.checksum().to_string(),
                    command.unwrap_or_else(|| payload_preview(payload)),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let shown = match command {
                Some(cmd) => format!("command={cmd}"),
                None => format!("payload={}", payload_preview(payload)),
            };
            println!(
                "source={} size={} checksum={} {}",
                source,
                payload.len(),
                frame.checksum(),
                shown
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

#[derive(Serialize)]
struct RejectionOutput {
    event: &'static str,
    offset: usize,
    payload_size: usize,
    computed: String,
    received: String,
}

/// Rejections are diagnostics; raw output skips them.
pub fn print_rejection(rejection: &Rejection, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&RejectionOutput {
            event: "rejected",
            offset: rejection.span.offset,
            payload_size: rejection.span.payload_len,
            computed: rejection.computed.to_string(),
            received: rejection.received.to_string(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "rejected offset={} size={} computed={} received={}",
            rejection.span.offset,
            rejection.span.payload_len,
            rejection.computed,
            rejection.received
        ),
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct StatsOutput {
    event: &'static str,
    frames_decoded: u64,
    frames_rejected: u64,
    bytes_discarded: u64,
    bytes_pending: usize,
}

pub fn print_stats(stats: LinkStats, pending: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StatsOutput {
            event: "stats",
            frames_decoded: stats.frames_decoded,
            frames_rejected: stats.frames_rejected,
            bytes_discarded: stats.bytes_discarded,
            bytes_pending: pending,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["DECODED", "REJECTED", "DISCARDED", "PENDING"])
                .add_row(vec![
                    stats.frames_decoded.to_string(),
                    stats.frames_rejected.to_string(),
                    stats.bytes_discarded.to_string(),
                    pending.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "decoded={} rejected={} discarded={} pending={}",
            stats.frames_decoded, stats.frames_rejected, stats.bytes_discarded, pending
        ),
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct WireOutput {
    payload_size: usize,
    wire_size: usize,
    checksum: String,
    wire: String,
}

pub fn print_wire(frame: &Frame, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&WireOutput {
            payload_size: frame.payload.len(),
            wire_size: wire.len(),
            checksum: frame.checksum().to_string(),
            wire: hex_string(wire),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SIZE", "WIRE SIZE", "CHECKSUM", "WIRE"])
                .add_row(vec![
                    frame.payload.len().to_string(),
                    wire.len().to_string(),
                    frame.checksum().to_string(),
                    hex_string(wire),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", hex_string(wire)),
        OutputFormat::Raw => print_raw(wire),
    }
}

#[derive(Serialize)]
struct PortOutput {
    path: String,
    kind: &'static str,
    description: Option<String>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput> = ports
                .iter()
                .map(|port| PortOutput {
                    path: port.path.display().to_string(),
                    kind: port.kind,
                    description: port.description.clone(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.path.display().to_string(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                match &port.description {
                    Some(description) => {
                        println!("{} ({}, {})", port.path.display(), port.kind, description)
                    }
                    None => println!("{} ({})", port.path.display(), port.kind),
                }
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Printable text is shown as-is, anything else as hex.
fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(|c| c.is_control() && c != '\n' && c != '\t') => {
            text.to_string()
        }
        _ => hex_string(payload),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
