use clap::{Args, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use muonlink_frame::{ChipCommand, FrameConfig, FrameReader, FrameWriter, DEFAULT_MAX_BUFFERED};
use muonlink_transport::{LinkStream, SerialConfig, SerialLink, DEFAULT_BAUD_RATE};

use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod encode;
pub mod listen;
pub mod ports;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a single frame.
    Send(SendArgs),
    /// Listen and print received frames.
    Listen(ListenArgs),
    /// Send every received payload back unchanged.
    Echo(EchoArgs),
    /// Print the wire bytes of a payload without opening a port.
    Encode(EncodeArgs),
    /// Decode captured wire bytes given as hex.
    Decode(DecodeArgs),
    /// List serial ports visible to this host.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SerialArgs {
    /// Serial device (e.g. /dev/ttyACM0, COM3).
    pub port: PathBuf,
    /// Line speed in baud.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Read timeout per poll (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub timeout: String,
    /// Pause after opening the port; the board resets when the line opens.
    #[arg(long, default_value = "1300ms")]
    pub settle: String,
    /// Receive buffer ceiling in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BUFFERED)]
    pub max_buffered: usize,
}

impl SerialArgs {
    pub fn port_name(&self) -> String {
        self.port.display().to_string()
    }

    /// Open the port and split it into a frame reader and writer.
    pub fn open(&self) -> CliResult<(FrameReader<LinkStream>, FrameWriter<LinkStream>)> {
        let read_timeout = parse_duration(&self.timeout)?;
        if read_timeout.is_zero() {
            return Err(CliError::new(USAGE, "--timeout must be greater than zero"));
        }
        let serial_config = SerialConfig {
            baud_rate: self.baud,
            read_timeout,
            settle_delay: parse_duration(&self.settle)?,
            ..SerialConfig::default()
        };

        let stream = SerialLink::open_with_config(&self.port, &serial_config)
            .map_err(|err| transport_error("open failed", err))?;
        let write_half = stream
            .try_clone()
            .map_err(|err| transport_error("open failed", err))?;

        let frame_config = FrameConfig {
            max_buffered: self.max_buffered,
            read_timeout: Some(read_timeout),
            ..FrameConfig::default()
        };
        let reader = FrameReader::with_config_link(stream, frame_config.clone())
            .map_err(|err| frame_error("open failed", err))?;
        let writer = FrameWriter::with_config(write_half, frame_config);
        Ok((reader, writer))
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file", "chip"])]
    pub data: Option<String>,
    /// Payload as hex bytes (e.g. "01 2f ff" or 012fff).
    #[arg(long, conflicts_with_all = ["data", "file", "chip"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex", "chip"])]
    pub file: Option<PathBuf>,
    /// Chip command payload.
    #[arg(
        long = "command",
        value_name = "MUX:CMD:DATA:CHIP",
        conflicts_with_all = ["data", "hex", "file"]
    )]
    pub chip: Option<String>,
}

impl PayloadArgs {
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(hex) = &self.hex {
            return parse_hex(hex);
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        if let Some(chip) = &self.chip {
            let command: ChipCommand = chip
                .parse()
                .map_err(|err| frame_error("--command", err))?;
            return Ok(command.to_payload().to_vec());
        }
        Ok(Vec::new())
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub serial: SerialArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Wait for one reply frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub serial: SerialArgs,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Show 4-byte payloads as chip commands.
    #[arg(long)]
    pub chip_commands: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub serial: SerialArgs,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Captured bytes as hex; several arguments are concatenated.
    #[arg(required = true, num_args = 1..)]
    pub input: Vec<String>,
    /// Receive buffer ceiling in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BUFFERED)]
    pub max_buffered: usize,
    /// Show 4-byte payloads as chip commands.
    #[arg(long)]
    pub chip_commands: bool,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds. Zero is allowed.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

/// Parse hex bytes. Whitespace, `:` and `,` separators and `0x` prefixes are
/// accepted.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let mut digits = String::with_capacity(input.len());
    for token in input.split(|c: char| c.is_whitespace() || c == ':' || c == ',') {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        digits.push_str(token);
    }

    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, format!("invalid hex byte in {input:?}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input has an odd number of digits: {input:?}"),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte in {input:?}")))
        })
        .collect()
}
