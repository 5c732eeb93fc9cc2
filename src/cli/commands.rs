use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use crate::core::{
    bulk::{read_data, write_data},
    commands::Transport,
    config::{
        SessionConfig, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_TRANSFER_LENGTH, DEFAULT_READBACK_DELAY_MS,
        DEFAULT_START_BLOCK, DEFAULT_UID_LENGTH,
    },
    device::DeviceSession,
    reader::PcscReader,
    session::CardProvider,
    tag::{get_tag_type, get_uid, set_buzzer},
    tag_reader::{ReadResult, TagEvent, TagReader},
    utils::{format_ascii, format_block_dump, format_hex, format_hex_spaced, parse_hex},
};

#[derive(Parser)]
#[command(name = "ntag-rw")]
#[command(about = "Read and write NTAG21x tags through a PC/SC contactless reader")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging (shows every command exchanged)
    #[arg(short, long, global = true)]
    pub debug: bool,
}

/// Transfer area and reader settings shared by all commands
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Size of the transfer area in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_TRANSFER_LENGTH)]
    pub max_length: usize,

    /// Bytes per tag block
    #[arg(long, global = true, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// First block of the transfer area
    #[arg(long, global = true, default_value_t = DEFAULT_START_BLOCK)]
    pub start_block: u8,

    /// Delay between writing and verifying, in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_READBACK_DELAY_MS)]
    pub readback_delay_ms: u64,

    /// UID length in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_UID_LENGTH)]
    pub uid_length: usize,

    /// Leave the detection buzzer on (watch mode)
    #[arg(long, global = true)]
    pub buzzer: bool,
}

impl SessionArgs {
    pub fn to_config(&self) -> Result<SessionConfig> {
        let config = SessionConfig::new(
            self.buzzer,
            self.max_length,
            self.block_size,
            self.start_block,
            self.readback_delay_ms,
        )
        .with_uid_length(self.uid_length);

        config.validate().context("Invalid session settings")?;
        Ok(config)
    }
}

/// Where a write payload comes from
#[derive(Args, Debug, Clone, Default)]
pub struct PayloadArgs {
    /// Text to write
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub text: Option<String>,

    /// Bytes to write, in hex
    #[arg(long, conflicts_with = "file")]
    pub hex: Option<String>,

    /// File whose contents are written
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.hex.is_none() && self.file.is_none()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available PCSC readers
    List {
        /// Show detailed information about readers
        #[arg(short = 'l', long)]
        detailed: bool,
    },

    /// Print the tag UID
    Uid {
        /// Reader name or index (use 'list' to see available readers)
        reader: String,
    },

    /// Identify the tag type
    Type {
        /// Reader name or index
        reader: String,
    },

    /// Read the transfer area
    Read {
        /// Reader name or index
        reader: String,

        /// Output format
        #[arg(short, long, default_value = "dump")]
        format: DataFormat,
    },

    /// Write the transfer area and verify it
    Write {
        /// Reader name or index
        reader: String,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Switch the detection buzzer on or off
    Buzzer {
        /// Reader name or index
        reader: String,

        /// "on" or "off"
        state: Toggle,
    },

    /// Wait for tags and read each one as it is presented
    Watch {
        /// Print each read as a JSON line
        #[arg(long)]
        json: bool,

        /// Stop after this many reads
        #[arg(short = 'n', long)]
        count: Option<usize>,

        #[command(flatten)]
        payload: PayloadArgs,
    },
}

#[derive(Clone, Debug)]
pub enum DataFormat {
    Hex,
    Ascii,
    Dump,
    Json,
}

impl std::str::FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hex" => Ok(DataFormat::Hex),
            "ascii" => Ok(DataFormat::Ascii),
            "dump" => Ok(DataFormat::Dump),
            "json" => Ok(DataFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl std::str::FromStr for Toggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" | "true" | "1" => Ok(Toggle::On),
            "off" | "false" | "0" => Ok(Toggle::Off),
            _ => Err(format!("Invalid state: {s} (expected on/off)")),
        }
    }
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug {
        log::LevelFilter::Debug
    } else if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config = cli.session.to_config()?;

    match cli.command {
        Commands::List { detailed } => cmd_list(detailed),
        Commands::Uid { reader } => cmd_uid(&reader, &config),
        Commands::Type { reader } => cmd_type(&reader),
        Commands::Read { reader, format } => cmd_read(&reader, &config, &format),
        Commands::Write { reader, payload } => cmd_write(&reader, &config, &payload),
        Commands::Buzzer { reader, state } => cmd_buzzer(&reader, state),
        Commands::Watch {
            json,
            count,
            payload,
        } => cmd_watch(config, json, count, &payload),
    }
}

/// Build the bytes to write from whichever payload option was given
pub fn load_payload(args: &PayloadArgs) -> Result<Vec<u8>> {
    if let Some(text) = &args.text {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex).context("Failed to parse payload hex string");
    }
    if let Some(path) = &args.file {
        return read_payload_file(path);
    }
    bail!("No payload given (use --text, --hex or --file)")
}

fn read_payload_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read payload file: {}", path.display()))
}

fn cmd_list(detailed: bool) -> Result<()> {
    let reader = PcscReader::establish().context("Failed to initialize PCSC")?;

    let readers = reader.list_readers().context("Failed to list readers")?;

    if readers.is_empty() {
        println!("No PCSC readers found.");
        return Ok(());
    }

    println!("Available PCSC readers:");
    for (i, reader_info) in readers.iter().enumerate() {
        if detailed {
            println!("  [{}] {}", i, reader_info.name);
            println!(
                "      Status: {}",
                if reader_info.card_present {
                    "Tag present"
                } else {
                    "No tag"
                }
            );
            if let Some(ref atr) = reader_info.atr {
                println!("      ATR: {}", format_hex_spaced(atr));
            }
        } else if reader_info.card_present {
            println!("  [{}] {} [TAG]", i, reader_info.name);
        } else {
            println!("  [{}] {}", i, reader_info.name);
        }
    }

    Ok(())
}

fn cmd_uid(reader_name: &str, config: &SessionConfig) -> Result<()> {
    let uid = with_card(reader_name, |card| {
        get_uid(card, config.uid_length).context("Failed to read UID")
    })?;
    println!("{}", format_hex(&uid));
    Ok(())
}

fn cmd_type(reader_name: &str) -> Result<()> {
    let tag_type = with_card(reader_name, |card| Ok(get_tag_type(card)))?;
    println!("{tag_type}");
    Ok(())
}

fn cmd_read(reader_name: &str, config: &SessionConfig, format: &DataFormat) -> Result<()> {
    let data = with_card(reader_name, |card| {
        read_data(card, config).context("Failed to read tag data")
    })?;

    match format {
        DataFormat::Hex => println!("{}", format_hex(&data)),
        DataFormat::Ascii => println!("{}", format_ascii(&data)),
        DataFormat::Dump => println!(
            "{}",
            format_block_dump(&data, config.start_block, config.block_size)
        ),
        DataFormat::Json => {
            let result = ReadResult {
                reader: reader_name.to_string(),
                data,
                present: true,
                read_at: Some(chrono::Utc::now()),
                ..Default::default()
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

fn cmd_write(reader_name: &str, config: &SessionConfig, payload: &PayloadArgs) -> Result<()> {
    let payload = load_payload(payload)?;
    if payload.len() > config.max_transfer_length {
        println!(
            "Payload is {} bytes, only the first {} will be written",
            payload.len(),
            config.max_transfer_length
        );
    }

    let verified = with_card(reader_name, |card| {
        write_data(card, config, &payload).context("Failed to write tag data")
    })?;

    if !verified {
        bail!("Readback did not match the written data");
    }
    println!("Wrote {} bytes, verified", config.max_transfer_length);
    Ok(())
}

fn cmd_buzzer(reader_name: &str, state: Toggle) -> Result<()> {
    with_card(reader_name, |card| {
        set_buzzer(card, state == Toggle::On).context("Failed to set buzzer")
    })?;
    println!("Buzzer {}", if state == Toggle::On { "on" } else { "off" });
    Ok(())
}

fn cmd_watch(
    config: SessionConfig,
    json: bool,
    count: Option<usize>,
    payload: &PayloadArgs,
) -> Result<()> {
    let payload = if payload.is_empty() {
        None
    } else {
        Some(load_payload(payload)?)
    };

    let device = DeviceSession::initialize(config.clone()).context("Failed to start card monitor")?;
    let DeviceSession {
        mut session,
        signals,
        monitor,
        readers,
    } = device;

    let (events_tx, events_rx) = mpsc::channel();
    let mut handler = TagReader::new(config, events_tx);
    if let Some(payload) = payload {
        handler = handler.with_payload(payload);
    }

    let dispatcher = thread::Builder::new()
        .name("tag-dispatcher".into())
        .spawn(move || session.run(signals, &mut handler))
        .context("Failed to start dispatcher")?;

    if !json {
        println!("Watching {} reader(s), present a tag...", readers.len());
    }

    let mut reads = 0;
    for event in events_rx {
        match event {
            TagEvent::Read(result) => {
                print_read_result(&result, json)?;
                reads += 1;
                if count.is_some_and(|n| reads >= n) {
                    break;
                }
            }
            TagEvent::Removed { reader } => {
                if !json {
                    println!("Tag removed from {reader}");
                }
            }
        }
    }

    monitor.stop();
    if dispatcher.join().is_err() {
        bail!("Dispatcher thread panicked");
    }
    Ok(())
}

fn print_read_result(result: &ReadResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
        return Ok(());
    }

    println!("UID:  {}", result.uid_hex());
    println!("Type: {}", result.tag_type);
    println!("Data: {}", result.text());
    if let Some(verified) = result.verified {
        println!(
            "Write: {}",
            if verified { "verified" } else { "MISMATCH" }
        );
    }
    println!();
    Ok(())
}

/// Connect to one reader, run `op` on the tag, and always release the handle
fn with_card<R>(name_or_index: &str, op: impl FnOnce(&dyn Transport) -> Result<R>) -> Result<R> {
    let reader = PcscReader::establish().context("Failed to initialize PCSC")?;
    let reader_name = resolve_reader_name(&reader, name_or_index)?;

    let card = reader
        .connect(&reader_name)
        .with_context(|| format!("Failed to connect to reader: {reader_name}"))?;
    let result = op(&card);
    reader.release(card);

    result
}

fn resolve_reader_name(reader: &PcscReader, name_or_index: &str) -> Result<String> {
    // Try to parse as index first
    if let Ok(index) = name_or_index.parse::<usize>() {
        let readers = reader.reader_names()?;
        if readers.is_empty() {
            bail!("No PCSC readers found");
        }
        return readers.get(index).cloned().with_context(|| {
            format!(
                "Reader index {} out of range (0-{})",
                index,
                readers.len() - 1
            )
        });
    }

    Ok(name_or_index.to_string())
}
