//! CLI argument parsing

use clap::{Parser, Subcommand};
use p2kflash_core::cartridge::SLOT_COUNT;
use p2kflash_core::Slot;
use p2kflash_serial::Connection;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a slot number and check it is addressable by the board
fn parse_slot(s: &str) -> Result<Slot, String> {
    let index = parse_hex_u32(s)?;
    u8::try_from(index)
        .ok()
        .and_then(Slot::new)
        .ok_or_else(|| format!("Slot must be 0..{}, got {}", SLOT_COUNT, index))
}

fn parse_connection(s: &str) -> Result<Connection, String> {
    Connection::parse(s)
}

#[derive(Parser)]
#[command(name = "p2kflash")]
#[command(author, version, about = "P2000T flash cartridge reader/writer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML file overriding serial timing and port retry settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Board connection shared by the cartridge commands
#[derive(clap::Args, Debug, Clone)]
pub struct PortArgs {
    /// Board connection: dev=<path>[:baud] or ip=<host>:<port>
    #[arg(short, long, value_parser = parse_connection)]
    pub port: Connection,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show board identity and flash chip
    Info {
        #[command(flatten)]
        port: PortArgs,
    },

    /// Read a cartridge slot to a file
    Read {
        #[command(flatten)]
        port: PortArgs,

        /// Slot to read (0-3)
        #[arg(short, long, value_parser = parse_slot)]
        slot: Slot,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a file to a cartridge slot
    Write {
        #[command(flatten)]
        port: PortArgs,

        /// Slot to write (0-3)
        #[arg(short, long, value_parser = parse_slot)]
        slot: Slot,

        /// Input file path (at most 16 KiB, zero padded)
        #[arg(short, long)]
        input: PathBuf,

        /// Don't read the slot back after writing
        #[arg(long)]
        no_verify: bool,
    },

    /// Compare a cartridge slot with a file
    Verify {
        #[command(flatten)]
        port: PortArgs,

        /// Slot to compare (0-3)
        #[arg(short, long, value_parser = parse_slot)]
        slot: Slot,

        /// Reference file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Erase a cartridge slot
    Erase {
        #[command(flatten)]
        port: PortArgs,

        /// Slot to erase (0-3)
        #[arg(short, long, value_parser = parse_slot)]
        slot: Slot,
    },

    /// List the files stored in a cartridge image
    Dir {
        /// Cartridge image file
        image: PathBuf,

        /// Also check that every bank header is formatted
        #[arg(long)]
        check: bool,
    },

    /// Extract one file from a cartridge image as a media image
    Extract {
        /// Cartridge image file
        image: PathBuf,

        /// Entry index as shown by `dir`
        #[arg(short = 'n', long)]
        index: usize,

        /// Output media image (.cas)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build a formatted cartridge image from media images
    Pack {
        /// Output cartridge image
        #[arg(short, long)]
        output: PathBuf,

        /// Media images (.cas) to store, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}
