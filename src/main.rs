//! p2kflash - Reader/writer for P2000T flash cartridges
//!
//! Talks to the cartridge reader board over a serial port (or a TCP bridge)
//! to read, write, verify and erase 16 KiB cartridge slots, and works on
//! cartridge image files: listing the stored files, extracting them as
//! media images, and packing media images into a new cartridge image.
//!
//! # Architecture
//!
//! Cartridge commands build a `Job` and hand it to a worker thread from
//! `p2kflash-flash`, which leases the port, runs the protocol from
//! `p2kflash-serial`, and streams progress back for the progress bars.
//! Image commands only use the directory codec in `p2kflash-core`.

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG still wins over -v
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { port } => commands::cmd_info(&port.port, options),
        Commands::Read { port, slot, output } => {
            commands::cmd_read(&port.port, slot, &output, options)
        }
        Commands::Write {
            port,
            slot,
            input,
            no_verify,
        } => commands::cmd_write(&port.port, slot, &input, !no_verify, options),
        Commands::Verify { port, slot, input } => {
            commands::cmd_verify(&port.port, slot, &input, options)
        }
        Commands::Erase { port, slot } => commands::cmd_erase(&port.port, slot, options),
        Commands::Dir { image, check } => commands::cmd_dir(&image, check),
        Commands::Extract {
            image,
            index,
            output,
        } => commands::cmd_extract(&image, index, &output),
        Commands::Pack { output, inputs } => commands::cmd_pack(&output, &inputs),
    }
}
