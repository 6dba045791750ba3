//! Read command implementation

use std::fs;
use std::path::Path;

use p2kflash_core::Slot;
use p2kflash_flash::{Job, JobOptions, JobOutput};
use p2kflash_serial::Connection;

/// Read one slot and save it to `output`
pub fn cmd_read(
    connection: &Connection,
    slot: Slot,
    output: &Path,
    options: JobOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = match super::run_on_board(connection, Job::Read { slot }, options)? {
        JobOutput::Image(image) => image,
        other => return Err(format!("unexpected job output: {:?}", other).into()),
    };

    fs::write(output, image.as_bytes())?;
    println!(
        "Read {} from {} to {}",
        super::format_size(image.len()),
        slot,
        output.display()
    );
    Ok(())
}
