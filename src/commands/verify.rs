//! Verify command implementation

use std::fs;
use std::path::Path;

use p2kflash_core::Slot;
use p2kflash_flash::{Job, JobOptions};
use p2kflash_serial::Connection;

/// Compare a slot with `input` without writing anything
pub fn cmd_verify(
    connection: &Connection,
    slot: Slot,
    input: &Path,
    options: JobOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = fs::read(input)?;
    super::run_on_board(connection, Job::Verify { slot, expected }, options)?;
    println!("{} matches {}", slot, input.display());
    Ok(())
}
