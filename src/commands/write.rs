//! Write command implementation

use std::fs;
use std::path::Path;

use p2kflash_core::Slot;
use p2kflash_flash::{Job, JobOptions, JobOutput};
use p2kflash_serial::Connection;

/// Erase a slot and program `input` into it
///
/// Blocks the board refuses are skipped and listed at the end; the
/// read-back (unless disabled) turns them into a verification failure.
pub fn cmd_write(
    connection: &Connection,
    slot: Slot,
    input: &Path,
    verify: bool,
    options: JobOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = fs::read(input)?;
    log::info!("Loaded {} from {}", super::format_size(image.len()), input.display());

    let job = Job::Flash { slot, image, verify };
    let report = match super::run_on_board(connection, job, options)? {
        JobOutput::Flash(report) => report,
        other => return Err(format!("unexpected job output: {:?}", other).into()),
    };

    println!("Chip: {}", report.chip);
    println!(
        "Erased {} sector(s), programmed {}",
        report.erased_sectors.len(),
        report.slot
    );
    if !report.skipped.is_empty() {
        println!("{} block(s) skipped:", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}", skipped);
        }
    }
    if report.verified {
        println!("Verification passed");
    }
    Ok(())
}
