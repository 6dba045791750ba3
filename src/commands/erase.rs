//! Erase command implementation

use p2kflash_core::Slot;
use p2kflash_flash::{Job, JobOptions, JobOutput};
use p2kflash_serial::Connection;

pub fn cmd_erase(
    connection: &Connection,
    slot: Slot,
    options: JobOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = match super::run_on_board(connection, Job::Erase { slot }, options)? {
        JobOutput::Erase(report) => report,
        other => return Err(format!("unexpected job output: {:?}", other).into()),
    };

    println!("Chip: {}", report.chip);
    for (sector, cycles) in &report.cycles {
        println!("  sector {:3}: {} erase cycles", sector, cycles);
    }
    println!("Erased {}", report.slot);
    Ok(())
}
