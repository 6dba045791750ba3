//! Board and chip identification

use p2kflash_flash::{Job, JobOptions, JobOutput};
use p2kflash_serial::Connection;

/// Print the board identity string and the flash chip
pub fn cmd_info(connection: &Connection, options: JobOptions) -> Result<(), Box<dyn std::error::Error>> {
    let report = match super::run_on_board(connection, Job::Probe, options)? {
        JobOutput::Probe(report) => report,
        other => return Err(format!("unexpected job output: {:?}", other).into()),
    };

    println!("Board:     {}", report.board.raw);
    println!("Model:     {}", report.board.model);
    println!("Chipset:   {}", report.board.chipset);
    if let Some(firmware) = &report.board.firmware {
        println!("Firmware:  {}", firmware);
    }
    println!("Chip:      {}", report.chip);
    if !report.chip.is_supported() {
        log::warn!("Chip is not supported, read/write/erase will refuse it");
    }
    Ok(())
}
