//! CLI command implementations
//!
//! Cartridge commands (`info`, `read`, `write`, `verify`, `erase`) build a
//! [`Job`], run it on a worker thread and render its progress. Image
//! commands (`dir`, `extract`, `pack`) work on files only.

mod dir;
mod erase;
mod extract;
mod info;
mod pack;
mod read;
mod verify;
mod write;

pub use dir::cmd_dir;
pub use erase::cmd_erase;
pub use extract::cmd_extract;
pub use info::cmd_info;
pub use pack::cmd_pack;
pub use read::cmd_read;
pub use verify::cmd_verify;
pub use write::cmd_write;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use p2kflash_flash::{Job, JobOptions, JobOutput, Phase, Progress, ProgressSink, SharedPort, Worker};
use p2kflash_serial::Connection;

/// Create a progress bar for blocks or sectors
fn create_progress_bar_with_phase(
    total: u64,
    phase: Phase,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let unit = match phase {
        Phase::Erase => "sectors",
        // sector erases are counted along with the blocks
        Phase::Write => "steps",
        _ => "blocks",
    };
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {{msg}} {}",
                unit, phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Renders job progress as one bar per phase
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    phase: Option<Phase>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            phase: None,
        }
    }

    fn create_bar(&mut self, total: u64, phase: Phase) {
        self.phase = Some(phase);
        let pb = self.multi.add(
            create_progress_bar_with_phase(total, phase)
                .unwrap_or_else(|_| ProgressBar::new(total)),
        );
        self.current_bar = Some(pb);
    }

    fn finish(&mut self) {
        if let (Some(pb), Some(phase)) = (self.current_bar.take(), self.phase) {
            pb.finish_with_message(format!("{} complete", phase));
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for IndicatifProgress {
    fn update(&mut self, progress: &Progress) {
        if progress.completed == 0 || self.phase != Some(progress.phase) {
            self.finish();
            self.create_bar(progress.total as u64, progress.phase);
        }
        if let Some(pb) = &self.current_bar {
            pb.set_position(progress.completed as u64);
            if let Some(remaining) = progress.remaining {
                pb.set_message(format!("(~{}s left)", remaining.as_secs()));
            }
        }
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
    }
}

/// Open the board connection, run `job` on a worker thread and wait for it
fn run_on_board(
    connection: &Connection,
    job: Job,
    options: JobOptions,
) -> Result<JobOutput, Box<dyn std::error::Error>> {
    log::info!("Using {}", connection);
    let port = SharedPort::new(connection.transport()?);

    let handle = Worker::spawn(port, job, options);
    let mut progress = IndicatifProgress::new();
    let output = handle.wait_with(&mut progress);
    progress.finish();
    Ok(output?)
}

/// Format a byte count for display
fn format_size(bytes: usize) -> String {
    if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(16384), "16 KiB");
        assert_eq!(format_size(1000), "1000 bytes");
        assert_eq!(format_size(0), "0 bytes");
    }

    #[test]
    fn test_progress_starts_new_bar_per_phase() {
        let mut progress = IndicatifProgress::new();
        let mut update = |phase, completed, total| {
            progress.update(&Progress {
                phase,
                completed,
                total,
                remaining: Some(Duration::from_secs(1)),
            });
        };
        update(Phase::Erase, 0, 4);
        update(Phase::Erase, 4, 4);
        update(Phase::Write, 0, 64);
        update(Phase::Write, 10, 64);
        drop(update);

        assert_eq!(progress.phase, Some(Phase::Write));
        let pb = progress.current_bar.as_ref().unwrap();
        assert_eq!(pb.length(), Some(64));
        assert_eq!(pb.position(), 10);
    }

    #[test]
    fn test_flash_job_renders_through_bars() {
        use p2kflash_core::Slot;
        use p2kflash_dummy::DummyBoard;
        use p2kflash_serial::NoDelay;

        let board = DummyBoard::new_default();
        let port = SharedPort::new(board.clone());
        let job = Job::Flash {
            slot: Slot::new(1).unwrap(),
            image: vec![0x5A; 1000],
            verify: true,
        };

        let handle = Worker::spawn_with_delay(port, job, JobOptions::default(), NoDelay);
        let mut progress = IndicatifProgress::new();
        let output = handle.wait_with(&mut progress).unwrap();

        assert!(matches!(output, JobOutput::Flash(ref report) if report.verified));
        assert_eq!(progress.phase, Some(Phase::Verify));
        assert_eq!(board.flash()[0x4000], 0x5A);
        assert_eq!(board.flash()[0x4000 + 1000], 0x00);
    }
}
