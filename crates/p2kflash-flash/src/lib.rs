//! Cartridge jobs on top of the reader board protocol
//!
//! This crate sequences flash protocol operations into whole-slot jobs and
//! makes sure only one job talks to the board at a time. The CLI only
//! needs the types re-exported here.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CLI (bin/p2kflash)                    │
//! │  - Builds a Job, spawns it, renders JobEvents                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   p2kflash-flash (this crate)                │
//! │  - SharedPort / PortLease: exclusive, bounded-wait access    │
//! │  - read / flash / verify / erase / probe jobs                │
//! │  - Worker: one thread per job, mpsc event stream             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │    p2kflash-serial       │   │  p2kflash-core           │
//! │  - Transport             │   │  - Slot, RawImage        │
//! │  - CommandChannel        │   │  - ChipIdentity          │
//! │  - Cartridge             │   │  - directory codec       │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use p2kflash_core::Slot;
//! use p2kflash_flash::{Job, JobOptions, JobOutput, SharedPort, Worker};
//! use p2kflash_serial::Connection;
//!
//! let transport = Connection::parse("dev=/dev/ttyACM0")?.transport()?;
//! let port = SharedPort::new(transport);
//! let slot = Slot::new(0).ok_or("bad slot")?;
//!
//! let handle = Worker::spawn(port, Job::Read { slot }, JobOptions::default());
//! if let JobOutput::Image(image) = handle.wait()? {
//!     std::fs::write("slot0.bin", image.as_bytes())?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod jobs;
mod port;
mod progress;
mod worker;

pub use error::{JobError, Result, SkippedBlock};
pub use jobs::{
    erase_slot, flash_cartridge, pad_image, probe_board, read_cartridge, verify_cartridge,
    EraseReport, FlashReport, ProbeReport,
};
pub use port::{LeasePolicy, PortLease, SharedPort};
pub use progress::{estimate_remaining, Eta, NoProgress, Phase, Progress, ProgressSink};
pub use worker::{run_job, Job, JobEvent, JobHandle, JobOptions, JobOutput, JobState, Worker};
