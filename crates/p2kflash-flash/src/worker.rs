//! Running jobs on their own thread
//!
//! A job takes the port lease, builds a [`Cartridge`] over it, runs one
//! orchestrator and releases the lease. [`Worker`] does this on a separate
//! thread and streams [`JobEvent`]s back to the caller. There is no way to
//! interrupt a running job: [`JobHandle::abandon`] only stops listening,
//! and the port stays busy until the job has closed it.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use p2kflash_core::cartridge::SLOT_SIZE;
use p2kflash_core::{RawImage, Slot};
use p2kflash_serial::{Cartridge, ChannelConfig, CommandChannel, Delay, ThreadDelay, Transport};

use crate::error::{JobError, Result};
use crate::jobs::{
    erase_slot, flash_cartridge, probe_board, read_cartridge, verify_cartridge, EraseReport,
    FlashReport, ProbeReport,
};
use crate::port::{LeasePolicy, SharedPort};
use crate::progress::{Progress, ProgressSink};

/// A unit of work on one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Read board identity and chip id
    Probe,
    /// Read a slot
    Read {
        /// Slot to read
        slot: Slot,
    },
    /// Erase, program and optionally verify a slot
    Flash {
        /// Slot to write
        slot: Slot,
        /// Up to 16 KiB of data
        image: Vec<u8>,
        /// Read back and compare afterwards
        verify: bool,
    },
    /// Compare a slot with an image
    Verify {
        /// Slot to compare
        slot: Slot,
        /// Up to 16 KiB of expected data
        expected: Vec<u8>,
    },
    /// Erase a slot
    Erase {
        /// Slot to erase
        slot: Slot,
    },
}

impl Job {
    /// Short name, used for logging and the thread name
    pub fn name(&self) -> &'static str {
        match self {
            Job::Probe => "probe",
            Job::Read { .. } => "read",
            Job::Flash { .. } => "flash",
            Job::Verify { .. } => "verify",
            Job::Erase { .. } => "erase",
        }
    }

    /// Reject input that can be judged without the board
    fn validate(&self) -> Result<()> {
        let data = match self {
            Job::Flash { image, .. } => image,
            Job::Verify { expected, .. } => expected,
            _ => return Ok(()),
        };
        if data.len() > SLOT_SIZE {
            return Err(JobError::ImageTooLarge {
                len: data.len(),
                capacity: SLOT_SIZE,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Probe => f.write_str("probe"),
            Job::Read { slot } | Job::Erase { slot } | Job::Verify { slot, .. } => {
                write!(f, "{} {}", self.name(), slot)
            }
            Job::Flash { slot, image, .. } => write!(f, "flash {} ({} bytes)", slot, image.len()),
        }
    }
}

/// What a finished job produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// Result of [`Job::Probe`]
    Probe(ProbeReport),
    /// Result of [`Job::Read`]
    Image(RawImage),
    /// Result of [`Job::Flash`]
    Flash(FlashReport),
    /// Result of [`Job::Verify`]
    Verified,
    /// Result of [`Job::Erase`]
    Erase(EraseReport),
}

/// Settings shared by all jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Command channel timing
    pub channel: ChannelConfig,
    /// Port lease retries
    pub lease: LeasePolicy,
}

/// Run a job on the current thread
///
/// Input is validated before the port is touched. The lease is released
/// whether the job succeeds or not.
pub fn run_job<T: Transport, D: Delay>(
    port: &SharedPort<T>,
    job: Job,
    options: &JobOptions,
    mut delay: D,
    progress: &mut dyn ProgressSink,
) -> Result<JobOutput> {
    job.validate()?;
    log::debug!("Starting {}", job);

    let mut lease = port.acquire(&options.lease, &mut delay)?;
    let result = {
        let channel = CommandChannel::with_delay(&mut *lease, &mut delay, options.channel);
        let mut cart = Cartridge::from_channel(channel);
        match job {
            Job::Probe => probe_board(&mut cart).map(JobOutput::Probe),
            Job::Read { slot } => read_cartridge(&mut cart, slot, progress).map(JobOutput::Image),
            Job::Flash {
                slot,
                image,
                verify,
            } => flash_cartridge(&mut cart, slot, &image, verify, progress).map(JobOutput::Flash),
            Job::Verify { slot, expected } => {
                verify_cartridge(&mut cart, slot, &expected, progress).map(|()| JobOutput::Verified)
            }
            Job::Erase { slot } => erase_slot(&mut cart, slot, progress).map(JobOutput::Erase),
        }
    };
    let released = lease.release();

    let output = result?;
    released?;
    Ok(output)
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Spawned, not yet running
    NotStarted,
    /// Holding (or waiting for) the port
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// Notification from a running job
#[derive(Debug)]
pub enum JobEvent {
    /// The worker thread picked up the job
    Started,
    /// A block or sector is done
    Progress(Progress),
    /// Terminal result; always the last event
    Finished(Result<JobOutput>),
}

struct EventSink {
    tx: Sender<JobEvent>,
}

impl ProgressSink for EventSink {
    fn update(&mut self, progress: &Progress) {
        // Nobody listening is fine
        let _ = self.tx.send(JobEvent::Progress(*progress));
    }
}

fn set_state(state: &Mutex<JobState>, value: JobState) {
    *state.lock().unwrap_or_else(|e| e.into_inner()) = value;
}

/// Spawns jobs on worker threads
pub struct Worker;

impl Worker {
    /// Run `job` on a new thread, sleeping while polling the port
    pub fn spawn<T: Transport + 'static>(
        port: SharedPort<T>,
        job: Job,
        options: JobOptions,
    ) -> JobHandle {
        Self::spawn_with_delay(port, job, options, ThreadDelay)
    }

    /// Run `job` on a new thread with an explicit delay implementation
    pub fn spawn_with_delay<T: Transport + 'static, D: Delay + 'static>(
        port: SharedPort<T>,
        job: Job,
        options: JobOptions,
        delay: D,
    ) -> JobHandle {
        let (tx, rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(JobState::NotStarted));
        let name = job.name();

        let thread_state = Arc::clone(&state);
        let thread_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("p2kflash-{}", name))
            .spawn(move || {
                set_state(&thread_state, JobState::Running);
                let _ = thread_tx.send(JobEvent::Started);

                let mut sink = EventSink {
                    tx: thread_tx.clone(),
                };
                let result = run_job(&port, job, &options, delay, &mut sink);
                match &result {
                    Ok(_) => {
                        log::debug!("{} job completed", name);
                        set_state(&thread_state, JobState::Completed);
                    }
                    Err(e) => {
                        log::debug!("{} job failed: {}", name, e);
                        set_state(&thread_state, JobState::Failed);
                    }
                }
                let _ = thread_tx.send(JobEvent::Finished(result));
            });

        let thread = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                set_state(&state, JobState::Failed);
                let _ = tx.send(JobEvent::Finished(Err(JobError::Worker(e.to_string()))));
                None
            }
        };

        JobHandle {
            state,
            events: rx,
            thread,
        }
    }
}

/// Caller's side of a spawned job
pub struct JobHandle {
    state: Arc<Mutex<JobState>>,
    events: Receiver<JobEvent>,
    thread: Option<thread::JoinHandle<()>>,
}

impl JobHandle {
    /// Current state
    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Event stream, ending with [`JobEvent::Finished`]
    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    /// Block until the job finishes and return its result
    pub fn wait(self) -> Result<JobOutput> {
        self.wait_with(&mut crate::progress::NoProgress)
    }

    /// Block until the job finishes, forwarding progress to `sink`
    pub fn wait_with(mut self, sink: &mut dyn ProgressSink) -> Result<JobOutput> {
        let mut outcome = None;
        for event in self.events.iter() {
            match event {
                JobEvent::Started => {}
                JobEvent::Progress(progress) => sink.update(&progress),
                JobEvent::Finished(result) => {
                    outcome = Some(result);
                    break;
                }
            }
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                return Err(JobError::Worker("job thread panicked".into()));
            }
        }
        outcome.unwrap_or_else(|| Err(JobError::Worker("job ended without a result".into())))
    }

    /// Stop listening; the job still runs to completion and then closes
    /// the port
    pub fn abandon(self) {
        log::debug!("Abandoning job in state {:?}", self.state());
    }
}
