//! Progress reporting for long-running jobs

use std::fmt;
use std::time::{Duration, Instant};

/// Stage of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Reading a slot
    Read,
    /// Erasing sectors
    Erase,
    /// Programming blocks
    Write,
    /// Reading a slot back for comparison
    Verify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Read => "Reading",
            Phase::Erase => "Erasing",
            Phase::Write => "Writing",
            Phase::Verify => "Verifying",
        })
    }
}

/// One progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Current stage
    pub phase: Phase,
    /// Units (blocks or sectors) done in this stage
    pub completed: usize,
    /// Units in this stage
    pub total: usize,
    /// Estimated time left in this stage, once at least one unit is done
    pub remaining: Option<Duration>,
}

/// Receives progress updates from a job
///
/// Each stage starts with an update where `completed == 0`.
pub trait ProgressSink {
    /// Called after every block or sector
    fn update(&mut self, progress: &Progress);
}

impl<P: ProgressSink + ?Sized> ProgressSink for &mut P {
    fn update(&mut self, progress: &Progress) {
        (**self).update(progress)
    }
}

/// A no-op progress sink
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _progress: &Progress) {}
}

/// Extrapolate the time left from the average time per unit so far
pub fn estimate_remaining(elapsed: Duration, completed: usize, total: usize) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let left = total.saturating_sub(completed) as u32;
    Some(elapsed / completed as u32 * left)
}

/// Time-left estimator for one stage
#[derive(Debug, Clone, Copy)]
pub struct Eta {
    started: Instant,
}

impl Eta {
    /// Start timing now
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Estimated time left after `completed` of `total` units
    pub fn remaining(&self, completed: usize, total: usize) -> Option<Duration> {
        estimate_remaining(self.started.elapsed(), completed, total)
    }
}

/// Reports one stage to a sink
pub(crate) struct Tracker<'a> {
    sink: &'a mut dyn ProgressSink,
    phase: Phase,
    total: usize,
    eta: Eta,
}

impl<'a> Tracker<'a> {
    pub(crate) fn begin(sink: &'a mut dyn ProgressSink, phase: Phase, total: usize) -> Self {
        sink.update(&Progress {
            phase,
            completed: 0,
            total,
            remaining: None,
        });
        Self {
            sink,
            phase,
            total,
            eta: Eta::start(),
        }
    }

    pub(crate) fn step(&mut self, completed: usize) {
        self.sink.update(&Progress {
            phase: self.phase,
            completed,
            total: self.total,
            remaining: self.eta.remaining(completed, self.total),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(Duration::from_secs(4), 0, 64), None);
        assert_eq!(
            estimate_remaining(Duration::from_secs(4), 16, 64),
            Some(Duration::from_secs(12))
        );
        assert_eq!(
            estimate_remaining(Duration::from_secs(4), 64, 64),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_tracker_reports_start_and_steps() {
        let mut seen = Vec::new();
        struct Collect<'v>(&'v mut Vec<Progress>);
        impl ProgressSink for Collect<'_> {
            fn update(&mut self, progress: &Progress) {
                self.0.push(*progress);
            }
        }

        let mut sink = Collect(&mut seen);
        let mut tracker = Tracker::begin(&mut sink, Phase::Read, 2);
        tracker.step(1);
        tracker.step(2);
        drop(tracker);

        let completed: Vec<_> = seen.iter().map(|p| p.completed).collect();
        assert_eq!(completed, vec![0, 1, 2]);
        assert!(seen.iter().all(|p| p.phase == Phase::Read && p.total == 2));
        assert_eq!(seen[0].remaining, None);
        assert!(seen[2].remaining.is_some());
    }
}
