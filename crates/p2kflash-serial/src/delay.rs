//! Sleep abstraction used while polling the transport
//!
//! The command channel never sleeps directly. Tests inject [`NoDelay`] (or
//! a counting delay) to simulate stalls without waiting.

use std::time::Duration;

/// Something that can wait
pub trait Delay: Send {
    /// Wait for `duration`
    fn delay(&mut self, duration: Duration);
}

/// Real sleep on the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay(&mut self, _duration: Duration) {}
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}
