//! Exclusive ownership of the reader board port
//!
//! The command protocol has no request ids, so only one job may talk to
//! the board at a time. [`SharedPort`] hands out a [`PortLease`] to one
//! holder; a second job retries a bounded number of times and then fails
//! with [`JobError::PortBusy`] instead of queueing.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use p2kflash_serial::{Delay, Transport};

use crate::error::{JobError, Result};

/// How hard to try for a busy port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Wait between attempts
    pub retry_interval: Duration,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            retry_interval: Duration::from_millis(200),
        }
    }
}

/// A transport shared between jobs
pub struct SharedPort<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for SharedPort<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SharedPort<T> {
    /// Share a (closed) transport
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
        }
    }

    /// Whether a lease is currently held
    pub fn is_busy(&self) -> bool {
        matches!(self.inner.try_lock(), Err(TryLockError::WouldBlock))
    }

    /// Take exclusive ownership and open the transport
    pub fn acquire<D: Delay>(&self, policy: &LeasePolicy, delay: &mut D) -> Result<PortLease<'_, T>> {
        let attempts = policy.retries + 1;
        for attempt in 1..=attempts {
            match self.inner.try_lock() {
                Ok(guard) => return PortLease::open(guard),
                Err(TryLockError::Poisoned(poisoned)) => {
                    log::warn!("Previous port holder panicked, taking over");
                    return PortLease::open(poisoned.into_inner());
                }
                Err(TryLockError::WouldBlock) => {
                    log::debug!("Port busy (attempt {}/{})", attempt, attempts);
                    if attempt < attempts {
                        delay.delay(policy.retry_interval);
                    }
                }
            }
        }
        Err(JobError::PortBusy { attempts })
    }
}

/// Exclusive, open access to the transport
///
/// Dropping the lease closes the transport; [`PortLease::release`] does the
/// same but reports close errors.
pub struct PortLease<'a, T: Transport> {
    guard: MutexGuard<'a, T>,
}

impl<'a, T: Transport> PortLease<'a, T> {
    fn open(mut guard: MutexGuard<'a, T>) -> Result<Self> {
        guard.open()?;
        log::debug!("Port lease acquired");
        Ok(Self { guard })
    }

    /// Close the transport and give up ownership
    pub fn release(mut self) -> Result<()> {
        self.guard.close()?;
        log::debug!("Port lease released");
        Ok(())
    }
}

impl<T: Transport> Deref for PortLease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: Transport> DerefMut for PortLease<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: Transport> Drop for PortLease<'_, T> {
    fn drop(&mut self) {
        if self.guard.is_open() {
            if let Err(e) = self.guard.close() {
                log::warn!("Failed to close port: {}", e);
            }
        }
    }
}
