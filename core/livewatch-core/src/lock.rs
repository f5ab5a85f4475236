//! Single-flight guard for pollers.
//!
//! A tick that finds the lock held is dropped, never queued. The lock is a
//! one-permit semaphore so the controller can also wait for an in-flight
//! check to drain before it suspends the poller.

use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};

#[derive(Debug)]
pub struct PollLock {
    name: &'static str,
    permits: Semaphore,
}

/// Held for the duration of one poll. Dropping it releases the lock.
#[derive(Debug)]
pub struct PollPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl PollLock {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            permits: Semaphore::new(1),
        }
    }

    /// Takes the lock if it is free. Returns `None` when a poll is already in
    /// flight or the lock has been closed for shutdown.
    pub fn try_acquire(&self) -> Option<PollPermit<'_>> {
        match self.permits.try_acquire() {
            Ok(permit) => Some(PollPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) => {
                tracing::trace!(lock = self.name, "Poll lock contended");
                None
            }
            Err(TryAcquireError::Closed) => None,
        }
    }

    /// Waits until no poll holds the lock. Returns immediately once closed.
    pub async fn wait_idle(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            drop(permit);
        }
    }

    /// Refuses every future acquisition. In-flight permits stay valid.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
