//! Admission gate for concurrent research work
//!
//! One limiter is shared (by `Arc`) across a whole research tree and bounds
//! how many search/LLM tasks run at once. Unlike a plain semaphore its
//! capacity is mutable: a task that is about to wait on its own recursive
//! children calls [`ConcurrencyLimiter::expand`] so those children can be
//! admitted, and the returned guard gives the slot back on every exit path.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug)]
struct Slots {
    capacity: usize,
    active: usize,
}

/// Mutable-capacity counting gate
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    slots: Mutex<Slots>,
    notify: Notify,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting `capacity` tasks at once
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                capacity,
                active: 0,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // Slots stay consistent even if a holder panicked mid-update.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current capacity
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of tasks currently admitted
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Run `task` once a slot is free and return its output
    ///
    /// Tasks are admitted in no particular order; the limiter never
    /// preempts a running task.
    pub async fn schedule<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        task.await
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Permit<'_> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the check and
            // the await is not lost.
            notified.as_mut().enable();

            if self.try_admit() {
                return Permit { limiter: self };
            }
            notified.await;
        }
    }

    fn try_admit(&self) -> bool {
        let mut slots = self.lock();
        if slots.active < slots.capacity {
            slots.active += 1;
            true
        } else {
            false
        }
    }

    fn release(&self) {
        {
            let mut slots = self.lock();
            slots.active = slots.active.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Grow capacity by one until the returned guard is dropped
    pub fn expand(&self) -> CapacityGuard<'_> {
        let capacity = {
            let mut slots = self.lock();
            slots.capacity += 1;
            slots.capacity
        };
        debug!(capacity, "Concurrency capacity expanded");
        self.notify.notify_waiters();
        CapacityGuard { limiter: self }
    }
}

/// A held slot; released on drop
#[derive(Debug)]
pub struct Permit<'a> {
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

/// Temporary capacity increase; reverted on drop
#[derive(Debug)]
pub struct CapacityGuard<'a> {
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for CapacityGuard<'_> {
    fn drop(&mut self) {
        let capacity = {
            let mut slots = self.limiter.lock();
            slots.capacity = slots.capacity.saturating_sub(1);
            slots.capacity
        };
        debug!(capacity, "Concurrency capacity restored");
    }
}
