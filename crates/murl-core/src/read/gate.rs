//! Bound on ranged fetches in flight at once.
//!
//! Each kernel read becomes its own HTTP request. Without a bound, aggressive
//! readahead could open an unbounded number of connections. Permits own a
//! handle to their gate, so one can be taken on the FUSE session thread and
//! carried into the worker that performs the fetch.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct ReadGate {
    max_inflight: usize,
    in_flight: Mutex<usize>,
    freed: Condvar,
}

impl ReadGate {
    /// Gate admitting at most `max_inflight` (at least 1) concurrent fetches.
    pub fn new(max_inflight: usize) -> Self {
        Self {
            max_inflight: max_inflight.max(1),
            in_flight: Mutex::new(0),
            freed: Condvar::new(),
        }
    }

    /// Fetches currently holding a slot.
    pub fn in_flight(&self) -> usize {
        *self.lock()
    }

    /// Blocks until a slot is free and returns it; the slot is released on drop.
    pub fn acquire(self: &Arc<Self>) -> ReadPermit {
        let mut in_flight = self.lock();
        while *in_flight >= self.max_inflight {
            in_flight = self
                .freed
                .wait(in_flight)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_flight += 1;
        ReadPermit {
            gate: Arc::clone(self),
        }
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ReadPermit> {
        let mut in_flight = self.lock();
        if *in_flight >= self.max_inflight {
            return None;
        }
        *in_flight += 1;
        Some(ReadPermit {
            gate: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut in_flight = self.lock();
        *in_flight = in_flight.saturating_sub(1);
        drop(in_flight);
        self.freed.notify_one();
    }

    // A panicking reader must not wedge every later read.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases its slot when dropped.
#[derive(Debug)]
pub struct ReadPermit {
    gate: Arc<ReadGate>,
}

impl Drop for ReadPermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
