//! Bounded buffer between producers and the flush task
//!
//! Producers only ever hold the lock for a `Vec::push`; the flush task
//! swaps the whole vector out in [`EventBuffer::drain`]. Nothing here waits
//! on I/O.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Result of [`EventBuffer::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The record will go out with the next drain
    Queued,
    /// The buffer was full and the record was dropped
    ///
    /// `first_in_episode` is true for the first drop since the last drain,
    /// so callers can warn once instead of once per record.
    Dropped { first_in_episode: bool },
}

/// Bounded FIFO of pending records
#[derive(Debug)]
pub struct EventBuffer<T> {
    queue: Mutex<Vec<T>>,
    max_size: usize,
    overflowing: AtomicBool,
}

impl<T> EventBuffer<T> {
    /// Create a buffer holding at most `max_size` records
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            max_size,
            overflowing: AtomicBool::new(false),
        }
    }

    /// Queue a record, dropping it if the buffer is full
    pub fn push(&self, record: T) -> PushOutcome {
        {
            let mut queue = self.queue.lock();
            if queue.len() < self.max_size {
                queue.push(record);
                return PushOutcome::Queued;
            }
        }

        let first_in_episode = !self.overflowing.swap(true, Ordering::Relaxed);
        PushOutcome::Dropped { first_in_episode }
    }

    /// Take everything queued so far, in push order
    pub fn drain(&self) -> Vec<T> {
        let batch = std::mem::take(&mut *self.queue.lock());
        self.overflowing.store(false, Ordering::Relaxed);
        batch
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}
