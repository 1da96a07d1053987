//! Bounded multi-producer call queue behind a threadsafe function
//!
//! Producers on any thread push items; one consumer, running in the owning
//! environment, pops them in FIFO order. The queue also carries the logical
//! thread count of the threadsafe function, because release and enqueue must
//! be decided under the same lock: an enqueue that races a release either
//! lands in the queue or is rejected with a status, never lost.
//!
//! A blocking push waits until capacity frees or the queue stops accepting.
//! If the only thread that would pop is the one blocked in `push`, it waits
//! forever; callers on the consumer thread must use non-blocking mode.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::{ShimError, ShimResult};
use crate::types::Status;

/// Lifecycle of a [`CallQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Accepting pushes and acquires
    Open,
    /// Thread count reached zero; queued items are still delivered
    Draining,
    /// Released with abort; queued items will be dropped
    Aborted,
}

/// What a release did to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    /// Thread count after the release
    pub remaining: usize,
    /// Queue state after the release
    pub state: QueueState,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    /// 0 = unbounded
    max_size: usize,
    threads: usize,
    state: QueueState,
}

impl<T> QueueInner<T> {
    fn is_full(&self) -> bool {
        self.max_size > 0 && self.items.len() >= self.max_size
    }
}

/// FIFO queue with acquire/release accounting.
pub struct CallQueue<T> {
    inner: Mutex<QueueInner<T>>,
    /// Producers waiting for capacity
    not_full: Condvar,
}

impl<T> std::fmt::Debug for CallQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CallQueue")
            .field("max_size", &inner.max_size)
            .field("length", &inner.items.len())
            .field("threads", &inner.threads)
            .field("state", &inner.state)
            .finish()
    }
}

impl<T> CallQueue<T> {
    /// Create a queue. `max_size` of 0 means unbounded.
    pub fn new(max_size: usize, initial_threads: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                max_size,
                threads: initial_threads,
                state: QueueState::Open,
            }),
            not_full: Condvar::new(),
        }
    }

    /// Enqueue an item.
    ///
    /// Non-blocking mode fails with [`ShimError::QueueFull`] when at
    /// capacity. Both modes fail with [`ShimError::Closing`] once the queue
    /// stopped accepting, including while a blocking push is waiting.
    pub fn push(&self, item: T, blocking: bool) -> ShimResult<()> {
        let mut inner = self.inner.lock();
        loop {
            if inner.state != QueueState::Open {
                return Err(ShimError::Closing);
            }
            if !inner.is_full() {
                inner.items.push_back(item);
                return Ok(());
            }
            if !blocking {
                return Err(ShimError::QueueFull);
            }
            self.not_full.wait(&mut inner);
        }
    }

    /// Take the oldest item.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Take every queued item, oldest first.
    pub fn take_all(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        let items: Vec<T> = inner.items.drain(..).collect();
        self.not_full.notify_all();
        items
    }

    /// Register one more thread using the queue.
    pub fn acquire(&self) -> ShimResult<usize> {
        let mut inner = self.inner.lock();
        if inner.state != QueueState::Open {
            return Err(ShimError::Closing);
        }
        inner.threads += 1;
        Ok(inner.threads)
    }

    /// Drop one thread's claim. Reaching zero starts draining; `abort`
    /// stops delivery immediately. Either wakes every blocked producer.
    pub fn release(&self, abort: bool) -> ShimResult<Released> {
        let mut inner = self.inner.lock();
        if inner.threads == 0 {
            return Err(ShimError::Status(Status::INVALID_ARG));
        }
        if inner.state == QueueState::Aborted {
            return Err(ShimError::Closing);
        }
        inner.threads -= 1;
        if abort {
            inner.state = QueueState::Aborted;
        } else if inner.threads == 0 {
            inner.state = QueueState::Draining;
        }
        if inner.state != QueueState::Open {
            self.not_full.notify_all();
        }
        Ok(Released {
            remaining: inner.threads,
            state: inner.state,
        })
    }

    /// Stop accepting without touching the thread count.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.state = QueueState::Aborted;
        self.not_full.notify_all();
    }

    /// Current state.
    pub fn state(&self) -> QueueState {
        self.inner.lock().state
    }

    /// Whether nothing more will ever be delivered.
    pub fn is_finished(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            QueueState::Open => false,
            QueueState::Draining => inner.items.is_empty(),
            QueueState::Aborted => true,
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Current thread count.
    pub fn thread_count(&self) -> usize {
        self.inner.lock().threads
    }

    /// Capacity; 0 means unbounded.
    pub fn max_size(&self) -> usize {
        self.inner.lock().max_size
    }
}
