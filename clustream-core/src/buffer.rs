//! Ingestion buffer feeding a computation.
//!
//! The buffer has two orthogonal settings:
//! - **mode**: synchronous pushes append directly, asynchronous pushes go
//!   through a bounded queue drained by [`Buffer::apply`];
//! - **capacity**: unbounded growth, or a circular store overwriting its
//!   oldest slot once full.
//!
//! [`Buffer::data`] hands out a shared snapshot. Later pushes copy the
//! store on write, so a snapshot held by a running iteration never changes.

use crate::{Elemt, Error, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

/// Queue length used by [`Buffer::set_async`] callers that have no better
/// estimate.
pub const DEFAULT_QUEUE_SIZE: usize = 1024;

struct Store<E> {
    data: Arc<Vec<E>>,
    capacity: Option<usize>,
    cursor: usize,
}

impl<E: Elemt> Store<E> {
    fn push(&mut self, elemt: E) {
        let data = Arc::make_mut(&mut self.data);
        match self.capacity {
            None => data.push(elemt),
            Some(capacity) => {
                if data.len() < capacity {
                    data.push(elemt);
                } else {
                    data[self.cursor] = elemt;
                }
                self.cursor = (self.cursor + 1) % capacity;
            }
        }
    }
}

struct Queue<E> {
    size: usize,
    sender: SyncSender<E>,
    receiver: Mutex<Receiver<E>>,
}

/// Element store shared between pushing callers and a computation.
pub struct Buffer<E> {
    store: RwLock<Store<E>>,
    queue: RwLock<Option<Arc<Queue<E>>>>,
}

impl<E: Elemt> Buffer<E> {
    /// Creates an unbounded buffer pre-seeded with `data`.
    #[must_use]
    pub fn unbounded(data: Vec<E>) -> Self {
        Self::from_store(Store {
            data: Arc::new(data),
            capacity: None,
            cursor: 0,
        })
    }

    /// Creates a circular buffer holding at most `capacity` elements.
    ///
    /// A seed longer than `capacity` keeps its `capacity` most recent
    /// elements; a shorter one fills the store from index 0.
    ///
    /// # Errors
    /// Returns `ConfigError` if `capacity` is zero.
    pub fn bounded(mut data: Vec<E>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ConfigError(
                "buffer capacity must be positive".to_string(),
            ));
        }
        if data.len() > capacity {
            data.drain(..data.len() - capacity);
        }
        let cursor = data.len() % capacity;
        Ok(Self::from_store(Store {
            data: Arc::new(data),
            capacity: Some(capacity),
            cursor,
        }))
    }

    fn from_store(store: Store<E>) -> Self {
        Self {
            store: RwLock::new(store),
            queue: RwLock::new(None),
        }
    }

    /// Switches to asynchronous mode with a queue of `queue_size` elements.
    ///
    /// Pending elements of a previous queue are applied first. A
    /// `queue_size` of zero is raised to one.
    pub fn set_async(&self, queue_size: usize) {
        let size = queue_size.max(1);
        let (sender, receiver) = sync_channel(size);
        let previous = self.queue.write().replace(Arc::new(Queue {
            size,
            sender,
            receiver: Mutex::new(receiver),
        }));
        if let Some(previous) = previous {
            self.drain(&previous);
        }
    }

    /// Switches back to synchronous mode, applying pending elements.
    pub fn set_sync(&self) {
        if let Some(previous) = self.queue.write().take() {
            self.drain(&previous);
        }
    }

    /// Returns true in asynchronous mode.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.queue.read().is_some()
    }

    /// Returns the queue size in asynchronous mode.
    #[must_use]
    pub fn queue_size(&self) -> Option<usize> {
        self.queue.read().as_ref().map(|queue| queue.size)
    }

    /// Returns the circular capacity, or `None` when unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.store.read().capacity
    }

    /// Adds an element.
    ///
    /// In asynchronous mode the element is queued. When the queue is full
    /// the caller applies the pending elements itself and queues again, so
    /// a push never waits on another thread.
    ///
    /// # Errors
    /// Never fails.
    pub fn push(&self, mut elemt: E) -> Result<()> {
        let Some(queue) = self.current_queue() else {
            self.store.write().push(elemt);
            return Ok(());
        };
        loop {
            match queue.sender.try_send(elemt) {
                Ok(()) => break,
                Err(TrySendError::Full(rejected) | TrySendError::Disconnected(rejected)) => {
                    self.drain(&queue);
                    elemt = rejected;
                }
            }
        }
        self.settle(&queue);
        Ok(())
    }

    /// Adds an element without blocking.
    ///
    /// # Errors
    /// Returns `BufferFull` if the asynchronous queue is saturated.
    pub fn try_push(&self, elemt: E) -> Result<()> {
        let Some(queue) = self.current_queue() else {
            self.store.write().push(elemt);
            return Ok(());
        };
        queue.sender.try_send(elemt).map_err(|_| Error::BufferFull)?;
        self.settle(&queue);
        Ok(())
    }

    /// Moves queued elements into the store. No-op in synchronous mode.
    pub fn apply(&self) {
        if let Some(queue) = self.current_queue() {
            self.drain(&queue);
        }
    }

    /// Snapshot of the applied elements.
    #[must_use]
    pub fn data(&self) -> Arc<Vec<E>> {
        Arc::clone(&self.store.read().data)
    }

    /// Number of applied elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().data.len()
    }

    /// Returns true if no element has been applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current_queue(&self) -> Option<Arc<Queue<E>>> {
        self.queue.read().clone()
    }

    // `queue` was replaced by `set_async` or `set_sync` and its final drain
    // may have run before this element arrived.
    fn settle(&self, queue: &Arc<Queue<E>>) {
        let replaced = match self.queue.read().as_ref() {
            Some(current) => !Arc::ptr_eq(current, queue),
            None => true,
        };
        if replaced {
            self.drain(queue);
        }
    }

    // The receiver stays locked until the store holds the batch, so
    // concurrent drains append in queue order.
    fn drain(&self, queue: &Queue<E>) {
        let receiver = queue.receiver.lock();
        let mut pending = receiver.try_iter().peekable();
        if pending.peek().is_none() {
            return;
        }
        let mut store = self.store.write();
        for elemt in pending {
            store.push(elemt);
        }
    }
}

impl<E: Elemt> Default for Buffer<E> {
    fn default() -> Self {
        Self::unbounded(Vec::new())
    }
}

impl<E: Elemt> Clone for Buffer<E> {
    /// Copies the applied elements and the capacity into a synchronous
    /// buffer. Queued elements are not copied.
    fn clone(&self) -> Self {
        let store = self.store.read();
        Self::from_store(Store {
            data: Arc::new(store.data.as_ref().clone()),
            capacity: store.capacity,
            cursor: store.cursor,
        })
    }
}
