//! Bounded buffer between producers and the fixed worker pool.
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::ArrayQueue;
use tokio::sync::Notify;

/// A bounded, lock-free FIFO buffer of pending messages.
///
/// Producers only ever use the non-blocking [`try_enqueue`][Self::try_enqueue], while fixed workers park in
/// [`dequeue`][Self::dequeue] until a message shows up or the buffer is closed and empty.
///
/// A capacity of zero is valid: such a buffer never holds anything, and every enqueue fails.
pub struct DispatchBuffer<M> {
    queue: Option<ArrayQueue<M>>,
    closed: AtomicBool,
    notify: Notify,
}

impl<M> DispatchBuffer<M> {
    /// Creates a new `DispatchBuffer` that can hold up to `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            // `ArrayQueue` panics on a zero capacity, so a zero-sized buffer simply has no queue.
            queue: (capacity > 0).then(|| ArrayQueue::new(capacity)),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Returns the maximum number of messages the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::capacity)
    }

    /// Returns the number of messages currently buffered.
    pub fn len(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::len)
    }

    /// Returns `true` if no messages are currently buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the buffer has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Attempts to add a message to the back of the buffer without waiting.
    ///
    /// # Errors
    ///
    /// If the buffer is full or closed, the message is handed back to the caller.
    pub fn try_enqueue(&self, message: M) -> Result<(), M> {
        if self.is_closed() {
            return Err(message);
        }

        match &self.queue {
            Some(queue) => {
                queue.push(message)?;
                self.notify.notify_one();
                Ok(())
            }
            None => Err(message),
        }
    }

    /// Attempts to take the message at the front of the buffer without waiting.
    pub fn try_dequeue(&self) -> Option<M> {
        self.queue.as_ref().and_then(ArrayQueue::pop)
    }

    /// Closes the buffer.
    ///
    /// Subsequent enqueues fail, while messages already buffered can still be dequeued. Any task waiting in
    /// [`dequeue`][Self::dequeue] is woken up so that it can observe the end of the stream. Closing an already closed
    /// buffer has no effect.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the buffer has been closed and every buffered message has been taken.
    pub async fn dequeue(&self) -> Option<M> {
        loop {
            // Register interest before checking the queue so a concurrent enqueue or close can't slip in between the
            // check and the wait.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_dequeue() {
                return Some(message);
            }

            if self.is_closed() {
                // Producers that raced with `close` may have gotten one last message in.
                return self.try_dequeue();
            }

            notified.await;
        }
    }
}
