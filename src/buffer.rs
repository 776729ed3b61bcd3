//! Bounded buffer for inbound messages
//!
//! Fixed-capacity FIFO shared between the delivery loop (producer) and the
//! caller (consumer). A single mutex serializes push and pop; both paths
//! mutate, so there is nothing to gain from a reader-writer split. When a
//! push would exceed capacity the oldest entry is evicted, so the producer
//! is never blocked.

use crate::message::Message;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Default capacity of the inbound message buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Thread-safe, fixed-capacity FIFO of received messages.
#[derive(Debug)]
pub struct MessageBuffer {
    capacity: usize,
    queue: Mutex<VecDeque<Message>>,
}

impl MessageBuffer {
    /// Create a buffer holding at most `capacity` messages. A zero capacity
    /// is promoted to 1 so a push can never be a silent drop of itself.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a message to the tail, evicting the head if the buffer is full.
    pub fn push(&self, msg: Message) {
        let mut queue = self.lock();
        queue.push_back(msg);
        if queue.len() > self.capacity {
            let evicted = queue.pop_front();
            if let Some(evicted) = evicted {
                debug!(
                    topic = %evicted.topic,
                    "inbound buffer full, dropping oldest message"
                );
            }
        }
    }

    /// Remove and return the oldest message, or `None` immediately when the
    /// buffer is empty.
    pub fn pop(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Message>> {
        // A poisoned lock only means a panic happened mid-push; the queue
        // itself is still structurally sound.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
