//! A fixed-capacity FIFO queue of decoded messages.

use std::collections::VecDeque;

use arcus_proto::Message;

use crate::error::QueueError;

/// A bounded, non-blocking FIFO of [`Message`] values.
///
/// Used for both the incoming queue (messages waiting to be consumed by the
/// application) and the outgoing queue (messages waiting to be serialized
/// onto the wire). Push and pop never block; they fail fast with
/// [`QueueError`] instead.
#[derive(Debug)]
pub struct MessageQueue {
    items: VecDeque<Message>,
    capacity: usize,
}

impl MessageQueue {
    /// Creates an empty queue with room for `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { items: VecDeque::with_capacity(capacity), capacity }
    }

    /// Number of messages currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the queue has no room for another message.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Appends `message` to the tail.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] if the queue is already at capacity. `message` is
    /// dropped in that case - callers that need it back should check
    /// `is_full()` first.
    pub fn push(&mut self, message: Message) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full);
        }
        self.items.push_back(message);
        Ok(())
    }

    /// Removes and returns the message at the head.
    ///
    /// # Errors
    ///
    /// [`QueueError::Empty`] if there is nothing queued.
    pub fn pop(&mut self) -> Result<Message, QueueError> {
        self.items.pop_front().ok_or(QueueError::Empty)
    }

    /// Looks at the message at the head without removing it.
    #[must_use]
    pub fn peek_front(&self) -> Option<&Message> {
        self.items.front()
    }
}

#[cfg(test)]
mod tests {
    use arcus_proto::{Opcode, Payload};

    use super::*;

    fn msg(n: i32) -> Message {
        let mut payload = Payload::new();
        payload.set_int("n", n).expect("new field");
        Message::new(Opcode::LiveState, payload)
    }

    #[test]
    fn fifo_order() {
        let mut q = MessageQueue::with_capacity(4);
        q.push(msg(1)).expect("push");
        q.push(msg(2)).expect("push");
        assert_eq!(q.pop().expect("pop").payload().int_val("n").expect("n"), 1);
        assert_eq!(q.pop().expect("pop").payload().int_val("n").expect("n"), 2);
    }

    #[test]
    fn push_fails_when_full() {
        let mut q = MessageQueue::with_capacity(1);
        q.push(msg(1)).expect("first push fits");
        assert!(matches!(q.push(msg(2)), Err(QueueError::Full)));
    }

    #[test]
    fn pop_fails_when_empty() {
        let mut q = MessageQueue::with_capacity(1);
        assert!(matches!(q.pop(), Err(QueueError::Empty)));
    }

    #[test]
    fn peek_front_does_not_remove() {
        let mut q = MessageQueue::with_capacity(2);
        q.push(msg(1)).expect("push");
        assert_eq!(q.peek_front().expect("head").payload().int_val("n").expect("n"), 1);
        assert_eq!(q.len(), 1, "peek must not consume");
    }
}
