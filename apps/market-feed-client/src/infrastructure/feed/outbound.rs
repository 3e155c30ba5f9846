//! Outbound Queue
//!
//! Bounded FIFO of encoded frames written while the connection is down.
//! When full, the oldest frame is evicted to make room.

use std::collections::VecDeque;

/// Default queue capacity.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 100;

/// Bounded drop-oldest queue of encoded frames.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    frames: VecDeque<String>,
    capacity: usize,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` frames.
    ///
    /// A zero capacity queue drops every frame.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Enqueue a frame.
    ///
    /// Returns the evicted frame if the queue was full.
    pub fn push(&mut self, frame: String) -> Option<String> {
        if self.capacity == 0 {
            return Some(frame);
        }
        let evicted = if self.frames.len() >= self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    /// Take every queued frame, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.frames.drain(..)
    }

    /// Number of queued frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Maximum number of frames held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every queued frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut queue = OutboundQueue::new(2);
        assert!(queue.push("a".into()).is_none());
        assert!(queue.push("b".into()).is_none());
        assert_eq!(queue.push("c".into()).as_deref(), Some("a"));

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained, vec!["b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_capacity_drops_everything() {
        let mut queue = OutboundQueue::new(0);
        assert_eq!(queue.push("a".into()).as_deref(), Some("a"));
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(capacity in 0usize..50, pushes in 0usize..200) {
            let mut queue = OutboundQueue::new(capacity);
            let mut evicted = 0usize;
            for i in 0..pushes {
                if queue.push(i.to_string()).is_some() {
                    evicted += 1;
                }
                prop_assert!(queue.len() <= capacity);
            }
            prop_assert_eq!(queue.len() + evicted, pushes);

            // Survivors are the newest frames, in order.
            let survivors: Vec<String> = queue.drain().collect();
            let expected: Vec<String> = (pushes - survivors.len()..pushes).map(|i| i.to_string()).collect();
            prop_assert_eq!(survivors, expected);
        }
    }
}
