//! A capacity-limited FIFO with drop-oldest overflow.
//!
//! Both adapters accumulate their input here between `work` calls. Instead of
//! blocking the producer, an append that would exceed the capacity drops the
//! oldest elements, so the queue always holds the most recent `capacity`
//! elements.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Append `data` to the tail, evicting the oldest elements on overflow.
    ///
    /// Returns the number of elements evicted.
    pub fn append(&mut self, data: &[T]) -> usize {
        if data.len() >= self.capacity {
            // Everything currently queued goes, plus the head of `data` itself.
            let evicted = self.items.len() + data.len() - self.capacity;
            self.items.clear();
            self.items
                .extend(data[data.len() - self.capacity..].iter().copied());
            return evicted;
        }

        self.items.extend(data.iter().copied());
        self.evict_overflow()
    }

    /// Remove and return the first `n` elements.
    ///
    /// # Panics
    ///
    /// Panics if `n` is greater than [`len`](Self::len).
    pub fn consume_prefix(&mut self, n: usize) -> Vec<T> {
        self.items.drain(..n).collect()
    }

    /// Remove the first `n` elements without returning them.
    ///
    /// # Panics
    ///
    /// Panics if `n` is greater than [`len`](Self::len).
    pub fn discard_prefix(&mut self, n: usize) {
        self.items.drain(..n);
    }

    /// Re-insert previously consumed elements at the head, keeping their order.
    pub fn push_front(&mut self, data: &[T]) {
        for &item in data.iter().rev() {
            self.items.push_front(item);
        }
        self.evict_overflow();
    }

    /// View the first `n` elements without removing them.
    ///
    /// # Panics
    ///
    /// Panics if `n` is greater than [`len`](Self::len).
    pub fn peek_prefix(&mut self, n: usize) -> &[T] {
        &self.items.make_contiguous()[..n]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    fn evict_overflow(&mut self) -> usize {
        let excess = self.items.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.items.drain(..excess);
        }
        excess
    }
}
