//! Fixed-capacity buffer that keeps the most recent items.
//!
//! A [`RingBuffer`] holds at most `capacity` items in insertion order. Pushing
//! into a full buffer evicts the oldest item and reports it back to the caller,
//! which is how the audit trail counts records it had to let go of.

use std::collections::VecDeque;

/// Bounded FIFO that overwrites its oldest element when full.
///
/// `RingBuffer<T>` has no interior mutability; wrap it in a lock when it is
/// shared between tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buf: VecDeque::with_capacity(capacity), capacity }
    }

    /// Appends `item`, returning the evicted oldest element if the buffer was
    /// full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.buf.pop_front() } else { None };
        self.buf.push_back(item);
        evicted
    }

    /// Removes and returns the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    /// Element at logical index `idx`, where `0` is the oldest.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.buf.get(idx)
    }

    /// Most recently pushed element.
    #[must_use]
    pub fn newest(&self) -> Option<&T> {
        self.buf.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Clones the contents into a `Vec`, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.buf.iter().cloned().collect()
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(1)
    }
}

impl<T> IntoIterator for RingBuffer<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.buf.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.buf.iter()
    }
}
