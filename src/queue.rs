use log::warn;

use crate::constants::MAX_QUEUE_SIZE;
use crate::process::Process;

/// Anything the ready queue can order.
pub trait Prioritized {
    fn priority(&self) -> u32;
}

impl Prioritized for Process {
    fn priority(&self) -> u32 {
        self.priority
    }
}

/// Holds items in descending priority; equal priorities keep arrival order.
pub struct ReadyQueue<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Prioritized> ReadyQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(MAX_QUEUE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ReadyQueue {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Insert behind every item of greater or equal priority.
    ///
    /// A full queue drops the item.
    pub fn insert(&mut self, item: T) {
        if self.is_full() {
            warn!(
                "ready queue full ({} entries), dropping priority {} item",
                self.capacity,
                item.priority()
            );
            return;
        }

        let mut pos = self.items.len();
        while pos > 0 && item.priority() > self.items[pos - 1].priority() {
            pos -= 1;
        }
        self.items.insert(pos, item);
    }

    /// Remove the first item holding the highest priority.
    pub fn remove_highest_priority(&mut self) -> Option<T> {
        let mut best: Option<(usize, u32)> = None;
        for (i, item) in self.items.iter().enumerate() {
            let priority = item.priority();
            if best.is_none_or(|(_, p)| priority > p) {
                best = Some((i, priority));
            }
        }
        best.map(|(i, _)| self.items.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Prioritized> Default for ReadyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
