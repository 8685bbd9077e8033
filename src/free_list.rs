//! First-fit list of free byte ranges inside one VMA.
//!
//! Nodes live in a slot vector and link to each other by index, so splicing a
//! node out never leaves a dangling reference and a slot is recycled only
//! after it has been unlinked.

use crate::error::{VmError, VmResult};

/// A half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionRange {
    pub start: usize,
    pub end: usize,
}

impl RegionRange {
    pub fn new(start: usize, end: usize) -> Self {
        RegionRange { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[inline]
    pub fn overlaps(&self, other: &RegionRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for RegionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    range: RegionRange,
    next: Option<usize>,
}

#[derive(Debug, Default)]
pub struct FreeRegionList {
    slots: Vec<Option<Node>>,
    vacant: Vec<usize>,
    head: Option<usize>,
}

impl FreeRegionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `size` bytes from the front of the first range that can hold them.
    ///
    /// A node that is used up is overwritten with its successor (or becomes a
    /// zero-length sentinel at the tail), so the previous node is never
    /// touched. Returns `None`, leaving the list untouched, when nothing fits.
    pub fn find_fit(&mut self, size: usize) -> Option<RegionRange> {
        let idx = self.iter_slots().find(|&idx| self.node(idx).range.len() >= size)?;
        let node = self.node(idx);
        let taken = RegionRange::new(node.range.start, node.range.start + size);

        if taken.end < node.range.end {
            self.node_mut(idx).range.start = taken.end;
            return Some(taken);
        }

        match node.next {
            Some(next_idx) => {
                let next = self.node(next_idx);
                *self.node_mut(idx) = next;
                self.slots[next_idx] = None;
                self.vacant.push(next_idx);
            }
            None => {
                self.node_mut(idx).range.start = node.range.end;
            }
        }

        Some(taken)
    }

    /// Put a range back at the head of the list.
    pub fn release(&mut self, range: RegionRange) -> VmResult<()> {
        if range.is_empty() {
            return Err(VmError::InvalidRegion);
        }

        let node = Node { range, next: self.head };
        let idx = match self.vacant.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.head = Some(idx);
        Ok(())
    }

    /// Ranges in link order, zero-length sentinels included.
    pub fn iter(&self) -> impl Iterator<Item = RegionRange> + '_ {
        self.iter_slots().map(|idx| self.node(idx).range)
    }

    /// True when no node has any space left.
    pub fn is_empty(&self) -> bool {
        self.iter().all(|range| range.is_empty())
    }

    /// Total free bytes across every node
    pub fn free_bytes(&self) -> usize {
        self.iter().map(|range| range.len()).sum()
    }

    fn iter_slots(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.head, move |&idx| self.node(idx).next)
    }

    // Linked slots are always occupied; vacant slots are unreachable from head.
    fn node(&self, idx: usize) -> Node {
        match self.slots[idx] {
            Some(node) => node,
            None => unreachable!("free list links to vacant slot {}", idx),
        }
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        match self.slots[idx].as_mut() {
            Some(node) => node,
            None => unreachable!("free list links to vacant slot {}", idx),
        }
    }
}
