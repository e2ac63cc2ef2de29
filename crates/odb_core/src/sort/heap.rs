//! In-place heapsort over anything that can compare and swap by index.
//!
//! Heapsort needs no scratch space and has an `O(n log n)` worst case,
//! which matters when the records live in a mapped file larger than memory.

use super::key::RecordComparator;
use std::cmp::Ordering;

/// A sequence that can be sorted by index.
pub trait Permutable {
    /// Returns the number of elements.
    fn len(&self) -> usize;

    /// Returns true if element `i` sorts strictly before element `j`.
    fn less(&self, i: usize, j: usize) -> bool;

    /// Swaps elements `i` and `j`.
    fn swap(&mut self, i: usize, j: usize);

    /// Returns true if there are no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sorts `items` ascending by [`Permutable::less`]. Not stable.
pub fn heap_sort<P: Permutable + ?Sized>(items: &mut P) {
    let n = items.len();
    if n < 2 {
        return;
    }
    for start in (0..n / 2).rev() {
        sift_down(items, start, n);
    }
    for end in (1..n).rev() {
        items.swap(0, end);
        sift_down(items, 0, end);
    }
}

fn sift_down<P: Permutable + ?Sized>(items: &mut P, mut root: usize, end: usize) {
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            return;
        }
        if child + 1 < end && items.less(child, child + 1) {
            child += 1;
        }
        if !items.less(root, child) {
            return;
        }
        items.swap(root, child);
        root = child;
    }
}

/// Fixed-width records in a mutable byte region.
#[derive(Debug)]
pub struct RecordSlice<'a> {
    data: &'a mut [u8],
    record_size: usize,
    comparator: &'a RecordComparator,
}

impl<'a> RecordSlice<'a> {
    /// Wraps `data`, which must hold a whole number of records.
    ///
    /// # Panics
    ///
    /// Panics if `record_size` is zero.
    pub fn new(data: &'a mut [u8], record_size: usize, comparator: &'a RecordComparator) -> Self {
        assert!(record_size > 0, "record size must be positive");
        Self {
            data,
            record_size,
            comparator,
        }
    }

    fn record(&self, i: usize) -> &[u8] {
        &self.data[i * self.record_size..(i + 1) * self.record_size]
    }
}

impl Permutable for RecordSlice<'_> {
    fn len(&self) -> usize {
        self.data.len() / self.record_size
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.comparator.less(self.record(i), self.record(j))
    }

    fn swap(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        let (lo, hi) = (i.min(j), i.max(j));
        let size = self.record_size;
        let (head, tail) = self.data.split_at_mut(hi * size);
        head[lo * size..(lo + 1) * size].swap_with_slice(&mut tail[..size]);
    }
}

/// Records held as slot vectors in memory.
#[derive(Debug, Clone)]
pub struct VecRecords {
    /// The records.
    pub records: Vec<Vec<i64>>,
    comparator: RecordComparator,
}

impl VecRecords {
    /// Wraps `records`.
    #[must_use]
    pub fn new(records: Vec<Vec<i64>>, comparator: RecordComparator) -> Self {
        Self {
            records,
            comparator,
        }
    }

    /// Returns the records.
    #[must_use]
    pub fn into_inner(self) -> Vec<Vec<i64>> {
        self.records
    }
}

impl Permutable for VecRecords {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.comparator
            .compare_slots(&self.records[i], &self.records[j])
            == Ordering::Less
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.records.swap(i, j);
    }
}
