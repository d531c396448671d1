//! Transparent draw ordering
//!
//! Blended draws must be composited back to front, so here depth order is a
//! correctness requirement and batching only merges neighbours that already
//! ended up adjacent.
//!
//! Sorting is a stable sort on exact depth, farthest first. The sorted list
//! is then cut into clusters wherever two neighbours differ by more than
//! `depth_tolerance`; inside a cluster candidates go back to enqueue order.
//! Neighbours closer than the tolerance chain into one cluster, so nearly
//! coplanar items never swap when their depths drift across each other.

use std::cmp::Ordering;

use super::batch::{coalesce_batches, Batch};
use crate::scene::DrawCandidate;

/// A transparent candidate with its view depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthEntry {
    /// Distance from the camera along the view direction
    pub depth: f32,
    /// The candidate
    pub candidate: DrawCandidate,
    sequence: usize,
}

/// Orders transparent candidates farthest first
#[derive(Debug)]
pub struct TransparentSorter {
    entries: Vec<DepthEntry>,
    depth_tolerance: f32,
    sorted: bool,
}

impl TransparentSorter {
    /// Create a sorter treating depths within `depth_tolerance` as equal
    pub fn new(depth_tolerance: f32, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            depth_tolerance,
            sorted: true,
        }
    }

    /// Tolerance below which depths count as equal
    pub fn depth_tolerance(&self) -> f32 {
        self.depth_tolerance
    }

    /// Add a candidate at the given view depth
    ///
    /// A NaN depth (degenerate transform) is treated as 0.
    pub fn enqueue(&mut self, candidate: DrawCandidate, depth: f32) {
        let depth = if depth.is_nan() {
            log::debug!("NaN depth for {} {:?}, using 0", candidate.kind_name(), candidate.node());
            0.0
        } else {
            depth
        };

        // Non-increasing input is already in final order
        if self
            .entries
            .last()
            .is_some_and(|last| depth.total_cmp(&last.depth) == Ordering::Greater)
        {
            self.sorted = false;
        }
        self.entries.push(DepthEntry {
            depth,
            candidate,
            sequence: self.entries.len(),
        });
    }

    /// Put pending candidates in back-to-front order
    ///
    /// Candidates within `depth_tolerance` of a neighbour keep their enqueue
    /// order.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }

        self.entries.sort_by(|a, b| b.depth.total_cmp(&a.depth));

        let mut start = 0;
        for end in 1..=self.entries.len() {
            let split = end == self.entries.len()
                || self.entries[end - 1].depth - self.entries[end].depth > self.depth_tolerance;
            if split {
                if end - start > 1 {
                    self.entries[start..end].sort_by_key(|entry| entry.sequence);
                }
                start = end;
            }
        }

        self.sorted = true;
    }

    /// Whether [`ordered`](Self::ordered) is currently back to front
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Pending entries; back to front once [`sort`](Self::sort) has run
    pub fn ordered(&self) -> &[DepthEntry] {
        &self.entries
    }

    /// Batches over [`ordered`](Self::ordered)
    pub fn batches(&self, max_batch_size: usize) -> Vec<Batch> {
        coalesce_batches(
            self.entries.iter().map(|entry| entry.candidate.material()),
            max_batch_size,
        )
    }

    /// Pending candidates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every pending candidate
    pub fn clear(&mut self) {
        self.entries.clear();
        self.sorted = true;
    }
}

impl Default for TransparentSorter {
    fn default() -> Self {
        Self::new(1e-4, 0)
    }
}
