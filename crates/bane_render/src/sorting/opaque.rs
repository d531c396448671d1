//! Opaque draw ordering
//!
//! With depth testing on, the order of opaque draws never changes the image,
//! only how often GPU state changes. Candidates are grouped by material key;
//! groups come out in the order their key was first seen this frame, and
//! draws inside a group keep their enqueue order.

use std::collections::HashMap;

use super::batch::{coalesce_batches, Batch};
use crate::scene::{DrawCandidate, MaterialKey};

/// Groups opaque candidates by material
#[derive(Debug, Default)]
pub struct OpaqueSorter {
    groups: Vec<(MaterialKey, Vec<DrawCandidate>)>,
    group_index: HashMap<MaterialKey, usize>,
    len: usize,
}

impl OpaqueSorter {
    /// Create an empty sorter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sorter with room for `capacity` material groups
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            groups: Vec::with_capacity(capacity),
            group_index: HashMap::with_capacity(capacity),
            len: 0,
        }
    }

    /// Add a candidate to its material group
    pub fn enqueue(&mut self, candidate: DrawCandidate) {
        let key = candidate.material();
        let index = match self.group_index.get(&key) {
            Some(&index) => index,
            None => {
                self.groups.push((key, Vec::new()));
                self.group_index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };

        self.groups[index].1.push(candidate);
        self.len += 1;
    }

    /// Pending candidates
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distinct material keys seen this frame
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Candidates in draw order
    pub fn ordered(&self) -> impl Iterator<Item = &DrawCandidate> + '_ {
        self.groups.iter().flat_map(|(_, group)| group.iter())
    }

    /// Batches over [`ordered`](Self::ordered)
    pub fn batches(&self, max_batch_size: usize) -> Vec<Batch> {
        coalesce_batches(self.ordered().map(DrawCandidate::material), max_batch_size)
    }

    /// Drop every pending candidate
    pub fn clear(&mut self) {
        self.groups.clear();
        self.group_index.clear();
        self.len = 0;
    }
}
