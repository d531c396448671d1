//! Draw batching
//!
//! A batch is a run of consecutive draws sharing one [`MaterialKey`], so the
//! material is bound once for the whole run. Batching works on an already
//! ordered sequence and never reorders it: for transparent draws the depth
//! order wins and only adjacent same-key draws are merged.

use std::ops::Range;

use crate::scene::MaterialKey;

/// A run of draws submitted under one material binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Material shared by every draw in the run
    pub key: MaterialKey,
    /// Positions of the draws in the ordered sequence
    pub range: Range<usize>,
}

impl Batch {
    /// Number of draws in the batch
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Whether the batch holds no draws
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Split an ordered key sequence into batches of adjacent equal keys
///
/// Runs longer than `max_batch_size` are split; a size of zero is treated as
/// one.
pub fn coalesce_batches<I>(keys: I, max_batch_size: usize) -> Vec<Batch>
where
    I: IntoIterator<Item = MaterialKey>,
{
    let max_batch_size = max_batch_size.max(1);
    let mut batches: Vec<Batch> = Vec::new();

    for (index, key) in keys.into_iter().enumerate() {
        match batches.last_mut() {
            Some(batch) if batch.key == key && batch.len() < max_batch_size => {
                batch.range.end = index + 1;
            }
            _ => batches.push(Batch {
                key,
                range: index..index + 1,
            }),
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ShaderId, TextureId};

    fn key(texture: u32) -> MaterialKey {
        MaterialKey::new(ShaderId::DEFAULT_AMBIENT, Some(TextureId(texture)))
    }

    #[test]
    fn test_adjacent_runs_merge() {
        let batches = coalesce_batches([key(1), key(1), key(2), key(2), key(2), key(1)], 100);
        assert_eq!(
            batches,
            vec![
                Batch { key: key(1), range: 0..2 },
                Batch { key: key(2), range: 2..5 },
                Batch { key: key(1), range: 5..6 },
            ]
        );
    }

    #[test]
    fn test_long_runs_split() {
        let batches = coalesce_batches(std::iter::repeat(key(3)).take(5), 2);
        let lens: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(lens, vec![2, 2, 1]);
        assert!(batches.iter().all(|b| b.key == key(3)));
    }

    #[test]
    fn test_empty_input() {
        assert!(coalesce_batches(std::iter::empty::<MaterialKey>(), 4).is_empty());
    }

    #[test]
    fn test_zero_max_is_one() {
        assert_eq!(coalesce_batches([key(1), key(1)], 0).len(), 2);
    }
}
