//! # Recursive splitting of observations into groups
//!
//! A [`RecursiveSplitter`] starts with a single group holding the positions `0..n` and is
//! refined by successive calls to [`RecursiveSplitter::group_by`]: each call splits every
//! existing group so that positions sharing a key end up in the same (contiguous) sub-group.
//! Splitting by station id and then by date, for instance, yields one group per
//! `(station, date)` pair.
//!
//! Ordering
//! -----------------
//! * Positions inside a group keep their relative order (stable partitioning).
//! * By default, sub-groups are emitted in the order their key is first encountered.
//! * In **OPS compatibility mode**, sub-groups are emitted in ascending key order, which is how
//!   the legacy sort-based splitter enumerated them.
//!
//! Example
//! -----------------
//! ```rust
//! use obsqc::recursive_splitter::RecursiveSplitter;
//!
//! let mut splitter = RecursiveSplitter::new(5, false);
//! splitter.group_by(&["b", "a", "b", "c", "a"]);
//!
//! let groups: Vec<Vec<usize>> = splitter.groups().map(<[usize]>::to_vec).collect();
//! assert_eq!(groups, vec![vec![0, 2], vec![1, 4], vec![3]]);
//! ```

use std::{collections::HashMap, hash::Hash, ops::Range};

use ahash::RandomState;
use itertools::Itertools;

/// Partition of the positions `0..n` into ordered groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursiveSplitter {
    ordered_ids: Vec<usize>,
    /// Start of every group, followed by `ordered_ids.len()`.
    bounds: Vec<usize>,
    ops_compatibility_mode: bool,
}

impl RecursiveSplitter {
    /// A splitter holding one group with all positions `0..num_ids` (no group if `num_ids == 0`).
    pub fn new(num_ids: usize, ops_compatibility_mode: bool) -> Self {
        let bounds = if num_ids == 0 {
            vec![0]
        } else {
            vec![0, num_ids]
        };
        RecursiveSplitter {
            ordered_ids: (0..num_ids).collect(),
            bounds,
            ops_compatibility_mode,
        }
    }

    pub fn ops_compatibility_mode(&self) -> bool {
        self.ops_compatibility_mode
    }

    /// Number of positions being split.
    pub fn num_ids(&self) -> usize {
        self.ordered_ids.len()
    }

    pub fn num_groups(&self) -> usize {
        self.bounds.len() - 1
    }

    fn group_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.bounds.windows(2).map(|w| w[0]..w[1])
    }

    /// Split every group further so that positions with equal `categories` share a group.
    ///
    /// `categories[i]` is the key of position `i`.
    ///
    /// Panics
    /// ----------
    /// * if `categories.len()` differs from the number of positions.
    pub fn group_by<K>(&mut self, categories: &[K])
    where
        K: Eq + Hash + Ord,
    {
        assert_eq!(
            categories.len(),
            self.ordered_ids.len(),
            "one category per position is required"
        );

        let ranges: Vec<Range<usize>> = self.group_ranges().collect();
        let mut bounds = Vec::with_capacity(self.bounds.len());
        bounds.push(0);

        for range in ranges {
            let ids = &mut self.ordered_ids[range.clone()];

            if self.ops_compatibility_mode {
                ids.sort_by(|&a, &b| categories[a].cmp(&categories[b]));
            } else {
                let mut bucket_of: HashMap<&K, usize, RandomState> = HashMap::default();
                let mut buckets: Vec<Vec<usize>> = Vec::new();
                for &id in ids.iter() {
                    let next = buckets.len();
                    let bucket = *bucket_of.entry(&categories[id]).or_insert(next);
                    if bucket == next {
                        buckets.push(Vec::new());
                    }
                    buckets[bucket].push(id);
                }
                for (slot, id) in ids.iter_mut().zip(buckets.into_iter().flatten()) {
                    *slot = id;
                }
            }

            let mut end = range.start;
            for (_, chunk) in &ids.iter().chunk_by(|&&id| &categories[id]) {
                end += chunk.count();
                bounds.push(end);
            }
        }

        self.bounds = bounds;
    }

    /// Stable-sort the positions inside every group by `key`; group membership is unchanged.
    pub fn sort_groups_by<K, F>(&mut self, mut key: F)
    where
        K: Ord,
        F: FnMut(usize) -> K,
    {
        let ranges: Vec<Range<usize>> = self.group_ranges().collect();
        for range in ranges {
            self.ordered_ids[range].sort_by_key(|&id| key(id));
        }
    }

    /// All groups, in order; each group lists its positions in order.
    pub fn groups(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.group_ranges().map(move |range| &self.ordered_ids[range])
    }

    /// Groups with at least two positions.
    pub fn multi_element_groups(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.groups().filter(|group| group.len() > 1)
    }
}
