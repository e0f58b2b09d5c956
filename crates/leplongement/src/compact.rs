// Property compaction
//
// Maps arbitrary category values to dense zero-based ids in the natural order
// of the distinct values.

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// Map each distinct value to its rank among the sorted distinct values
///
/// Empty input yields an empty map.
pub fn compact_property<T, I>(values: I) -> HashMap<T, usize>
where
    T: Ord + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    CompactIndex::from_values(values).into_map()
}

/// Bidirectional value <-> compact id table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactIndex<T: Ord + Hash + Clone> {
    ids: HashMap<T, usize>,
    values: Vec<T>,
}

impl<T: Ord + Hash + Clone> CompactIndex<T> {
    /// Compact a sequence of values (duplicates allowed)
    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Self {
        let distinct: BTreeSet<T> = values.into_iter().collect();
        let values: Vec<T> = distinct.into_iter().collect();
        let ids = values
            .iter()
            .enumerate()
            .map(|(id, v)| (v.clone(), id))
            .collect();
        Self { ids, values }
    }

    /// Compact id of `value`
    pub fn id<Q>(&self, value: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ids.get(value).copied()
    }

    /// Value behind a compact id
    pub fn value(&self, id: usize) -> Option<&T> {
        self.values.get(id)
    }

    /// Values in id order
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no values were compacted
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the forward map
    pub fn as_map(&self) -> &HashMap<T, usize> {
        &self.ids
    }

    /// Take the forward map
    pub fn into_map(self) -> HashMap<T, usize> {
        self.ids
    }
}
