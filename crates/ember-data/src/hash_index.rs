// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An open-chaining integer index over two flat arrays.
//!
//! A `HashIndex` maps integer keys (usually hashes) to payload indices stored
//! elsewhere. The front table, indexed by `key & mask`, holds the head of each
//! chain; the back table, indexed by payload slot, links each slot to the next
//! slot sharing its bucket. Duplicate keys are allowed: callers walk the chain
//! with [`first`](HashIndex::first)/[`next`](HashIndex::next) and compare the
//! payloads themselves.

/// Marks an empty bucket or the end of a chain.
pub const INVALID_INDEX: u32 = u32::MAX;

const DEFAULT_FRONT_SIZE: usize = 1024;

/// The two-array chained index. Single-writer.
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    hash: Vec<u32>,
    chain: Vec<u32>,
    mask: u32,
}

impl HashIndex {
    /// Creates an index; tables are allocated on first insertion.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index with the given table sizes.
    pub fn with_sizes(front_size: usize, back_size: usize) -> Self {
        let mut index = Self::new();
        index.allocate(front_size, back_size);
        index
    }

    /// (Re)allocates both tables, dropping every entry.
    ///
    /// # Panics
    ///
    /// Panics if `front_size` is not a power of two.
    pub fn allocate(&mut self, front_size: usize, back_size: usize) {
        assert!(
            front_size.is_power_of_two(),
            "HashIndex front size must be a power of two, got {front_size}"
        );
        self.hash = vec![INVALID_INDEX; front_size];
        self.chain = vec![INVALID_INDEX; back_size];
        self.mask = (front_size - 1) as u32;
    }

    /// Size of the front table.
    pub fn front_size(&self) -> usize {
        self.hash.len()
    }

    /// Size of the back table.
    pub fn back_size(&self) -> usize {
        self.chain.len()
    }

    /// Links `index` at the head of `key`'s chain.
    ///
    /// The back table grows to the next power of two covering `index`. Adding
    /// the same `(key, index)` twice without removing it is a contract violation.
    pub fn add(&mut self, key: u32, index: u32) {
        debug_assert_ne!(index, INVALID_INDEX, "INVALID_INDEX cannot be indexed");
        if self.hash.is_empty() {
            self.allocate(DEFAULT_FRONT_SIZE, 0);
        }
        let slot = index as usize;
        if slot >= self.chain.len() {
            let grown = (slot + 1).next_power_of_two();
            self.chain.resize(grown, INVALID_INDEX);
        }
        let bucket = (key & self.mask) as usize;
        self.chain[slot] = self.hash[bucket];
        self.hash[bucket] = index;
    }

    /// Unlinks `index` from `key`'s chain, keeping the order of its siblings.
    ///
    /// Does nothing if the pair is not present.
    pub fn remove(&mut self, key: u32, index: u32) {
        if self.hash.is_empty() || index as usize >= self.chain.len() {
            return;
        }
        let bucket = (key & self.mask) as usize;
        let slot = index as usize;
        if self.hash[bucket] == index {
            self.hash[bucket] = self.chain[slot];
            self.chain[slot] = INVALID_INDEX;
            return;
        }
        let mut cursor = self.hash[bucket];
        while cursor != INVALID_INDEX {
            let next = self.chain[cursor as usize];
            if next == index {
                self.chain[cursor as usize] = self.chain[slot];
                self.chain[slot] = INVALID_INDEX;
                return;
            }
            cursor = next;
        }
    }

    /// Head of `key`'s chain, or [`INVALID_INDEX`].
    #[inline]
    pub fn first(&self, key: u32) -> u32 {
        if self.hash.is_empty() {
            return INVALID_INDEX;
        }
        self.hash[(key & self.mask) as usize]
    }

    /// Successor of `index` on its chain, or [`INVALID_INDEX`].
    #[inline]
    pub fn next(&self, index: u32) -> u32 {
        self.chain
            .get(index as usize)
            .copied()
            .unwrap_or(INVALID_INDEX)
    }

    /// Iterates over every index on `key`'s chain, most recent first.
    ///
    /// Chains are shared by every key in a bucket, so callers still compare payloads.
    pub fn chain(&self, key: u32) -> impl Iterator<Item = u32> + '_ {
        let mut cursor = self.first(key);
        std::iter::from_fn(move || {
            if cursor == INVALID_INDEX {
                return None;
            }
            let current = cursor;
            cursor = self.next(current);
            Some(current)
        })
    }

    /// Empties the index, keeping table sizes.
    pub fn clear(&mut self) {
        self.hash.fill(INVALID_INDEX);
        self.chain.fill(INVALID_INDEX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_index_has_no_chains() {
        let index = HashIndex::new();
        assert_eq!(index.first(42), INVALID_INDEX);
        assert_eq!(index.next(0), INVALID_INDEX);
    }

    #[test]
    fn add_links_at_the_head() {
        let mut index = HashIndex::with_sizes(16, 4);
        index.add(3, 0);
        index.add(3, 1);
        index.add(19, 2);
        assert_eq!(index.chain(3).collect::<Vec<_>>(), vec![2, 1, 0]);
    }

    #[test]
    fn back_table_grows_to_a_power_of_two() {
        let mut index = HashIndex::with_sizes(8, 2);
        index.add(1, 9);
        assert_eq!(index.back_size(), 16);
        assert_eq!(index.first(1), 9);
    }

    #[test]
    fn remove_preserves_sibling_order() {
        let mut index = HashIndex::with_sizes(4, 8);
        for i in 0..5 {
            index.add(2, i);
        }
        index.remove(2, 2);
        assert_eq!(index.chain(2).collect::<Vec<_>>(), vec![4, 3, 1, 0]);
        index.remove(2, 4);
        assert_eq!(index.chain(2).collect::<Vec<_>>(), vec![3, 1, 0]);
        index.remove(2, 0);
        assert_eq!(index.chain(2).collect::<Vec<_>>(), vec![3, 1]);
    }

    #[test]
    fn removing_an_absent_pair_leaves_other_chains_intact() {
        let mut index = HashIndex::with_sizes(4, 8);
        index.add(1, 0);
        index.add(1, 1);
        index.remove(2, 1);
        assert_eq!(index.chain(1).collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn front_size_must_be_a_power_of_two() {
        HashIndex::with_sizes(12, 4);
    }

    proptest! {
        #[test]
        fn removed_indices_never_reappear(
            keys in proptest::collection::vec(any::<u32>(), 1..64),
            remove_mask in proptest::collection::vec(any::<bool>(), 64),
        ) {
            let mut index = HashIndex::with_sizes(16, 4);
            for (i, key) in keys.iter().enumerate() {
                index.add(*key, i as u32);
            }
            for (i, key) in keys.iter().enumerate() {
                if remove_mask[i] {
                    index.remove(*key, i as u32);
                }
            }
            for (i, key) in keys.iter().enumerate() {
                let found = index.chain(*key).any(|slot| slot == i as u32);
                prop_assert_eq!(found, !remove_mask[i]);
            }
        }
    }
}
