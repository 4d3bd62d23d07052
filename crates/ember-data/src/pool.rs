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

//! Fixed-capacity typed pools addressed by [`Handle`]s.

use std::fmt;
use std::ops::{Index, IndexMut};

use ember_core::renderer::Handle;

const END_OF_LIST: u32 = u32::MAX;

enum Slot<R> {
    Occupied(R),
    Vacant { next_free: u32 },
}

/// A dense array of records with an intrusive free list of vacant slots.
///
/// Slots are handed out lowest-index-first on a fresh pool and then LIFO from
/// the free list. Handles carry no generation, so a destroyed handle must not be
/// reused. Exceeding the capacity panics.
pub struct ResourcePool<K, R> {
    name: &'static str,
    slots: Vec<Slot<R>>,
    free_head: u32,
    len: usize,
    capacity: usize,
    _kind: std::marker::PhantomData<fn() -> K>,
}

impl<K, R> ResourcePool<K, R> {
    /// Creates an empty pool. `name` appears in exhaustion diagnostics.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        assert!(
            capacity < END_OF_LIST as usize,
            "pool `{name}` capacity {capacity} collides with the INVALID handle"
        );
        Self {
            name,
            slots: Vec::new(),
            free_head: END_OF_LIST,
            len: 0,
            capacity,
            _kind: std::marker::PhantomData,
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Live records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no record is live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of live records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stores `record` in a vacant slot and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics when every slot is occupied.
    pub fn insert(&mut self, record: R) -> Handle<K> {
        let index = if self.free_head != END_OF_LIST {
            let index = self.free_head;
            let Slot::Vacant { next_free } = self.slots[index as usize] else {
                unreachable!("pool `{}` free list points at a live slot", self.name);
            };
            self.free_head = next_free;
            self.slots[index as usize] = Slot::Occupied(record);
            index
        } else {
            if self.slots.len() >= self.capacity {
                panic!(
                    "pool `{}` exhausted: all {} slots are live; destroy resources or raise the pool capacity",
                    self.name, self.capacity
                );
            }
            self.slots.push(Slot::Occupied(record));
            (self.slots.len() - 1) as u32
        };
        self.len += 1;
        log::trace!("pool `{}`: created #{index}", self.name);
        Handle::from_index(index)
    }

    /// Stores a default record and returns its handle and a reference to it.
    pub fn create(&mut self) -> (Handle<K>, &mut R)
    where
        R: Default,
    {
        let handle = self.insert(R::default());
        (handle, &mut self[handle])
    }

    /// Vacates the slot of `handle` and returns its record.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already vacant (double destroy) or out of range.
    pub fn remove(&mut self, handle: Handle<K>) -> R {
        let index = handle.index();
        let slot = self.slots.get_mut(index as usize).unwrap_or_else(|| {
            panic!("pool `{}`: handle #{index} was never issued", self.name)
        });
        let vacant = Slot::Vacant {
            next_free: self.free_head,
        };
        match std::mem::replace(slot, vacant) {
            Slot::Occupied(record) => {
                self.free_head = index;
                self.len -= 1;
                log::trace!("pool `{}`: destroyed #{index}", self.name);
                record
            }
            Slot::Vacant { next_free } => {
                *slot = Slot::Vacant { next_free };
                panic!("pool `{}`: double destroy of #{index}", self.name);
            }
        }
    }

    /// Returns the record of `handle`, if live.
    pub fn get(&self, handle: Handle<K>) -> Option<&R> {
        match self.slots.get(handle.index() as usize) {
            Some(Slot::Occupied(record)) => Some(record),
            _ => None,
        }
    }

    /// Returns the record of `handle` mutably, if live.
    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut R> {
        match self.slots.get_mut(handle.index() as usize) {
            Some(Slot::Occupied(record)) => Some(record),
            _ => None,
        }
    }

    /// Returns `true` if `handle` addresses a live record.
    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_some()
    }

    /// Iterates over live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &R)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(record) => Some((Handle::from_index(index as u32), record)),
                Slot::Vacant { .. } => None,
            })
    }

    /// Removes every record, returning them in slot order.
    pub fn drain(&mut self) -> Vec<(Handle<K>, R)> {
        let slots = std::mem::take(&mut self.slots);
        self.free_head = END_OF_LIST;
        self.len = 0;
        slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(record) => Some((Handle::from_index(index as u32), record)),
                Slot::Vacant { .. } => None,
            })
            .collect()
    }
}

impl<K, R> Index<Handle<K>> for ResourcePool<K, R> {
    type Output = R;

    fn index(&self, handle: Handle<K>) -> &R {
        match self.get(handle) {
            Some(record) => record,
            None => panic!("pool `{}`: stale or invalid handle {handle:?}", self.name),
        }
    }
}

impl<K, R> IndexMut<Handle<K>> for ResourcePool<K, R> {
    fn index_mut(&mut self, handle: Handle<K>) -> &mut R {
        let name = self.name;
        match self.get_mut(handle) {
            Some(record) => record,
            None => panic!("pool `{name}`: stale or invalid handle {handle:?}"),
        }
    }
}

impl<K, R> fmt::Debug for ResourcePool<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}
