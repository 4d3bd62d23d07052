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

//! A linear allocator over reserved virtual memory.

use crate::virtual_memory::{page_size, VirtualRegion};
use ember_core::memory::{round_up, Allocator, BulkAllocator, MemoryBlock, Owns};
use std::io;

/// Bump allocation over a virtual reservation, committing pages on demand.
///
/// Individual deallocation is a no-op. [`reset`](Self::reset) rewinds while
/// keeping pages committed (per-frame scratch); [`deallocate_all`](BulkAllocator::deallocate_all)
/// rewinds and decommits every page.
#[derive(Debug)]
pub struct GrowingLinearAllocator<const ALIGN: usize = 16> {
    region: VirtualRegion,
    offset: usize,
}

impl<const ALIGN: usize> GrowingLinearAllocator<ALIGN> {
    const VALID: () = assert!(
        ALIGN.is_power_of_two() && ALIGN <= 4096,
        "GrowingLinearAllocator alignment must be a power of two no larger than a page"
    );

    /// Reserves `capacity` bytes of address space. No pages are committed yet.
    pub fn with_capacity(capacity: usize) -> io::Result<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        Ok(Self {
            region: VirtualRegion::reserve(capacity)?,
            offset: 0,
        })
    }

    /// Reserved bytes.
    pub fn capacity(&self) -> usize {
        self.region.reserved()
    }

    /// Bytes handed out since the last reset.
    pub fn used(&self) -> usize {
        self.offset
    }

    /// Bytes backed by physical pages.
    pub fn committed(&self) -> usize {
        self.region.committed()
    }

    /// Rewinds to the start, keeping committed pages for reuse.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    fn ensure_committed(&mut self, end: usize) -> bool {
        if end <= self.region.committed() {
            return true;
        }
        match self.region.commit(end) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Linear arena failed to commit {end} bytes: {e}");
                false
            }
        }
    }
}

impl<const ALIGN: usize> Allocator for GrowingLinearAllocator<ALIGN> {
    const ALIGNMENT: usize = ALIGN;

    fn allocate(&mut self, size: usize) -> Option<MemoryBlock> {
        let len = round_up(size, ALIGN);
        if len == 0 {
            return None;
        }
        let end = self.offset.checked_add(len)?;
        if end > self.region.reserved() || !self.ensure_committed(end) {
            return None;
        }
        // SAFETY: `[offset, end)` is committed and inside the reservation.
        let ptr = unsafe { self.region.base().add(self.offset) };
        self.offset = end;
        Some(MemoryBlock::new(ptr, len))
    }

    fn deallocate(&mut self, _block: MemoryBlock) {}

    fn expand(&mut self, block: &mut MemoryBlock, delta: usize) -> bool {
        let base = self.region.base() as usize;
        let old_len = round_up(block.len(), ALIGN);
        if block.ptr() as usize + old_len != base + self.offset {
            return false;
        }
        let new_len = round_up(block.len() + delta, ALIGN);
        let end = self.offset + (new_len - old_len);
        if end > self.region.reserved() || !self.ensure_committed(end) {
            return false;
        }
        self.offset = end;
        *block = block.with_len(new_len);
        true
    }
}

impl<const ALIGN: usize> Owns for GrowingLinearAllocator<ALIGN> {
    fn owns(&self, block: &MemoryBlock) -> bool {
        let base = self.region.base() as usize;
        let addr = block.ptr() as usize;
        addr >= base && addr < base + self.region.reserved()
    }
}

impl<const ALIGN: usize> BulkAllocator for GrowingLinearAllocator<ALIGN> {
    fn deallocate_all(&mut self) {
        self.offset = 0;
        self.region.decommit_all();
    }

    fn allocate_all(&mut self) -> Option<MemoryBlock> {
        let reserved = self.region.reserved();
        let len = reserved - self.offset;
        if len == 0 || !self.ensure_committed(reserved) {
            return None;
        }
        // SAFETY: offset < reserved.
        let ptr = unsafe { self.region.base().add(self.offset) };
        self.offset = reserved;
        Some(MemoryBlock::new(ptr, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::memory::is_aligned;

    #[test]
    fn commits_pages_on_demand() {
        let page = page_size();
        let mut arena = GrowingLinearAllocator::<16>::with_capacity(8 * page).expect("reserve");
        assert_eq!(arena.committed(), 0);

        let a = arena.allocate(100).expect("a");
        assert!(is_aligned(a.ptr(), 16));
        assert_eq!(arena.committed(), page);
        // SAFETY: the block is committed.
        unsafe { a.as_mut_slice().fill(1) };

        let b = arena.allocate(page).expect("b");
        assert_eq!(b.ptr() as usize, a.ptr() as usize + 112);
        assert_eq!(arena.committed(), 2 * page);
        assert!(arena.owns(&a) && arena.owns(&b));
    }

    #[test]
    fn deallocate_is_a_no_op() {
        let mut arena = GrowingLinearAllocator::<16>::with_capacity(page_size()).expect("reserve");
        let a = arena.allocate(64).expect("a");
        arena.deallocate(a);
        assert_eq!(arena.used(), 64);
    }

    #[test]
    fn exhausting_the_reservation_fails_cleanly() {
        let page = page_size();
        let mut arena = GrowingLinearAllocator::<64>::with_capacity(page).expect("reserve");
        assert!(arena.allocate(page).is_some());
        assert!(arena.allocate(1).is_none());
    }

    #[test]
    fn deallocate_all_decommits_while_reset_keeps_pages() {
        let page = page_size();
        let mut arena = GrowingLinearAllocator::<16>::with_capacity(4 * page).expect("reserve");
        arena.allocate(3 * page).expect("fill");
        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.committed(), 3 * page);

        arena.deallocate_all();
        assert_eq!(arena.committed(), 0);
        let again = arena.allocate(16).expect("reuse");
        assert_eq!(again.ptr(), arena.region.base());
    }
}
