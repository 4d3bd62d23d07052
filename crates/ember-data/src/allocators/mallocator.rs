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

//! The system-heap allocator.

use ember_core::memory::{round_up, stats, Allocator, MemoryBlock};
use std::alloc::{self, Layout};

/// Forwards to the system heap with a guaranteed 16-byte alignment.
///
/// Block lengths are rounded up to the alignment; blocks handed back with a
/// shorter length (as adapters such as [`AffixAllocator`](super::AffixAllocator)
/// reconstruct them) are rounded the same way before freeing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mallocator;

impl Mallocator {
    fn layout(len: usize) -> Option<Layout> {
        Layout::from_size_align(len, Self::ALIGNMENT).ok()
    }
}

impl Allocator for Mallocator {
    const ALIGNMENT: usize = 16;

    fn allocate(&mut self, size: usize) -> Option<MemoryBlock> {
        if size == 0 {
            return None;
        }
        let len = round_up(size, Self::ALIGNMENT);
        let layout = Self::layout(len)?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            log::warn!("System heap refused a {len}-byte allocation");
            return None;
        }
        stats::record_allocation(len);
        Some(MemoryBlock::new(ptr, len))
    }

    fn deallocate(&mut self, block: MemoryBlock) {
        if block.is_null() {
            return;
        }
        let len = round_up(block.len(), Self::ALIGNMENT);
        if let Some(layout) = Self::layout(len) {
            // SAFETY: the block was produced by `allocate` with this rounded layout.
            unsafe { alloc::dealloc(block.ptr(), layout) };
            stats::record_deallocation(len);
        }
    }

    fn reallocate(&mut self, block: &mut MemoryBlock, new_size: usize) -> bool {
        if block.is_null() {
            return match self.allocate(new_size) {
                Some(fresh) => {
                    *block = fresh;
                    true
                }
                None => false,
            };
        }
        if new_size == 0 {
            self.deallocate(*block);
            *block = MemoryBlock::null();
            return true;
        }
        let old_len = round_up(block.len(), Self::ALIGNMENT);
        let new_len = round_up(new_size, Self::ALIGNMENT);
        let Some(old_layout) = Self::layout(old_len) else {
            return false;
        };
        // SAFETY: the block came from `allocate` with `old_layout`; `new_len` is non-zero.
        let ptr = unsafe { alloc::realloc(block.ptr(), old_layout, new_len) };
        if ptr.is_null() {
            return false;
        }
        stats::record_reallocation(old_len, new_len);
        *block = MemoryBlock::new(ptr, new_len);
        true
    }
}
