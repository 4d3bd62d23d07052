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

//! Bump-pointer bookkeeping shared by the stack-shaped allocators.
//!
//! The cursor stores only offsets, so the owner decides where the bytes live
//! (inline storage, a parent block) and passes the base address on each call.

use ember_core::memory::{round_up, MemoryBlock};

#[derive(Debug, Clone, Copy)]
pub(crate) struct BumpCursor {
    offset: usize,
    capacity: usize,
}

impl BumpCursor {
    pub(crate) const fn new(capacity: usize) -> Self {
        Self {
            offset: 0,
            capacity,
        }
    }

    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.offset
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    #[inline]
    pub(crate) fn owns(&self, base: *mut u8, block: &MemoryBlock) -> bool {
        let start = base as usize;
        let addr = block.ptr() as usize;
        addr >= start && addr < start + self.capacity
    }

    #[inline]
    fn is_head(&self, base: *mut u8, block: &MemoryBlock, align: usize) -> bool {
        block.ptr() as usize + round_up(block.len(), align) == base as usize + self.offset
    }

    pub(crate) fn allocate(&mut self, base: *mut u8, size: usize, align: usize) -> Option<MemoryBlock> {
        let len = round_up(size, align);
        if len == 0 || len > self.remaining() {
            return None;
        }
        // SAFETY: offset + len <= capacity, so the result stays inside the storage.
        let ptr = unsafe { base.add(self.offset) };
        self.offset += len;
        Some(MemoryBlock::new(ptr, len))
    }

    /// Frees `block` if it is the most recent allocation; otherwise does nothing.
    pub(crate) fn deallocate(&mut self, base: *mut u8, block: MemoryBlock, align: usize) {
        if self.is_head(base, &block, align) {
            self.offset -= round_up(block.len(), align);
        }
    }

    pub(crate) fn expand(&mut self, base: *mut u8, block: &mut MemoryBlock, delta: usize, align: usize) -> bool {
        if !self.is_head(base, block, align) {
            return false;
        }
        let old_len = round_up(block.len(), align);
        let new_len = round_up(block.len() + delta, align);
        let extra = new_len - old_len;
        if extra > self.remaining() {
            return false;
        }
        self.offset += extra;
        *block = block.with_len(new_len);
        true
    }

    pub(crate) fn shrink(&mut self, base: *mut u8, block: &mut MemoryBlock, delta: usize, align: usize) -> bool {
        if !self.is_head(base, block, align) || delta > block.len() {
            return false;
        }
        let old_len = round_up(block.len(), align);
        let new_len = round_up(block.len() - delta, align);
        self.offset -= old_len - new_len;
        *block = block.with_len(new_len);
        true
    }

    pub(crate) fn allocate_all(&mut self, base: *mut u8) -> Option<MemoryBlock> {
        let len = self.remaining();
        if len == 0 {
            return None;
        }
        // SAFETY: offset <= capacity.
        let ptr = unsafe { base.add(self.offset) };
        self.offset = self.capacity;
        Some(MemoryBlock::new(ptr, len))
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.offset = 0;
    }
}
