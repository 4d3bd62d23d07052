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

//! The memory-block contract shared by every allocator in the engine.
//!
//! Allocators deal exclusively in [`MemoryBlock`]s: a raw pointer paired with the
//! length actually reserved. The length may exceed the request because of
//! alignment rounding, and callers must hand the exact block back when freeing.

pub mod stats;

use std::ptr;

/// A raw region of memory handed out by an [`Allocator`].
///
/// A block does not own its memory: ownership stays with the allocator that
/// produced it until the block is explicitly deallocated. Blocks must never be
/// used after their allocator is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    ptr: *mut u8,
    len: usize,
}

// A block is an address range; exclusive use is a contract of the allocator API.
unsafe impl Send for MemoryBlock {}

impl MemoryBlock {
    /// Creates a block from a raw pointer and a length.
    pub const fn new(ptr: *mut u8, len: usize) -> Self {
        Self { ptr, len }
    }

    /// The null block, used for "no allocation".
    pub const fn null() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    /// Returns the start of the block.
    #[inline]
    pub fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Returns the number of usable bytes in the block.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the block has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if this is the null block.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Returns the one-past-the-end address of the block.
    #[inline]
    pub fn end(&self) -> *mut u8 {
        self.ptr.wrapping_add(self.len)
    }

    /// Returns a copy of the block with a different length.
    #[inline]
    pub fn with_len(self, len: usize) -> Self {
        Self { ptr: self.ptr, len }
    }

    /// Returns `true` if `addr` lies inside the block.
    #[inline]
    pub fn contains(&self, addr: *const u8) -> bool {
        let start = self.ptr as usize;
        let addr = addr as usize;
        addr >= start && addr < start + self.len
    }

    /// Views the block as a byte slice.
    ///
    /// # Safety
    ///
    /// The block must be live, initialized for `len` bytes, and not mutated
    /// through another alias for the returned lifetime.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        if self.ptr.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.ptr, self.len)
    }

    /// Views the block as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// The block must be live and not aliased for the returned lifetime.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        if self.ptr.is_null() {
            return &mut [];
        }
        std::slice::from_raw_parts_mut(self.ptr, self.len)
    }
}

impl Default for MemoryBlock {
    fn default() -> Self {
        Self::null()
    }
}

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
#[inline]
pub const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Returns `true` if `ptr` is a multiple of `align`.
#[inline]
pub fn is_aligned(ptr: *const u8, align: usize) -> bool {
    (ptr as usize) & (align - 1) == 0
}

/// The composable allocator contract.
///
/// Every allocator declares a static minimum [`ALIGNMENT`](Allocator::ALIGNMENT);
/// every block it returns starts on that boundary and is at least as long as
/// requested. Allocation failure is reported as `None`, never as a panic, so
/// that combinators such as a fallback allocator can react to it.
pub trait Allocator {
    /// The alignment guaranteed for every block returned by this allocator.
    const ALIGNMENT: usize;

    /// Allocates at least `size` bytes. Returns `None` when the request cannot be served.
    fn allocate(&mut self, size: usize) -> Option<MemoryBlock>;

    /// Returns a block to this allocator. The block must have been produced by it.
    fn deallocate(&mut self, block: MemoryBlock);

    /// Tries to grow `block` in place by `delta` bytes.
    ///
    /// Only allocators that can extend a block without moving it implement this;
    /// the default refuses.
    fn expand(&mut self, _block: &mut MemoryBlock, _delta: usize) -> bool {
        false
    }

    /// Resizes `block` to `new_size` bytes, possibly moving it.
    ///
    /// On success `block` is rebound to the new region; callers must not keep the
    /// old pointer. On failure `block` is untouched.
    fn reallocate(&mut self, block: &mut MemoryBlock, new_size: usize) -> bool
    where
        Self: Sized,
    {
        reallocate_by_copy(self, block, new_size)
    }
}

/// Allocators that can tell whether a block originated from them.
///
/// Required by routing combinators (fallback, segregator). Must be O(1) except
/// for allocators that manage a list of regions.
pub trait Owns: Allocator {
    /// Returns `true` if `block` was produced by this allocator.
    fn owns(&self, block: &MemoryBlock) -> bool;
}

/// Allocators with a defined bulk teardown.
pub trait BulkAllocator: Allocator {
    /// Frees every outstanding block at once.
    fn deallocate_all(&mut self);

    /// Hands out all remaining capacity as a single block.
    fn allocate_all(&mut self) -> Option<MemoryBlock>;
}

/// The generic reallocation strategy: try in place, otherwise allocate, copy and free.
pub fn reallocate_by_copy<A: Allocator>(
    allocator: &mut A,
    block: &mut MemoryBlock,
    new_size: usize,
) -> bool {
    if block.is_null() {
        return match allocator.allocate(new_size) {
            Some(fresh) => {
                *block = fresh;
                true
            }
            None => false,
        };
    }
    if new_size == 0 {
        allocator.deallocate(*block);
        *block = MemoryBlock::null();
        return true;
    }
    if new_size <= block.len() {
        return true;
    }
    if allocator.expand(block, new_size - block.len()) {
        return true;
    }
    let Some(fresh) = allocator.allocate(new_size) else {
        return false;
    };
    // SAFETY: both blocks are live and distinct; we copy the old contents only.
    unsafe {
        ptr::copy_nonoverlapping(block.ptr(), fresh.ptr(), block.len().min(fresh.len()));
    }
    allocator.deallocate(*block);
    *block = fresh;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_to_power_of_two() {
        assert_eq!(round_up(0, 16), 0);
        assert_eq!(round_up(1, 16), 16);
        assert_eq!(round_up(16, 16), 16);
        assert_eq!(round_up(17, 8), 24);
    }

    #[test]
    fn null_block_is_empty() {
        let block = MemoryBlock::null();
        assert!(block.is_null());
        assert!(block.is_empty());
        assert_eq!(unsafe { block.as_slice() }.len(), 0);
    }

    #[test]
    fn block_contains_its_range_only() {
        let mut storage = [0u8; 32];
        let block = MemoryBlock::new(storage.as_mut_ptr(), 16);
        assert!(block.contains(storage.as_ptr()));
        assert!(block.contains(unsafe { storage.as_ptr().add(15) }));
        assert!(!block.contains(unsafe { storage.as_ptr().add(16) }));
        assert_eq!(block.end(), unsafe { storage.as_mut_ptr().add(16) });
    }
}
