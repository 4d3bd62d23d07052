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

//! A bump allocator over a fixed inline buffer.

use super::bump::BumpCursor;
use ember_core::memory::{Allocator, BulkAllocator, MemoryBlock, Owns};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

#[repr(C, align(64))]
struct Storage<const SIZE: usize>([MaybeUninit<u8>; SIZE]);

/// Bump allocation over `SIZE` bytes stored inside the allocator itself.
///
/// Only the most recent block can be freed, grown or shrunk; freeing any other
/// block is a no-op until [`deallocate_all`](BulkAllocator::deallocate_all).
/// Because the bytes are inline, the allocator must not move while blocks are
/// outstanding.
pub struct StackAllocator<const SIZE: usize, const ALIGN: usize = 16> {
    storage: UnsafeCell<Storage<SIZE>>,
    cursor: BumpCursor,
}

impl<const SIZE: usize, const ALIGN: usize> StackAllocator<SIZE, ALIGN> {
    const VALID: () = assert!(
        ALIGN.is_power_of_two() && ALIGN <= 64,
        "StackAllocator alignment must be a power of two no larger than 64"
    );

    /// Creates an empty allocator.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        Self {
            storage: UnsafeCell::new(Storage([MaybeUninit::uninit(); SIZE])),
            cursor: BumpCursor::new(SIZE / ALIGN * ALIGN),
        }
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.storage.get().cast()
    }

    /// Bytes handed out so far.
    pub fn used(&self) -> usize {
        self.cursor.used()
    }

    /// Shrinks the most recent block in place by `delta` bytes.
    pub fn shrink(&mut self, block: &mut MemoryBlock, delta: usize) -> bool {
        let base = self.base();
        self.cursor.shrink(base, block, delta, ALIGN)
    }
}

impl<const SIZE: usize, const ALIGN: usize> Default for StackAllocator<SIZE, ALIGN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize, const ALIGN: usize> Allocator for StackAllocator<SIZE, ALIGN> {
    const ALIGNMENT: usize = ALIGN;

    fn allocate(&mut self, size: usize) -> Option<MemoryBlock> {
        let base = self.base();
        self.cursor.allocate(base, size, ALIGN)
    }

    fn deallocate(&mut self, block: MemoryBlock) {
        let base = self.base();
        self.cursor.deallocate(base, block, ALIGN);
    }

    fn expand(&mut self, block: &mut MemoryBlock, delta: usize) -> bool {
        let base = self.base();
        self.cursor.expand(base, block, delta, ALIGN)
    }
}

impl<const SIZE: usize, const ALIGN: usize> Owns for StackAllocator<SIZE, ALIGN> {
    fn owns(&self, block: &MemoryBlock) -> bool {
        self.cursor.owns(self.base(), block)
    }
}

impl<const SIZE: usize, const ALIGN: usize> BulkAllocator for StackAllocator<SIZE, ALIGN> {
    fn deallocate_all(&mut self) {
        self.cursor.reset();
    }

    fn allocate_all(&mut self) -> Option<MemoryBlock> {
        let base = self.base();
        self.cursor.allocate_all(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::memory::is_aligned;

    #[test]
    fn blocks_stay_inside_the_buffer() {
        let mut stack = StackAllocator::<256, 16>::new();
        let a = stack.allocate(10).expect("a");
        let b = stack.allocate(100).expect("b");
        assert_eq!(a.len(), 16);
        assert_eq!(b.len(), 112);
        assert!(is_aligned(a.ptr(), 16) && is_aligned(b.ptr(), 16));
        assert!(stack.owns(&a) && stack.owns(&b));
        assert_eq!(b.ptr() as usize, a.ptr() as usize + 16);
        assert!(stack.allocate(200).is_none());
    }

    #[test]
    fn only_the_head_block_is_freed() {
        let mut stack = StackAllocator::<256>::new();
        let a = stack.allocate(32).expect("a");
        let b = stack.allocate(32).expect("b");
        stack.deallocate(a);
        assert_eq!(stack.used(), 64);
        stack.deallocate(b);
        assert_eq!(stack.used(), 32);
        let c = stack.allocate(32).expect("c");
        assert_eq!(c.ptr(), b.ptr());
    }

    #[test]
    fn expand_and_shrink_at_head() {
        let mut stack = StackAllocator::<256>::new();
        let mut a = stack.allocate(16).expect("a");
        let mut b = stack.allocate(16).expect("b");
        assert!(!stack.expand(&mut a, 16));
        assert!(stack.expand(&mut b, 20));
        assert_eq!(b.len(), 48);
        assert_eq!(stack.used(), 64);
        assert!(stack.shrink(&mut b, 32));
        assert_eq!(b.len(), 16);
        assert_eq!(stack.used(), 32);
        assert!(!stack.expand(&mut b, 1024));
    }

    #[test]
    fn reallocate_grows_in_place_at_head() {
        let mut stack = StackAllocator::<256>::new();
        let mut a = stack.allocate(16).expect("a");
        let ptr = a.ptr();
        assert!(stack.reallocate(&mut a, 64));
        assert_eq!(a.ptr(), ptr);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn bulk_operations() {
        let mut stack = StackAllocator::<128>::new();
        let _ = stack.allocate(48).expect("a");
        let rest = stack.allocate_all().expect("rest");
        assert_eq!(rest.len(), 80);
        assert!(stack.allocate(1).is_none());
        stack.deallocate_all();
        assert_eq!(stack.used(), 0);
        assert!(stack.allocate(128).is_some());
    }

    #[test]
    fn foreign_blocks_are_not_owned() {
        let stack = StackAllocator::<64>::new();
        let mut other = [0u8; 16];
        assert!(!stack.owns(&MemoryBlock::new(other.as_mut_ptr(), 16)));
    }
}
