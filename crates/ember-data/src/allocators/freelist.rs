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

//! A free list caching one block size in front of a parent allocator.

use ember_core::memory::{round_up, Allocator, MemoryBlock, Owns};
use std::ptr;

struct FreeNode {
    next: *mut FreeNode,
}

/// Caches freed blocks of exactly `SIZE` bytes (rounded to the parent's
/// alignment) on a singly-linked list threaded through the blocks themselves.
///
/// Requests of any other size pass straight through to `P`. Cached blocks are
/// returned to the parent on drop.
pub struct Freelist<P: Allocator, const SIZE: usize> {
    parent: P,
    head: *mut FreeNode,
    cached: usize,
}

// The free list exclusively owns the cached blocks.
unsafe impl<P: Allocator + Send, const SIZE: usize> Send for Freelist<P, SIZE> {}

impl<P: Allocator, const SIZE: usize> Freelist<P, SIZE> {
    const BLOCK_LEN: usize = {
        assert!(
            SIZE >= std::mem::size_of::<*mut u8>(),
            "Freelist blocks must be able to hold a pointer"
        );
        round_up(SIZE, P::ALIGNMENT)
    };

    /// Wraps `parent`.
    pub fn new(parent: P) -> Self {
        Self {
            parent,
            head: ptr::null_mut(),
            cached: 0,
        }
    }

    /// Number of blocks currently cached.
    pub fn cached(&self) -> usize {
        self.cached
    }

    /// The wrapped allocator.
    pub fn parent(&self) -> &P {
        &self.parent
    }

    #[inline]
    fn matches(size: usize) -> bool {
        size != 0 && round_up(size, P::ALIGNMENT) == Self::BLOCK_LEN
    }
}

impl<P: Allocator + Default, const SIZE: usize> Default for Freelist<P, SIZE> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P: Allocator, const SIZE: usize> Allocator for Freelist<P, SIZE> {
    const ALIGNMENT: usize = P::ALIGNMENT;

    fn allocate(&mut self, size: usize) -> Option<MemoryBlock> {
        if !Self::matches(size) {
            return self.parent.allocate(size);
        }
        if self.head.is_null() {
            return self
                .parent
                .allocate(Self::BLOCK_LEN)
                .map(|block| block.with_len(Self::BLOCK_LEN));
        }
        let node = self.head;
        // SAFETY: `node` is a cached block we wrote a `FreeNode` into.
        self.head = unsafe { node.read_unaligned().next };
        self.cached -= 1;
        Some(MemoryBlock::new(node.cast(), Self::BLOCK_LEN))
    }

    fn deallocate(&mut self, block: MemoryBlock) {
        if block.is_null() {
            return;
        }
        if !Self::matches(block.len()) {
            self.parent.deallocate(block);
            return;
        }
        let node: *mut FreeNode = block.ptr().cast();
        // SAFETY: the block is live and at least pointer-sized.
        unsafe { node.write_unaligned(FreeNode { next: self.head }) };
        self.head = node;
        self.cached += 1;
    }

    fn expand(&mut self, block: &mut MemoryBlock, delta: usize) -> bool {
        if Self::matches(block.len()) {
            return false;
        }
        self.parent.expand(block, delta)
    }
}

impl<P: Owns, const SIZE: usize> Owns for Freelist<P, SIZE> {
    fn owns(&self, block: &MemoryBlock) -> bool {
        self.parent.owns(block)
    }
}

impl<P: Allocator, const SIZE: usize> Drop for Freelist<P, SIZE> {
    fn drop(&mut self) {
        while !self.head.is_null() {
            let node = self.head;
            // SAFETY: every node is a live cached block.
            self.head = unsafe { node.read_unaligned().next };
            self.parent
                .deallocate(MemoryBlock::new(node.cast(), Self::BLOCK_LEN));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::Mallocator;

    #[test]
    fn exact_size_blocks_are_recycled() {
        let mut list = Freelist::<Mallocator, 64>::default();
        let a = list.allocate(64).expect("a");
        list.deallocate(a);
        assert_eq!(list.cached(), 1);
        let b = list.allocate(64).expect("b");
        assert_eq!(a.ptr(), b.ptr());
        assert_eq!(list.cached(), 0);
        list.deallocate(b);
    }

    #[test]
    fn other_sizes_pass_through() {
        let mut list = Freelist::<Mallocator, 64>::default();
        let big = list.allocate(256).expect("big");
        list.deallocate(big);
        assert_eq!(list.cached(), 0);
    }

    #[test]
    fn lifo_order() {
        let mut list = Freelist::<Mallocator, 32>::default();
        let a = list.allocate(32).expect("a");
        let b = list.allocate(32).expect("b");
        list.deallocate(a);
        list.deallocate(b);
        assert_eq!(list.allocate(32).expect("first").ptr(), b.ptr());
        assert_eq!(list.allocate(32).expect("second").ptr(), a.ptr());
    }
}
