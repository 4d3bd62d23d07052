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

//! Prefix/suffix bracketing around every block.

use ember_core::memory::{round_up, Allocator, MemoryBlock, Owns};
use std::ptr;

/// Reserves `PREFIX` bytes before and `SUFFIX` bytes after each user block.
///
/// The prefix is padded to the parent's alignment so the user pointer keeps
/// that alignment. The user sees exactly the requested length; the suffix
/// starts right after it. Useful for headers, canaries and debug fences.
#[derive(Debug, Default)]
pub struct AffixAllocator<A: Allocator, const PREFIX: usize, const SUFFIX: usize> {
    inner: A,
}

impl<A: Allocator, const PREFIX: usize, const SUFFIX: usize> AffixAllocator<A, PREFIX, SUFFIX> {
    /// Bytes between the start of the parent block and the user pointer.
    pub const PREFIX_LEN: usize = round_up(PREFIX, A::ALIGNMENT);

    /// Wraps `inner`.
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    /// Start of the prefix area of a user block.
    pub fn prefix(&self, block: &MemoryBlock) -> *mut u8 {
        block.ptr().wrapping_sub(Self::PREFIX_LEN)
    }

    /// Start of the suffix area of a user block.
    pub fn suffix(&self, block: &MemoryBlock) -> *mut u8 {
        block.end()
    }

    #[inline]
    fn outer(block: &MemoryBlock) -> MemoryBlock {
        MemoryBlock::new(
            block.ptr().wrapping_sub(Self::PREFIX_LEN),
            Self::PREFIX_LEN + block.len() + SUFFIX,
        )
    }

    #[inline]
    fn user(outer: MemoryBlock, size: usize) -> MemoryBlock {
        // SAFETY: the outer block holds PREFIX_LEN + size + SUFFIX bytes.
        MemoryBlock::new(unsafe { outer.ptr().add(Self::PREFIX_LEN) }, size)
    }
}

impl<A: Allocator, const PREFIX: usize, const SUFFIX: usize> Allocator
    for AffixAllocator<A, PREFIX, SUFFIX>
{
    const ALIGNMENT: usize = A::ALIGNMENT;

    fn allocate(&mut self, size: usize) -> Option<MemoryBlock> {
        if size == 0 {
            return None;
        }
        let outer = self.inner.allocate(Self::PREFIX_LEN + size + SUFFIX)?;
        Some(Self::user(outer, size))
    }

    fn deallocate(&mut self, block: MemoryBlock) {
        if block.is_null() {
            return;
        }
        self.inner.deallocate(Self::outer(&block));
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
        let Some(fresh) = self.allocate(new_size) else {
            return false;
        };
        // SAFETY: distinct live blocks; the prefix and the common user prefix are copied.
        unsafe {
            ptr::copy_nonoverlapping(
                self.prefix(block),
                self.prefix(&fresh),
                Self::PREFIX_LEN + block.len().min(new_size),
            );
        }
        self.deallocate(*block);
        *block = fresh;
        true
    }
}

impl<A: Owns, const PREFIX: usize, const SUFFIX: usize> Owns for AffixAllocator<A, PREFIX, SUFFIX> {
    fn owns(&self, block: &MemoryBlock) -> bool {
        self.inner.owns(&Self::outer(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::{Mallocator, StackAllocator};
    use ember_core::memory::is_aligned;

    #[test]
    fn user_block_is_bracketed_and_aligned() {
        let mut alloc = AffixAllocator::<Mallocator, 8, 4>::default();
        assert_eq!(AffixAllocator::<Mallocator, 8, 4>::PREFIX_LEN, 16);
        let block = alloc.allocate(20).expect("block");
        assert_eq!(block.len(), 20);
        assert!(is_aligned(block.ptr(), 16));
        assert_eq!(alloc.prefix(&block) as usize + 16, block.ptr() as usize);
        assert_eq!(alloc.suffix(&block) as usize, block.ptr() as usize + 20);

        // SAFETY: prefix, user area and suffix are all inside the parent block.
        unsafe {
            alloc.prefix(&block).cast::<u64>().write(0xFEED);
            block.as_mut_slice().fill(1);
            alloc.suffix(&block).cast::<[u8; 4]>().write_unaligned(*b"END!");
            assert_eq!(alloc.prefix(&block).cast::<u64>().read(), 0xFEED);
            assert_eq!(alloc.suffix(&block).cast::<[u8; 4]>().read_unaligned(), *b"END!");
        }
        alloc.deallocate(block);
    }

    #[test]
    fn deallocate_returns_the_whole_parent_block() {
        let mut alloc = AffixAllocator::<StackAllocator<256>, 8, 8>::default();
        let block = alloc.allocate(10).expect("block");
        assert!(alloc.owns(&block));
        alloc.deallocate(block);
        let again = alloc.allocate(10).expect("again");
        assert_eq!(again.ptr(), block.ptr());
    }

    #[test]
    fn reallocate_keeps_the_prefix() {
        let mut alloc = AffixAllocator::<Mallocator, 16, 0>::default();
        let mut block = alloc.allocate(8).expect("block");
        // SAFETY: the prefix is inside the parent block.
        unsafe { alloc.prefix(&block).write(42) };
        assert!(alloc.reallocate(&mut block, 512));
        assert_eq!(block.len(), 512);
        // SAFETY: the prefix was carried over.
        assert_eq!(unsafe { alloc.prefix(&block).read() }, 42);
        alloc.deallocate(block);
    }
}
