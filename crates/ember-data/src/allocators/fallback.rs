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

//! Primary-then-fallback composition.

use ember_core::memory::{Allocator, MemoryBlock, Owns};
use std::ptr;

/// Tries `P` first and falls back to `F` when `P` cannot serve a request.
///
/// Deallocation asks `P` whether it owns the block, which is why `P` must
/// implement [`Owns`].
#[derive(Debug, Default)]
pub struct FallbackAllocator<P: Owns, F: Allocator> {
    primary: P,
    fallback: F,
}

impl<P: Owns, F: Allocator> FallbackAllocator<P, F> {
    /// Combines two allocators.
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    /// The preferred allocator.
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The allocator used when the primary is exhausted.
    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl<P: Owns, F: Allocator> Allocator for FallbackAllocator<P, F> {
    const ALIGNMENT: usize = if P::ALIGNMENT < F::ALIGNMENT {
        P::ALIGNMENT
    } else {
        F::ALIGNMENT
    };

    fn allocate(&mut self, size: usize) -> Option<MemoryBlock> {
        self.primary
            .allocate(size)
            .or_else(|| self.fallback.allocate(size))
    }

    fn deallocate(&mut self, block: MemoryBlock) {
        if self.primary.owns(&block) {
            self.primary.deallocate(block);
        } else {
            self.fallback.deallocate(block);
        }
    }

    fn expand(&mut self, block: &mut MemoryBlock, delta: usize) -> bool {
        if self.primary.owns(block) {
            self.primary.expand(block, delta)
        } else {
            self.fallback.expand(block, delta)
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
        if !self.primary.owns(block) {
            return self.fallback.reallocate(block, new_size);
        }
        if self.primary.reallocate(block, new_size) {
            return true;
        }
        // The primary is full: migrate the block to the fallback.
        let Some(fresh) = self.fallback.allocate(new_size) else {
            return false;
        };
        // SAFETY: distinct live blocks; copy the overlapping prefix.
        unsafe {
            ptr::copy_nonoverlapping(block.ptr(), fresh.ptr(), block.len().min(fresh.len()));
        }
        self.primary.deallocate(*block);
        *block = fresh;
        true
    }
}

impl<P: Owns, F: Owns> Owns for FallbackAllocator<P, F> {
    fn owns(&self, block: &MemoryBlock) -> bool {
        self.primary.owns(block) || self.fallback.owns(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::{Mallocator, StackAllocator};

    #[test]
    fn overflow_goes_to_the_fallback() {
        let mut alloc = FallbackAllocator::<StackAllocator<64>, Mallocator>::default();
        let a = alloc.allocate(48).expect("a");
        let b = alloc.allocate(48).expect("b");
        assert!(alloc.primary().owns(&a));
        assert!(!alloc.primary().owns(&b));
        alloc.deallocate(b);
        alloc.deallocate(a);
        assert_eq!(alloc.primary().used(), 0);
    }

    #[test]
    fn reallocate_migrates_out_of_a_full_primary() {
        let mut alloc = FallbackAllocator::<StackAllocator<64>, Mallocator>::default();
        let _pin = alloc.allocate(16).expect("pin");
        let mut block = alloc.allocate(32).expect("block");
        // SAFETY: fresh block.
        unsafe { block.as_mut_slice().fill(3) };
        assert!(alloc.reallocate(&mut block, 256));
        assert!(!alloc.primary().owns(&block));
        // SAFETY: contents were copied.
        assert_eq!(unsafe { &block.as_slice()[..32] }, &[3u8; 32]);
        alloc.deallocate(block);
    }
}
