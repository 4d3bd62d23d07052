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

//! Size-based routing between two allocators.

use ember_core::memory::{reallocate_by_copy, Allocator, MemoryBlock, Owns};

const fn min(a: usize, b: usize) -> usize {
    if a < b {
        a
    } else {
        b
    }
}

/// Sends requests of at most `THRESHOLD` bytes to `S` and larger ones to `L`.
///
/// Deallocation routes on the block length, so `THRESHOLD` must be a multiple
/// of `S::ALIGNMENT`: a small block rounded up by `S` then still routes back to it.
#[derive(Debug, Default)]
pub struct Segregator<const THRESHOLD: usize, S: Allocator, L: Allocator> {
    small: S,
    large: L,
}

impl<const THRESHOLD: usize, S: Allocator, L: Allocator> Segregator<THRESHOLD, S, L> {
    const VALID: () = assert!(
        THRESHOLD % S::ALIGNMENT == 0,
        "Segregator threshold must be a multiple of the small allocator's alignment"
    );

    /// Combines two allocators.
    pub fn new(small: S, large: L) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        Self { small, large }
    }

    /// The allocator serving small requests.
    pub fn small(&self) -> &S {
        &self.small
    }

    /// The allocator serving large requests.
    pub fn large(&self) -> &L {
        &self.large
    }

    #[inline]
    fn is_small(size: usize) -> bool {
        size <= THRESHOLD
    }
}

impl<const THRESHOLD: usize, S: Allocator, L: Allocator> Allocator for Segregator<THRESHOLD, S, L> {
    const ALIGNMENT: usize = min(S::ALIGNMENT, L::ALIGNMENT);

    fn allocate(&mut self, size: usize) -> Option<MemoryBlock> {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        if Self::is_small(size) {
            self.small.allocate(size)
        } else {
            self.large.allocate(size)
        }
    }

    fn deallocate(&mut self, block: MemoryBlock) {
        if Self::is_small(block.len()) {
            self.small.deallocate(block)
        } else {
            self.large.deallocate(block)
        }
    }

    fn expand(&mut self, block: &mut MemoryBlock, delta: usize) -> bool {
        let old_small = Self::is_small(block.len());
        if old_small != Self::is_small(block.len() + delta) {
            return false;
        }
        if old_small {
            self.small.expand(block, delta)
        } else {
            self.large.expand(block, delta)
        }
    }

    fn reallocate(&mut self, block: &mut MemoryBlock, new_size: usize) -> bool {
        if block.is_null() || new_size == 0 {
            return reallocate_by_copy(self, block, new_size);
        }
        match (Self::is_small(block.len()), Self::is_small(new_size)) {
            (true, true) => self.small.reallocate(block, new_size),
            (false, false) => self.large.reallocate(block, new_size),
            _ => reallocate_by_copy(self, block, new_size),
        }
    }
}

impl<const THRESHOLD: usize, S: Owns, L: Owns> Owns for Segregator<THRESHOLD, S, L> {
    fn owns(&self, block: &MemoryBlock) -> bool {
        if Self::is_small(block.len()) {
            self.small.owns(block)
        } else {
            self.large.owns(block)
        }
    }
}
