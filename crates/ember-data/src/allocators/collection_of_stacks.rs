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

//! A growable list of fixed-size stacks carved from a parent allocator.

use super::bump::BumpCursor;
use ember_core::memory::{round_up, Allocator, BulkAllocator, MemoryBlock, Owns};

struct Stack {
    raw: MemoryBlock,
    base: *mut u8,
    cursor: BumpCursor,
}

/// Bump-allocates from stacks of `STACK_SIZE` bytes, adding a stack from `P`
/// whenever none of the existing ones can serve a request.
///
/// No request larger than `STACK_SIZE` ever succeeds. Ownership and
/// deallocation search the stack list linearly.
pub struct CollectionOfStacksAllocator<P: Allocator, const STACK_SIZE: usize, const ALIGN: usize = 16> {
    parent: P,
    stacks: Vec<Stack>,
}

// The collection exclusively owns every stack it carved from the parent.
unsafe impl<P: Allocator + Send, const STACK_SIZE: usize, const ALIGN: usize> Send
    for CollectionOfStacksAllocator<P, STACK_SIZE, ALIGN>
{
}

impl<P: Allocator, const STACK_SIZE: usize, const ALIGN: usize>
    CollectionOfStacksAllocator<P, STACK_SIZE, ALIGN>
{
    const CAPACITY: usize = {
        assert!(ALIGN.is_power_of_two(), "stack alignment must be a power of two");
        assert!(STACK_SIZE >= ALIGN, "stack size must hold at least one aligned block");
        STACK_SIZE / ALIGN * ALIGN
    };

    /// Creates an empty collection over `parent`.
    pub fn new(parent: P) -> Self {
        Self {
            parent,
            stacks: Vec::new(),
        }
    }

    /// Number of stacks obtained from the parent so far.
    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    fn push_stack(&mut self) -> Option<&mut Stack> {
        let slack = ALIGN.saturating_sub(P::ALIGNMENT);
        let raw = self.parent.allocate(Self::CAPACITY + slack)?;
        let base = round_up(raw.ptr() as usize, ALIGN) as *mut u8;
        log::trace!(
            "Collection of stacks grew to {} stacks of {} bytes",
            self.stacks.len() + 1,
            Self::CAPACITY
        );
        self.stacks.push(Stack {
            raw,
            base,
            cursor: BumpCursor::new(Self::CAPACITY),
        });
        self.stacks.last_mut()
    }

    fn find(&mut self, block: &MemoryBlock) -> Option<&mut Stack> {
        self.stacks
            .iter_mut()
            .find(|stack| stack.cursor.owns(stack.base, block))
    }
}

impl<P: Allocator + Default, const STACK_SIZE: usize, const ALIGN: usize> Default
    for CollectionOfStacksAllocator<P, STACK_SIZE, ALIGN>
{
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P: Allocator, const STACK_SIZE: usize, const ALIGN: usize> Allocator
    for CollectionOfStacksAllocator<P, STACK_SIZE, ALIGN>
{
    const ALIGNMENT: usize = ALIGN;

    fn allocate(&mut self, size: usize) -> Option<MemoryBlock> {
        let len = round_up(size, ALIGN);
        if len == 0 || len > Self::CAPACITY {
            return None;
        }
        for stack in self.stacks.iter_mut().rev() {
            if let Some(block) = stack.cursor.allocate(stack.base, size, ALIGN) {
                return Some(block);
            }
        }
        let stack = self.push_stack()?;
        stack.cursor.allocate(stack.base, size, ALIGN)
    }

    fn deallocate(&mut self, block: MemoryBlock) {
        if let Some(stack) = self.find(&block) {
            stack.cursor.deallocate(stack.base, block, ALIGN);
        }
    }

    fn expand(&mut self, block: &mut MemoryBlock, delta: usize) -> bool {
        match self.find(block) {
            Some(stack) => stack.cursor.expand(stack.base, block, delta, ALIGN),
            None => false,
        }
    }
}

impl<P: Allocator, const STACK_SIZE: usize, const ALIGN: usize> Owns
    for CollectionOfStacksAllocator<P, STACK_SIZE, ALIGN>
{
    fn owns(&self, block: &MemoryBlock) -> bool {
        self.stacks
            .iter()
            .any(|stack| stack.cursor.owns(stack.base, block))
    }
}

impl<P: Allocator, const STACK_SIZE: usize, const ALIGN: usize> BulkAllocator
    for CollectionOfStacksAllocator<P, STACK_SIZE, ALIGN>
{
    fn deallocate_all(&mut self) {
        for stack in &mut self.stacks {
            stack.cursor.reset();
        }
    }

    fn allocate_all(&mut self) -> Option<MemoryBlock> {
        if let Some(stack) = self.stacks.last_mut() {
            if let Some(block) = stack.cursor.allocate_all(stack.base) {
                return Some(block);
            }
        }
        let stack = self.push_stack()?;
        stack.cursor.allocate_all(stack.base)
    }
}

impl<P: Allocator, const STACK_SIZE: usize, const ALIGN: usize> Drop
    for CollectionOfStacksAllocator<P, STACK_SIZE, ALIGN>
{
    fn drop(&mut self) {
        for stack in self.stacks.drain(..) {
            self.parent.deallocate(stack.raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::Mallocator;
    use ember_core::memory::is_aligned;

    #[test]
    fn grows_a_new_stack_when_full() {
        let mut alloc = CollectionOfStacksAllocator::<Mallocator, 128>::default();
        let a = alloc.allocate(100).expect("a");
        assert_eq!(alloc.stack_count(), 1);
        let b = alloc.allocate(100).expect("b");
        assert_eq!(alloc.stack_count(), 2);
        assert!(alloc.owns(&a) && alloc.owns(&b));
        let c = alloc.allocate(16).expect("c");
        assert_eq!(alloc.stack_count(), 2);
        assert_eq!(c.ptr() as usize, b.ptr() as usize + 112);
    }

    #[test]
    fn never_serves_more_than_a_stack() {
        let mut alloc = CollectionOfStacksAllocator::<Mallocator, 128>::default();
        assert!(alloc.allocate(129).is_none());
        assert_eq!(alloc.stack_count(), 0);
        assert!(alloc.allocate(128).is_some());
    }

    #[test]
    fn over_aligned_stacks() {
        let mut alloc = CollectionOfStacksAllocator::<Mallocator, 256, 64>::default();
        for _ in 0..8 {
            let block = alloc.allocate(40).expect("block");
            assert!(is_aligned(block.ptr(), 64));
            assert_eq!(block.len(), 64);
        }
        assert_eq!(alloc.stack_count(), 2);
    }

    #[test]
    fn deallocate_routes_to_the_owning_stack() {
        let mut alloc = CollectionOfStacksAllocator::<Mallocator, 64>::default();
        let a = alloc.allocate(64).expect("a");
        let b = alloc.allocate(64).expect("b");
        alloc.deallocate(a);
        let again = alloc.allocate(64).expect("again");
        assert_eq!(again.ptr(), a.ptr());
        assert_ne!(again.ptr(), b.ptr());
        alloc.deallocate_all();
        assert!(alloc.allocate(64).is_some());
    }
}
