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

use ember_core::memory::{is_aligned, Allocator, BulkAllocator, MemoryBlock, Owns};
use ember_data::allocators::{
    AffixAllocator, CollectionOfStacksAllocator, FallbackAllocator, Freelist,
    GrowingLinearAllocator, Mallocator, Segregator, StackAllocator,
};
use proptest::prelude::*;

type SmallObjects = Segregator<128, Freelist<Mallocator, 64>, Mallocator>;

#[test]
fn test_segregated_freelist_recycles_small_blocks() {
    // --- 1. ARRANGE ---
    let mut alloc = SmallObjects::default();

    // --- 2. ACT ---
    let first = alloc.allocate(64).expect("heap allocation should succeed");
    alloc.deallocate(first);
    let second = alloc.allocate(64).expect("heap allocation should succeed");

    // --- 3. ASSERT ---
    assert_eq!(
        first.ptr(),
        second.ptr(),
        "a 64-byte block must come back from the free list"
    );
    assert_eq!(alloc.small().cached(), 0);
    alloc.deallocate(second);
}

#[test]
fn test_large_requests_bypass_the_freelist() {
    let mut alloc = SmallObjects::default();

    let large = alloc.allocate(512).expect("heap allocation should succeed");
    alloc.deallocate(large);

    assert_eq!(alloc.small().cached(), 0, "only 64-byte blocks are cached");
}

#[test]
fn test_stack_with_heap_fallback_spills_when_full() {
    // --- 1. ARRANGE ---
    let mut alloc: FallbackAllocator<StackAllocator<256>, Mallocator> = Default::default();

    // --- 2. ACT ---
    let on_stack = alloc.allocate(200).expect("fits in the stack");
    let spilled = alloc.allocate(200).expect("falls back to the heap");

    // --- 3. ASSERT ---
    assert!(alloc.primary().owns(&on_stack));
    assert!(!alloc.primary().owns(&spilled));

    alloc.deallocate(spilled);
    alloc.deallocate(on_stack);
    assert_eq!(alloc.primary().used(), 0);
}

#[test]
fn test_affixes_survive_reallocation() {
    let mut alloc: AffixAllocator<Mallocator, 8, 8> = Default::default();
    let mut block = alloc.allocate(24).expect("heap allocation should succeed");
    unsafe {
        alloc.prefix(&block).cast::<u64>().write_unaligned(0xfeed_f00d);
        block.as_mut_slice().fill(0xab);
    }

    assert!(alloc.reallocate(&mut block, 200));

    unsafe {
        assert_eq!(alloc.prefix(&block).cast::<u64>().read_unaligned(), 0xfeed_f00d);
        assert!(block.as_slice()[..24].iter().all(|b| *b == 0xab));
    }
    alloc.deallocate(block);
}

#[test]
fn test_growing_linear_commits_pages_lazily() {
    let mut arena: GrowingLinearAllocator = GrowingLinearAllocator::with_capacity(1 << 24)
        .expect("reserving address space should succeed");
    assert_eq!(arena.committed(), 0);

    let block = arena.allocate(100).expect("arena has room");
    assert!(arena.committed() >= 100);
    assert!(arena.committed() < arena.capacity());
    assert!(arena.owns(&block));

    arena.deallocate_all();
    assert_eq!(arena.used(), 0);
    assert_eq!(arena.committed(), 0);
}

#[test]
fn test_collection_of_stacks_rejects_oversized_requests() {
    let mut alloc: CollectionOfStacksAllocator<Mallocator, 128> = Default::default();
    assert!(alloc.allocate(129).is_none());
    let block = alloc.allocate(128).expect("a fresh stack is pushed");
    assert_eq!(alloc.stack_count(), 1);
    alloc.deallocate(block);
}

fn check_block<A: Allocator>(block: Option<MemoryBlock>, size: usize) -> Result<(), TestCaseError> {
    if let Some(block) = block {
        prop_assert!(block.len() >= size);
        prop_assert!(is_aligned(block.ptr(), A::ALIGNMENT));
    }
    Ok(())
}

proptest! {
    #[test]
    fn every_allocation_is_aligned_and_long_enough(
        sizes in proptest::collection::vec(1usize..512, 1..32)
    ) {
        let mut heap = Mallocator;
        let mut stack: StackAllocator<4096> = StackAllocator::new();
        let mut small: SmallObjects = Default::default();
        let mut affix: AffixAllocator<Mallocator, 4, 12> = Default::default();
        let mut heap_blocks = Vec::new();
        let mut small_blocks = Vec::new();
        let mut affix_blocks = Vec::new();

        for &size in &sizes {
            let block = heap.allocate(size);
            check_block::<Mallocator>(block, size)?;
            heap_blocks.extend(block);

            check_block::<StackAllocator<4096>>(stack.allocate(size), size)?;

            let block = small.allocate(size);
            check_block::<SmallObjects>(block, size)?;
            small_blocks.extend(block);

            let block = affix.allocate(size);
            check_block::<AffixAllocator<Mallocator, 4, 12>>(block, size)?;
            affix_blocks.extend(block);
        }

        heap_blocks.into_iter().for_each(|b| heap.deallocate(b));
        small_blocks.into_iter().for_each(|b| small.deallocate(b));
        affix_blocks.into_iter().for_each(|b| affix.deallocate(b));
    }
}
