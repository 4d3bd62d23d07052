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

//! Byte blocks handed to the renderer for uploads.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use ember_core::memory::{Allocator, MemoryBlock};
use ember_data::allocators::Mallocator;

type ReleaseFn = Box<dyn FnOnce(&[u8]) + Send>;

enum Owner {
    Heap,
    External(Option<ReleaseFn>),
}

/// Bytes the renderer reads on its own thread, released once the frame using
/// them has rendered.
///
/// A ref either owns a heap block ([`alloc`](Self::alloc),
/// [`alloc_and_copy`](Self::alloc_and_copy)) or borrows caller memory and
/// runs a release callback when dropped ([`make_ref`](Self::make_ref),
/// [`make_ref_with_release`](Self::make_ref_with_release)). A panicking release
/// callback is caught and logged.
pub struct MemoryRef {
    block: MemoryBlock,
    len: usize,
    owner: Owner,
}

// The block is either owned or borrowed under the `make_ref_with_release` contract.
unsafe impl Send for MemoryRef {}

impl MemoryRef {
    /// Allocates `len` zeroed bytes on the heap.
    ///
    /// # Panics
    ///
    /// Panics if the heap refuses the allocation.
    pub fn alloc(len: usize) -> Self {
        if len == 0 {
            return Self::empty();
        }
        let block = Mallocator
            .allocate(len)
            .unwrap_or_else(|| panic!("failed to allocate a {len}-byte memory ref"));
        // SAFETY: fresh block of at least `len` bytes.
        unsafe { std::ptr::write_bytes(block.ptr(), 0, len) };
        Self {
            block,
            len,
            owner: Owner::Heap,
        }
    }

    /// Copies `data` into a fresh heap block.
    pub fn alloc_and_copy(data: &[u8]) -> Self {
        let mut memory = Self::alloc(data.len());
        memory.as_mut_slice().copy_from_slice(data);
        memory
    }

    /// Copies a slice of plain values.
    pub fn from_pod<T: bytemuck::Pod>(values: &[T]) -> Self {
        Self::alloc_and_copy(bytemuck::cast_slice(values))
    }

    /// Wraps static data without copying.
    pub fn make_ref(data: &'static [u8]) -> Self {
        Self {
            block: MemoryBlock::new(data.as_ptr().cast_mut(), data.len()),
            len: data.len(),
            owner: Owner::External(None),
        }
    }

    /// Wraps caller memory without copying; `release` runs with the bytes once
    /// the renderer is done with them.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` bytes, and the bytes must not be
    /// mutated, until `release` is called.
    pub unsafe fn make_ref_with_release<F>(ptr: *const u8, len: usize, release: F) -> Self
    where
        F: FnOnce(&[u8]) + Send + 'static,
    {
        Self {
            block: MemoryBlock::new(ptr.cast_mut(), len),
            len,
            owner: Owner::External(Some(Box::new(release))),
        }
    }

    fn empty() -> Self {
        Self {
            block: MemoryBlock::null(),
            len: 0,
            owner: Owner::Heap,
        }
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length ref.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The referenced bytes.
    pub fn as_slice(&self) -> &[u8] {
        if self.block.is_null() {
            return &[];
        }
        // SAFETY: the block is live for `len` bytes while `self` exists.
        unsafe { std::slice::from_raw_parts(self.block.ptr(), self.len) }
    }

    /// Writable view of a heap-owned ref; external refs are read-only and yield an empty slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.owner {
            Owner::Heap if !self.block.is_null() => {
                // SAFETY: heap blocks are exclusively owned by `self`.
                unsafe { std::slice::from_raw_parts_mut(self.block.ptr(), self.len) }
            }
            _ => &mut [],
        }
    }
}

impl Drop for MemoryRef {
    fn drop(&mut self) {
        match &mut self.owner {
            Owner::Heap => Mallocator.deallocate(self.block),
            Owner::External(release) => {
                let Some(release) = release.take() else {
                    return;
                };
                let bytes = self.as_slice();
                if panic::catch_unwind(AssertUnwindSafe(|| release(bytes))).is_err() {
                    log::warn!("A memory-ref release callback panicked; the panic was swallowed");
                }
            }
        }
    }
}

impl fmt::Debug for MemoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = match self.owner {
            Owner::Heap => "heap",
            Owner::External(_) => "external",
        };
        f.debug_struct("MemoryRef")
            .field("len", &self.len)
            .field("owner", &owner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn alloc_and_copy_owns_a_copy() {
        let mut source = vec![1u8, 2, 3];
        let memory = MemoryRef::alloc_and_copy(&source);
        source[0] = 9;
        assert_eq!(memory.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn release_runs_once_on_drop() {
        static DATA: [u8; 4] = [4, 3, 2, 1];
        let released = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&released);
        let memory = unsafe {
            MemoryRef::make_ref_with_release(DATA.as_ptr(), DATA.len(), move |bytes| {
                seen.fetch_add(bytes.len(), Ordering::SeqCst);
            })
        };
        assert_eq!(memory.as_slice(), &DATA);
        drop(memory);
        assert_eq!(released.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn panicking_release_is_swallowed() {
        let memory = unsafe {
            MemoryRef::make_ref_with_release(b"x".as_ptr(), 1, |_| panic!("release failed"))
        };
        drop(memory);
    }

    #[test]
    fn empty_ref_is_harmless() {
        let memory = MemoryRef::alloc(0);
        assert!(memory.is_empty());
        assert!(memory.as_slice().is_empty());
    }
}
