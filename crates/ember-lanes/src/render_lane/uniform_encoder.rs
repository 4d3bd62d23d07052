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

//! Uniform update records.
//!
//! A record is `handle: u16 (LE) | type: u8 | count: u8 | payload`, where the
//! payload is `type.size() * count` bytes. Recorders encode into a private
//! [`UniformEncoder`] and copy each draw's records into the shared
//! [`UniformArena`] in one reservation at submit.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use ember_core::memory::{Allocator, MemoryBlock};
use ember_core::renderer::{UniformHandle, UniformType, UniformValue};
use ember_data::allocators::Mallocator;

const HEADER_LEN: usize = 4;

/// Thread-private scratch the current draw's uniform updates accumulate in.
#[derive(Debug, Default)]
pub struct UniformEncoder {
    bytes: Vec<u8>,
}

impl UniformEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an update of `values` to `uniform`.
    ///
    /// # Panics
    ///
    /// Panics if `values` is empty, longer than 255 elements, or if the handle
    /// index does not fit 16 bits.
    pub fn push<T: UniformValue>(&mut self, uniform: UniformHandle, values: &[T]) {
        let count = u8::try_from(values.len())
            .ok()
            .filter(|count| *count > 0)
            .unwrap_or_else(|| {
                panic!("uniform updates carry 1..=255 elements, got {}", values.len())
            });
        self.push_raw(uniform, T::TYPE, count, bytemuck::cast_slice(values));
    }

    pub(crate) fn push_raw(&mut self, uniform: UniformHandle, ty: UniformType, count: u8, payload: &[u8]) {
        let index = u16::try_from(uniform.index())
            .unwrap_or_else(|_| panic!("uniform handle {uniform:?} does not fit a 16-bit record"));
        debug_assert_eq!(payload.len(), ty.size() * count as usize);
        self.bytes.extend_from_slice(&index.to_le_bytes());
        self.bytes.push(ty as u8);
        self.bytes.push(count);
        self.bytes.extend_from_slice(payload);
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns `true` if nothing was pushed since the last clear.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Drops every pending record.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

/// One decoded uniform update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformRecord<'a> {
    /// Target uniform.
    pub uniform: UniformHandle,
    /// Value type.
    pub ty: UniformType,
    /// Element count.
    pub count: u8,
    /// Raw element bytes, unaligned.
    pub payload: &'a [u8],
}

/// Walks the records in `bytes`.
///
/// Decoding stops at the first record with an unknown type byte or a truncated
/// payload, since its length cannot be trusted.
pub fn decode_uniforms(bytes: &[u8]) -> impl Iterator<Item = UniformRecord<'_>> + '_ {
    let mut rest = bytes;
    std::iter::from_fn(move || {
        if rest.len() < HEADER_LEN {
            return None;
        }
        let index = u16::from_le_bytes([rest[0], rest[1]]);
        let Some(ty) = UniformType::from_u8(rest[2]) else {
            log::warn!("Unknown uniform type byte {}; dropping the rest of the draw's uniforms", rest[2]);
            rest = &[];
            return None;
        };
        let count = rest[3];
        let len = ty.size() * count as usize;
        if rest.len() < HEADER_LEN + len {
            log::warn!("Truncated uniform record for uniform #{index}");
            rest = &[];
            return None;
        }
        let payload = &rest[HEADER_LEN..HEADER_LEN + len];
        rest = &rest[HEADER_LEN + len..];
        Some(UniformRecord {
            uniform: UniformHandle::from_index(index as u32),
            ty,
            count,
            payload,
        })
    })
}

/// Frame-wide append-only byte arena for uniform records.
///
/// Producers reserve disjoint ranges with one atomic step; the render thread
/// reads them back and [`reset`](Self::reset)s after the frame.
pub struct UniformArena {
    block: MemoryBlock,
    cursor: AtomicUsize,
    capacity: usize,
}

// Producers only write the ranges they reserved; reads happen in the render phase.
unsafe impl Send for UniformArena {}
unsafe impl Sync for UniformArena {}

impl UniformArena {
    /// Allocates `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        let block = if capacity == 0 {
            MemoryBlock::null()
        } else {
            Mallocator
                .allocate(capacity)
                .unwrap_or_else(|| panic!("failed to allocate a {capacity}-byte uniform arena"))
        };
        Self {
            block,
            cursor: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Bytes written this frame.
    pub fn write_pos(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Size of the arena.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies `bytes` into a freshly reserved range and returns it.
    ///
    /// # Panics
    ///
    /// Panics when the arena is full.
    pub fn append(&self, bytes: &[u8]) -> Range<u32> {
        if bytes.is_empty() {
            let at = self.write_pos() as u32;
            return at..at;
        }
        let mut start = self.cursor.load(Ordering::Relaxed);
        loop {
            let end = start + bytes.len();
            if end > self.capacity {
                panic!(
                    "uniform arena exhausted: {} more bytes needed, {start} of {} used; raise render.uniform_arena_bytes",
                    bytes.len(),
                    self.capacity
                );
            }
            match self
                .cursor
                .compare_exchange_weak(start, end, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => start = current,
            }
        }
        // SAFETY: `[start, start + len)` is reserved for this call only.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.block.ptr().add(start), bytes.len());
        }
        start as u32..(start + bytes.len()) as u32
    }

    /// Reads back a reserved range.
    ///
    /// # Safety
    ///
    /// The range must have been returned by [`append`](Self::append) since the
    /// last reset, with its producer finished.
    pub unsafe fn range(&self, range: Range<u32>) -> &[u8] {
        if range.is_empty() {
            return &[];
        }
        std::slice::from_raw_parts(
            self.block.ptr().add(range.start as usize),
            (range.end - range.start) as usize,
        )
    }

    /// Rewinds to empty.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Release);
    }
}

impl Drop for UniformArena {
    fn drop(&mut self) {
        Mallocator.deallocate(self.block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_decode_in_order() {
        let mut encoder = UniformEncoder::new();
        encoder.push(UniformHandle::from_index(3), &[[1.0f32, 2.0, 3.0, 4.0]]);
        encoder.push(UniformHandle::from_index(7), &[5i32, 6]);

        let records: Vec<_> = decode_uniforms(encoder.as_bytes()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].uniform.index(), 3);
        assert_eq!(records[0].ty, UniformType::Vec4);
        assert_eq!(records[0].payload.len(), 16);
        assert_eq!(records[1].ty, UniformType::Int);
        assert_eq!(records[1].count, 2);
        assert_eq!(records[1].payload, bytemuck::cast_slice::<i32, u8>(&[5, 6]));
    }

    #[test]
    fn unknown_type_stops_decoding() {
        let bytes = [0u8, 0, 0xEE, 1, 0, 0, 0, 0];
        assert_eq!(decode_uniforms(&bytes).count(), 0);
    }

    #[test]
    fn arena_ranges_are_disjoint_and_reset() {
        let arena = UniformArena::new(64);
        let a = arena.append(&[1, 2, 3]);
        let b = arena.append(&[4, 5]);
        assert_eq!(a, 0..3);
        assert_eq!(b, 3..5);
        assert_eq!(unsafe { arena.range(b) }, &[4, 5]);

        arena.reset();
        assert_eq!(arena.write_pos(), 0);
    }

    #[test]
    #[should_panic(expected = "uniform arena exhausted")]
    fn arena_overflow_panics() {
        let arena = UniformArena::new(4);
        arena.append(&[0; 5]);
    }
}
