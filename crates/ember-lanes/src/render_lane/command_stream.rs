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

//! Double-buffered stream of deferred closures.
//!
//! Producers push closures into the write half while the consumer replays the
//! read half; [`swap`](CommandStream::swap) exchanges the two at a frame
//! boundary. Each record is a small header (replay and drop trampolines plus
//! its length) followed by the closure itself, both 16-byte aligned.

use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use ember_core::memory::{round_up, Allocator, MemoryBlock};
use ember_data::allocators::Mallocator;

const RECORD_ALIGN: usize = 16;

#[repr(C)]
struct RecordHeader<C> {
    call: unsafe fn(*mut u8, &mut C),
    drop: unsafe fn(*mut u8),
    len: usize,
}

const fn header_len<C>() -> usize {
    round_up(size_of::<RecordHeader<C>>(), RECORD_ALIGN)
}

unsafe fn call_record<C, F: FnOnce(&mut C)>(payload: *mut u8, context: &mut C) {
    let f = payload.cast::<F>().read();
    f(context);
}

unsafe fn drop_record<F>(payload: *mut u8) {
    ptr::drop_in_place(payload.cast::<F>());
}

struct Half {
    block: MemoryBlock,
    cursor: AtomicUsize,
    consumed: AtomicUsize,
}

/// A pair of byte buffers holding `FnOnce(&mut C)` records.
///
/// Overflowing a half is a programmer error and panics.
pub struct CommandStream<C> {
    halves: [Half; 2],
    write: AtomicUsize,
    capacity: usize,
    _context: PhantomData<fn(&mut C)>,
}

// Records are `Send` closures; producers write disjoint reserved ranges.
unsafe impl<C> Send for CommandStream<C> {}
unsafe impl<C> Sync for CommandStream<C> {}

impl<C> CommandStream<C> {
    /// Allocates two halves of `capacity` bytes each.
    pub fn new(capacity: usize) -> Self {
        let capacity = round_up(capacity.max(RECORD_ALIGN), RECORD_ALIGN);
        let mut heap = Mallocator;
        let mut half = || Half {
            block: heap
                .allocate(capacity)
                .unwrap_or_else(|| panic!("failed to allocate a {capacity}-byte command stream")),
            cursor: AtomicUsize::new(0),
            consumed: AtomicUsize::new(0),
        };
        Self {
            halves: [half(), half()],
            write: AtomicUsize::new(0),
            capacity,
            _context: PhantomData,
        }
    }

    /// Bytes available in each half.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes used in the write half.
    pub fn pending_bytes(&self) -> usize {
        self.write_half().cursor.load(Ordering::Acquire)
    }

    fn write_half(&self) -> &Half {
        &self.halves[self.write.load(Ordering::Acquire)]
    }

    /// Appends `f` to the write half.
    ///
    /// # Panics
    ///
    /// Panics if the record does not fit in the remaining space, or if `F`
    /// needs more than 16-byte alignment.
    pub fn push<F>(&self, f: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        assert!(
            align_of::<F>() <= RECORD_ALIGN,
            "command closures must not need more than {RECORD_ALIGN}-byte alignment"
        );
        let len = header_len::<C>() + round_up(size_of::<F>(), RECORD_ALIGN);
        let half = self.write_half();

        let mut offset = half.cursor.load(Ordering::Relaxed);
        loop {
            if offset + len > self.capacity {
                panic!(
                    "command stream overflow: a {len}-byte record does not fit ({offset} of {} bytes used); raise render.command_stream_bytes",
                    self.capacity
                );
            }
            match half.cursor.compare_exchange_weak(
                offset,
                offset + len,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => offset = current,
            }
        }

        // SAFETY: `[offset, offset + len)` is reserved for this call and 16-byte aligned.
        unsafe {
            let record = half.block.ptr().add(offset);
            record.cast::<RecordHeader<C>>().write(RecordHeader {
                call: call_record::<C, F>,
                drop: drop_record::<F>,
                len,
            });
            record.add(header_len::<C>()).cast::<F>().write(f);
        }
    }

    /// Exchanges halves: records pushed so far become replayable.
    ///
    /// Must only be called while no producer is pushing and the previous read
    /// half has been replayed.
    pub fn swap(&self) {
        let write = self.write.load(Ordering::Acquire);
        debug_assert_eq!(
            self.halves[1 - write].cursor.load(Ordering::Acquire),
            0,
            "swapping before the read half was replayed"
        );
        self.write.store(1 - write, Ordering::Release);
    }

    /// Replays and consumes every record of the read half, in push order.
    ///
    /// Returns the number of records executed.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the read half: no concurrent
    /// `execute` or `swap`.
    pub unsafe fn execute(&self, context: &mut C) -> usize {
        let half = &self.halves[1 - self.write.load(Ordering::Acquire)];
        let end = half.cursor.load(Ordering::Acquire);
        let mut offset = 0;
        let mut executed = 0;
        while offset < end {
            let record = half.block.ptr().add(offset);
            let header = record.cast::<RecordHeader<C>>().read();
            // Mark consumed first so a panicking command is not dropped twice.
            offset += header.len;
            half.consumed.store(offset, Ordering::Relaxed);
            (header.call)(record.add(header_len::<C>()), context);
            executed += 1;
        }
        half.consumed.store(0, Ordering::Relaxed);
        half.cursor.store(0, Ordering::Release);
        executed
    }
}

impl<C> Drop for CommandStream<C> {
    fn drop(&mut self) {
        let mut heap = Mallocator;
        for half in &self.halves {
            let end = half.cursor.load(Ordering::Acquire).min(self.capacity);
            let mut offset = half.consumed.load(Ordering::Acquire);
            while offset < end {
                // SAFETY: every record below the cursor was fully written and never replayed.
                unsafe {
                    let record = half.block.ptr().add(offset);
                    let header = record.cast::<RecordHeader<C>>().read();
                    (header.drop)(record.add(header_len::<C>()));
                    offset += header.len;
                }
            }
            heap.deallocate(half.block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn records_replay_in_push_order_after_swap() {
        let stream = CommandStream::<Vec<u32>>::new(1024);
        for i in 0..5 {
            stream.push(move |log: &mut Vec<u32>| log.push(i));
        }
        let mut log = Vec::new();

        assert_eq!(unsafe { stream.execute(&mut log) }, 0, "nothing swapped yet");
        stream.swap();
        assert_eq!(unsafe { stream.execute(&mut log) }, 5);
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert_eq!(stream.pending_bytes(), 0);
    }

    #[test]
    fn closures_keep_their_captures() {
        let stream = CommandStream::<String>::new(4096);
        let text = String::from("captured");
        let big = [3u64; 20];
        stream.push(move |out: &mut String| {
            out.push_str(&text);
            out.push_str(&big.iter().sum::<u64>().to_string());
        });
        stream.swap();
        let mut out = String::new();
        unsafe { stream.execute(&mut out) };
        assert_eq!(out, "captured60");
    }

    #[test]
    fn unreplayed_records_are_dropped_with_the_stream() {
        let marker = Arc::new(());
        {
            let stream = CommandStream::<()>::new(256);
            let held = Arc::clone(&marker);
            stream.push(move |_: &mut ()| drop(held));
            assert_eq!(Arc::strong_count(&marker), 2);
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    #[should_panic(expected = "command stream overflow")]
    fn overflow_panics() {
        let stream = CommandStream::<()>::new(64);
        for _ in 0..4 {
            stream.push(|_: &mut ()| {});
        }
    }
}
