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

//! Engine-wide counters for allocator and virtual-memory activity.
//!
//! The heap-forwarding allocator and the virtual-memory layer bump these
//! counters; anything else may read them through [`snapshot`] to report memory
//! usage (the SDK prints them in its periodic telemetry summary).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// --- Heap counters ---

static CURRENT_HEAP_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_HEAP_BYTES: AtomicUsize = AtomicUsize::new(0);
static TOTAL_ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static TOTAL_DEALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static TOTAL_REALLOCATIONS: AtomicU64 = AtomicU64::new(0);

// --- Virtual memory counters ---

static RESERVED_VIRTUAL_BYTES: AtomicUsize = AtomicUsize::new(0);
static COMMITTED_VIRTUAL_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_COMMITTED_BYTES: AtomicUsize = AtomicUsize::new(0);

/// A point-in-time copy of every memory counter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtendedMemoryStats {
    /// Bytes currently held from the system heap.
    pub current_heap_bytes: usize,
    /// Highest value `current_heap_bytes` has reached.
    pub peak_heap_bytes: usize,
    /// Number of heap allocations served.
    pub total_allocations: u64,
    /// Number of heap blocks returned.
    pub total_deallocations: u64,
    /// Number of heap blocks resized.
    pub total_reallocations: u64,
    /// `total_allocations - total_deallocations`.
    pub net_allocations: i64,
    /// Address space currently reserved by virtual-memory regions.
    pub reserved_virtual_bytes: usize,
    /// Physical pages currently committed inside those regions.
    pub committed_virtual_bytes: usize,
    /// Highest value `committed_virtual_bytes` has reached.
    pub peak_committed_bytes: usize,
}

impl ExtendedMemoryStats {
    /// Committed bytes as a fraction of reserved bytes (0 when nothing is reserved).
    pub fn commit_ratio(&self) -> f64 {
        if self.reserved_virtual_bytes == 0 {
            0.0
        } else {
            self.committed_virtual_bytes as f64 / self.reserved_virtual_bytes as f64
        }
    }
}

/// Records a heap allocation of `size` bytes.
pub fn record_allocation(size: usize) {
    let current = CURRENT_HEAP_BYTES.fetch_add(size, Ordering::Relaxed) + size;
    PEAK_HEAP_BYTES.fetch_max(current, Ordering::Relaxed);
    TOTAL_ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
}

/// Records that a heap block of `size` bytes was returned.
pub fn record_deallocation(size: usize) {
    let result = CURRENT_HEAP_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
        c.checked_sub(size)
    });
    if result.is_err() {
        log::error!("Heap counter underflowed during deallocation of {size} bytes");
    }
    TOTAL_DEALLOCATIONS.fetch_add(1, Ordering::Relaxed);
}

/// Records that a heap block was resized from `old_size` to `new_size` bytes.
pub fn record_reallocation(old_size: usize, new_size: usize) {
    TOTAL_REALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    if new_size >= old_size {
        let grown = new_size - old_size;
        let current = CURRENT_HEAP_BYTES.fetch_add(grown, Ordering::Relaxed) + grown;
        PEAK_HEAP_BYTES.fetch_max(current, Ordering::Relaxed);
    } else {
        let shrunk = old_size - new_size;
        let _ = CURRENT_HEAP_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
            c.checked_sub(shrunk)
        });
    }
}

/// Records a virtual address-space reservation.
pub fn record_reserve(size: usize) {
    RESERVED_VIRTUAL_BYTES.fetch_add(size, Ordering::Relaxed);
}

/// Records the release of a virtual address-space reservation.
pub fn record_release(size: usize) {
    let _ = RESERVED_VIRTUAL_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
        c.checked_sub(size)
    });
}

/// Records `size` bytes of pages being committed.
pub fn record_commit(size: usize) {
    let current = COMMITTED_VIRTUAL_BYTES.fetch_add(size, Ordering::Relaxed) + size;
    PEAK_COMMITTED_BYTES.fetch_max(current, Ordering::Relaxed);
}

/// Records `size` bytes of pages being decommitted.
pub fn record_decommit(size: usize) {
    let result = COMMITTED_VIRTUAL_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
        c.checked_sub(size)
    });
    if result.is_err() {
        log::error!("Committed-bytes counter underflowed while decommitting {size} bytes");
    }
}

/// Takes a snapshot of all counters.
pub fn snapshot() -> ExtendedMemoryStats {
    let total_allocations = TOTAL_ALLOCATIONS.load(Ordering::Relaxed);
    let total_deallocations = TOTAL_DEALLOCATIONS.load(Ordering::Relaxed);
    ExtendedMemoryStats {
        current_heap_bytes: CURRENT_HEAP_BYTES.load(Ordering::Relaxed),
        peak_heap_bytes: PEAK_HEAP_BYTES.load(Ordering::Relaxed),
        total_allocations,
        total_deallocations,
        total_reallocations: TOTAL_REALLOCATIONS.load(Ordering::Relaxed),
        net_allocations: total_allocations as i64 - total_deallocations as i64,
        reserved_virtual_bytes: RESERVED_VIRTUAL_BYTES.load(Ordering::Relaxed),
        committed_virtual_bytes: COMMITTED_VIRTUAL_BYTES.load(Ordering::Relaxed),
        peak_committed_bytes: PEAK_COMMITTED_BYTES.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The counters are process-wide and other tests allocate concurrently, so
    // these only check monotonic effects.
    #[test]
    fn allocation_counters_advance() {
        let before = snapshot();
        record_allocation(128);
        record_deallocation(128);
        let after = snapshot();
        assert!(after.total_allocations > before.total_allocations);
        assert!(after.total_deallocations > before.total_deallocations);
        assert!(after.peak_heap_bytes >= 128);
    }

    #[test]
    fn commit_ratio_handles_empty_reservation() {
        let stats = ExtendedMemoryStats::default();
        assert_eq!(stats.commit_ratio(), 0.0);
        let stats = ExtendedMemoryStats {
            reserved_virtual_bytes: 4096,
            committed_virtual_bytes: 1024,
            ..Default::default()
        };
        assert!((stats.commit_ratio() - 0.25).abs() < f64::EPSILON);
    }
}
