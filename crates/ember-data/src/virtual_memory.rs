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

//! Reserve-then-commit virtual memory regions.
//!
//! A [`VirtualRegion`] reserves address space without backing it, then commits
//! physical pages on demand in OS page granularity. On Unix this maps
//! `PROT_NONE` memory and flips page protection. On Windows it pairs
//! `MEM_RESERVE` with per-range `MEM_COMMIT`. Other targets take the whole
//! reservation from the heap up front and commits are bookkeeping only.

use ember_core::memory::{round_up, stats};
use std::io;
use std::sync::OnceLock;

/// Returns the OS page size, cached after the first query.
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(os::page_size)
}

/// A contiguous range of reserved address space with a committed prefix.
#[derive(Debug)]
pub struct VirtualRegion {
    base: *mut u8,
    reserved: usize,
    committed: usize,
}

// The region exclusively owns its mapping.
unsafe impl Send for VirtualRegion {}

impl VirtualRegion {
    /// Reserves at least `size` bytes of address space, rounded up to whole pages.
    pub fn reserve(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot reserve an empty virtual region",
            ));
        }
        let reserved = round_up(size, page_size());
        let base = os::reserve(reserved)?;
        stats::record_reserve(reserved);
        log::debug!("Reserved {reserved} bytes of virtual memory at {base:p}");
        Ok(Self {
            base,
            reserved,
            committed: 0,
        })
    }

    /// Start of the region.
    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    /// Reserved bytes.
    #[inline]
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Bytes currently backed by physical pages, counted from the base.
    #[inline]
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Ensures the first `bytes` bytes are committed.
    ///
    /// Fails if `bytes` exceeds the reservation or the OS refuses the commit.
    pub fn commit(&mut self, bytes: usize) -> io::Result<()> {
        if bytes <= self.committed {
            return Ok(());
        }
        if bytes > self.reserved {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!(
                    "commit of {bytes} bytes exceeds the {}-byte reservation",
                    self.reserved
                ),
            ));
        }
        let target = round_up(bytes, page_size()).min(self.reserved);
        let grow = target - self.committed;
        // SAFETY: `[committed, target)` lies inside our reservation.
        unsafe { os::commit(self.base.add(self.committed), grow)? };
        stats::record_commit(grow);
        self.committed = target;
        Ok(())
    }

    /// Returns every committed page to the reservation.
    pub fn decommit_all(&mut self) {
        if self.committed == 0 {
            return;
        }
        // SAFETY: `[0, committed)` lies inside our reservation.
        if let Err(e) = unsafe { os::decommit(self.base, self.committed) } {
            log::warn!("Failed to decommit {} bytes: {e}", self.committed);
            return;
        }
        stats::record_decommit(self.committed);
        self.committed = 0;
    }
}

impl Drop for VirtualRegion {
    fn drop(&mut self) {
        if self.committed > 0 {
            stats::record_decommit(self.committed);
        }
        // SAFETY: base/reserved describe the mapping created in `reserve`.
        unsafe { os::release(self.base, self.reserved) };
        stats::record_release(self.reserved);
    }
}

#[cfg(unix)]
mod os {
    use std::io;
    use std::ptr;

    pub fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    }

    pub fn reserve(size: usize) -> io::Result<*mut u8> {
        // SAFETY: anonymous private mapping with no fixed address.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(ptr.cast())
    }

    pub unsafe fn commit(ptr: *mut u8, size: usize) -> io::Result<()> {
        if libc::mprotect(ptr.cast(), size, libc::PROT_READ | libc::PROT_WRITE) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub unsafe fn decommit(ptr: *mut u8, size: usize) -> io::Result<()> {
        if libc::madvise(ptr.cast(), size, libc::MADV_DONTNEED) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::mprotect(ptr.cast(), size, libc::PROT_NONE) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub unsafe fn release(ptr: *mut u8, size: usize) {
        if libc::munmap(ptr.cast(), size) != 0 {
            log::error!("munmap failed: {}", io::Error::last_os_error());
        }
    }
}

#[cfg(windows)]
mod os {
    use std::io;
    use windows::Win32::System::Memory::{
        VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE, MEM_RESERVE,
        PAGE_NOACCESS, PAGE_READWRITE,
    };
    use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

    pub fn page_size() -> usize {
        let mut info = SYSTEM_INFO::default();
        // SAFETY: `info` is a valid out-parameter.
        unsafe { GetSystemInfo(&mut info) };
        match info.dwPageSize as usize {
            0 => 4096,
            size => size,
        }
    }

    pub fn reserve(size: usize) -> io::Result<*mut u8> {
        // SAFETY: no fixed address; the OS picks the range.
        let ptr = unsafe { VirtualAlloc(None, size, MEM_RESERVE, PAGE_NOACCESS) };
        if ptr.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(ptr.cast())
    }

    pub unsafe fn commit(ptr: *mut u8, size: usize) -> io::Result<()> {
        if VirtualAlloc(Some(ptr.cast_const().cast()), size, MEM_COMMIT, PAGE_READWRITE).is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub unsafe fn decommit(ptr: *mut u8, size: usize) -> io::Result<()> {
        if VirtualFree(ptr.cast(), size, MEM_DECOMMIT).is_err() {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub unsafe fn release(ptr: *mut u8, _size: usize) {
        // MEM_RELEASE frees the whole reservation and requires a size of zero.
        if VirtualFree(ptr.cast(), 0, MEM_RELEASE).is_err() {
            log::error!("VirtualFree failed: {}", io::Error::last_os_error());
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod os {
    use std::alloc::{self, Layout};
    use std::io;

    pub fn page_size() -> usize {
        4096
    }

    fn layout(size: usize) -> io::Result<Layout> {
        Layout::from_size_align(size, page_size())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    pub fn reserve(size: usize) -> io::Result<*mut u8> {
        // SAFETY: non-zero size, page alignment.
        let ptr = unsafe { alloc::alloc_zeroed(layout(size)?) };
        if ptr.is_null() {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "reservation failed"));
        }
        Ok(ptr)
    }

    pub unsafe fn commit(_ptr: *mut u8, _size: usize) -> io::Result<()> {
        Ok(())
    }

    pub unsafe fn decommit(ptr: *mut u8, size: usize) -> io::Result<()> {
        std::ptr::write_bytes(ptr, 0, size);
        Ok(())
    }

    pub unsafe fn release(ptr: *mut u8, size: usize) {
        if let Ok(layout) = layout(size) {
            alloc::dealloc(ptr, layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_a_power_of_two() {
        assert!(page_size().is_power_of_two());
        assert!(page_size() >= 4096);
    }

    #[test]
    fn commit_rounds_to_pages_and_is_writable() {
        let page = page_size();
        let mut region = VirtualRegion::reserve(16 * page).expect("reserve");
        assert_eq!(region.reserved(), 16 * page);
        assert_eq!(region.committed(), 0);

        region.commit(10).expect("commit");
        assert_eq!(region.committed(), page);
        // SAFETY: the first page is committed read/write.
        unsafe {
            region.base().write(0xAB);
            region.base().add(page - 1).write(0xCD);
            assert_eq!(region.base().read(), 0xAB);
        }

        region.commit(page + 1).expect("commit");
        assert_eq!(region.committed(), 2 * page);
    }

    #[test]
    #[cfg(all(any(unix, windows), target_pointer_width = "64"))]
    fn large_reservations_commit_lazily() {
        // 8 GiB of address space; only the pages touched are backed.
        let page = page_size();
        let mut region = VirtualRegion::reserve(8 << 30).expect("reserve");
        assert_eq!(region.committed(), 0);

        region.commit(3 * page).expect("commit");
        assert_eq!(region.committed(), 3 * page);
        // SAFETY: the first three pages are committed read/write.
        unsafe {
            region.base().add(3 * page - 1).write(0x5A);
            assert_eq!(region.base().add(3 * page - 1).read(), 0x5A);
        }
    }

    #[test]
    fn commit_beyond_reservation_fails() {
        let page = page_size();
        let mut region = VirtualRegion::reserve(page).expect("reserve");
        assert!(region.commit(page + 1).is_err());
        assert_eq!(region.committed(), 0);
    }

    #[test]
    fn decommit_all_returns_pages() {
        let page = page_size();
        let mut region = VirtualRegion::reserve(4 * page).expect("reserve");
        region.commit(3 * page).expect("commit");
        region.decommit_all();
        assert_eq!(region.committed(), 0);
        region.commit(1).expect("recommit");
        // SAFETY: recommitted page is writable and zero-filled.
        unsafe { assert_eq!(region.base().read(), 0) };
    }
}
