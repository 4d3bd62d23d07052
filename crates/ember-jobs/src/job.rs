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

//! The 64-byte job record and its closure trampolines.

use std::fmt;
use std::mem::{align_of, size_of, MaybeUninit};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::scheduler::JobScheduler;

/// Bytes of closure state a job stores inline. Larger closures, or closures
/// aligned above 8, are moved into the job arena instead.
pub const INLINE_PAYLOAD_BYTES: usize = 40;

pub(crate) type JobFn = unsafe fn(payload: *mut u8, scheduler: &JobScheduler, job: JobHandle);

#[repr(C, align(64))]
pub(crate) struct Job {
    function: JobFn,
    parent: *const Job,
    unfinished: AtomicU32,
    _padding: u32,
    payload: [MaybeUninit<u64>; INLINE_PAYLOAD_BYTES / 8],
}

const _: () = assert!(size_of::<Job>() == 64 && align_of::<Job>() == 64);

impl Job {
    /// Returns `true` if `F` can live in the inline payload.
    pub(crate) const fn fits_inline<F>() -> bool {
        size_of::<F>() <= INLINE_PAYLOAD_BYTES && align_of::<F>() <= align_of::<u64>()
    }

    /// Writes a fresh job with `unfinished = 1` whose closure lives inline.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for a `Job` write and `F` must satisfy [`fits_inline`](Self::fits_inline).
    pub(crate) unsafe fn write_inline<F>(slot: *mut Job, parent: *const Job, f: F)
    where
        F: FnOnce(&JobScheduler, JobHandle) + Send + 'static,
    {
        debug_assert!(Self::fits_inline::<F>());
        Self::write_header(slot, parent, call_inline::<F>);
        ptr::addr_of_mut!((*slot).payload).cast::<F>().write(f);
    }

    /// Writes a fresh job whose closure was moved to `storage`.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for a `Job` write and `storage` for an `F` write;
    /// both must stay live until the job has run.
    pub(crate) unsafe fn write_indirect<F>(slot: *mut Job, parent: *const Job, storage: *mut F, f: F)
    where
        F: FnOnce(&JobScheduler, JobHandle) + Send + 'static,
    {
        Self::write_header(slot, parent, call_indirect::<F>);
        storage.write(f);
        ptr::addr_of_mut!((*slot).payload).cast::<*mut F>().write(storage);
    }

    unsafe fn write_header(slot: *mut Job, parent: *const Job, function: JobFn) {
        ptr::addr_of_mut!((*slot).function).write(function);
        ptr::addr_of_mut!((*slot).parent).write(parent);
        ptr::addr_of_mut!((*slot).unfinished).write(AtomicU32::new(1));
        ptr::addr_of_mut!((*slot)._padding).write(0);
    }
}

unsafe fn call_inline<F>(payload: *mut u8, scheduler: &JobScheduler, job: JobHandle)
where
    F: FnOnce(&JobScheduler, JobHandle),
{
    let f = payload.cast::<F>().read();
    f(scheduler, job);
}

unsafe fn call_indirect<F>(payload: *mut u8, scheduler: &JobScheduler, job: JobHandle)
where
    F: FnOnce(&JobScheduler, JobHandle),
{
    let f = payload.cast::<*mut F>().read().read();
    f(scheduler, job);
}

/// A reference to a job living in a scheduler arena.
///
/// Handles are plain pointers: they stay valid until the next
/// [`clear_jobs`](crate::JobSystem::clear_jobs), after which using one is a
/// contract violation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(NonNull<Job>);

// The pointee is only mutated through atomics once published.
unsafe impl Send for JobHandle {}
unsafe impl Sync for JobHandle {}

impl JobHandle {
    pub(crate) fn from_ptr(job: NonNull<Job>) -> Self {
        Self(job)
    }

    pub(crate) fn as_ptr(self) -> *mut Job {
        self.0.as_ptr()
    }

    fn job(&self) -> &Job {
        // SAFETY: handles point into an arena that outlives them by contract.
        unsafe { self.0.as_ref() }
    }

    /// Returns `true` once the job and all of its descendants have run.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.unfinished() == 0
    }

    /// Pending work in this subtree: the job itself plus unfinished children.
    #[inline]
    pub fn unfinished(&self) -> u32 {
        self.job().unfinished.load(Ordering::Acquire)
    }

    /// Counts a new child against this job.
    pub(crate) fn add_child(self) {
        let previous = self.job().unfinished.fetch_add(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "child added to a finished job");
    }

    /// Runs the closure then finishes the job.
    ///
    /// # Safety
    ///
    /// Must be called at most once per job, by the thread that dequeued it.
    pub(crate) unsafe fn execute(self, scheduler: &JobScheduler) {
        let job = self.as_ptr();
        let function = (*job).function;
        let payload = ptr::addr_of_mut!((*job).payload).cast::<u8>();
        function(payload, scheduler, self);
        self.finish();
    }

    /// Drops one reference; a job reaching zero finishes its parent in turn.
    fn finish(self) {
        let mut current: *const Job = self.as_ptr();
        while !current.is_null() {
            // SAFETY: ancestors outlive their descendants (same arena generation).
            let job = unsafe { &*current };
            // Read before the decrement: a zero count lets the arena be rewound.
            let parent = job.parent;
            let previous = job.unfinished.fetch_sub(1, Ordering::AcqRel);
            debug_assert!(previous > 0, "job finished more than once");
            if previous != 1 {
                return;
            }
            current = parent;
        }
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("addr", &self.0)
            .field("unfinished", &self.unfinished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_one_cache_line() {
        assert_eq!(size_of::<Job>(), 64);
        assert_eq!(align_of::<Job>(), 64);
    }

    #[test]
    fn inline_fit_depends_on_size_and_alignment() {
        assert!(Job::fits_inline::<[u64; 5]>());
        assert!(!Job::fits_inline::<[u64; 6]>());
    }

    #[test]
    fn finish_cascades_to_the_parent_once() {
        let mut parent = MaybeUninit::<Job>::uninit();
        let mut child = MaybeUninit::<Job>::uninit();
        unsafe {
            Job::write_inline(parent.as_mut_ptr(), ptr::null(), |_: &JobScheduler, _| {});
            Job::write_inline(child.as_mut_ptr(), parent.as_ptr(), |_: &JobScheduler, _| {});
        }
        let parent = JobHandle::from_ptr(NonNull::new(parent.as_mut_ptr()).unwrap());
        let child = JobHandle::from_ptr(NonNull::new(child.as_mut_ptr()).unwrap());
        parent.add_child();
        assert_eq!(parent.unfinished(), 2);

        parent.finish();
        assert_eq!(parent.unfinished(), 1);
        child.finish();
        assert!(child.is_finished());
        assert!(parent.is_finished());
    }
}
