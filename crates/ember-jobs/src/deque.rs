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

//! Bounded Chase–Lev work-stealing deque.
//!
//! The owner pushes and pops at `bottom`; any other thread steals at `top`.
//! Indices grow monotonically and address a power-of-two ring through a mask.

use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicIsize, AtomicPtr, Ordering};

use crate::job::{Job, JobHandle};

#[repr(align(64))]
struct CachePadded<T>(T);

pub(crate) struct JobDeque {
    top: CachePadded<AtomicIsize>,
    bottom: CachePadded<AtomicIsize>,
    buffer: Box<[AtomicPtr<Job>]>,
    mask: isize,
}

impl JobDeque {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "job deque capacity must be a power of two, got {capacity}"
        );
        Self {
            top: CachePadded(AtomicIsize::new(0)),
            bottom: CachePadded(AtomicIsize::new(0)),
            buffer: (0..capacity)
                .map(|_| AtomicPtr::new(std::ptr::null_mut()))
                .collect(),
            mask: capacity as isize - 1,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn slot(&self, index: isize) -> &AtomicPtr<Job> {
        &self.buffer[(index & self.mask) as usize]
    }

    /// Owner only. Hands the job back when the ring is full.
    pub(crate) fn push(&self, job: JobHandle) -> Result<(), JobHandle> {
        let bottom = self.bottom.0.load(Ordering::Relaxed);
        let top = self.top.0.load(Ordering::Acquire);
        if bottom - top >= self.buffer.len() as isize {
            return Err(job);
        }
        self.slot(bottom).store(job.as_ptr(), Ordering::Relaxed);
        self.bottom.0.store(bottom + 1, Ordering::Release);
        Ok(())
    }

    /// Owner only. Takes the most recently pushed job.
    pub(crate) fn pop(&self) -> Option<JobHandle> {
        let bottom = self.bottom.0.load(Ordering::Relaxed) - 1;
        self.bottom.0.store(bottom, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let top = self.top.0.load(Ordering::Relaxed);

        if top > bottom {
            self.bottom.0.store(bottom + 1, Ordering::Relaxed);
            return None;
        }

        let job = self.slot(bottom).load(Ordering::Relaxed);
        if top == bottom {
            // Last element: race any thief for it.
            let won = self
                .top
                .0
                .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok();
            self.bottom.0.store(bottom + 1, Ordering::Relaxed);
            if !won {
                return None;
            }
        }
        NonNull::new(job).map(JobHandle::from_ptr)
    }

    /// Any thread but the owner. Takes the oldest job.
    pub(crate) fn steal(&self) -> Option<JobHandle> {
        let top = self.top.0.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let bottom = self.bottom.0.load(Ordering::Acquire);
        if top >= bottom {
            return None;
        }
        let job = self.slot(top).load(Ordering::Relaxed);
        self.top
            .0
            .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
            .ok()?;
        NonNull::new(job).map(JobHandle::from_ptr)
    }

    pub(crate) fn len(&self) -> usize {
        let bottom = self.bottom.0.load(Ordering::Relaxed);
        let top = self.top.0.load(Ordering::Relaxed);
        (bottom - top).max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[repr(align(64))]
    struct FakeJob([u8; 64]);

    fn fake_jobs(count: usize) -> Vec<FakeJob> {
        (0..count).map(|_| FakeJob([0; 64])).collect()
    }

    fn handle(job: &mut FakeJob) -> JobHandle {
        JobHandle::from_ptr(NonNull::from(job).cast())
    }

    #[test]
    fn owner_pops_lifo() {
        let mut jobs = fake_jobs(3);
        let deque = JobDeque::with_capacity(4);
        let handles: Vec<_> = jobs.iter_mut().map(handle).collect();
        for h in &handles {
            deque.push(*h).unwrap();
        }
        assert_eq!(deque.pop(), Some(handles[2]));
        assert_eq!(deque.steal(), Some(handles[0]));
        assert_eq!(deque.pop(), Some(handles[1]));
        assert_eq!(deque.pop(), None);
        assert_eq!(deque.steal(), None);
    }

    #[test]
    fn full_deque_rejects_without_clobbering() {
        let mut jobs = fake_jobs(3);
        let deque = JobDeque::with_capacity(2);
        let handles: Vec<_> = jobs.iter_mut().map(handle).collect();
        deque.push(handles[0]).unwrap();
        deque.push(handles[1]).unwrap();

        assert_eq!(deque.push(handles[2]), Err(handles[2]));
        assert_eq!(deque.steal(), Some(handles[0]));
        assert_eq!(deque.steal(), Some(handles[1]));
    }

    #[test]
    fn concurrent_pop_and_steal_dequeue_each_job_once() {
        const JOBS: usize = 20_000;
        let mut jobs = fake_jobs(JOBS);
        let addrs: Vec<usize> = jobs.iter_mut().map(|j| handle(j).as_ptr() as usize).collect();
        let deque = Arc::new(JobDeque::with_capacity(JOBS.next_power_of_two()));
        let seen = Arc::new(Mutex::new(Vec::with_capacity(JOBS)));
        let done = Arc::new(AtomicBool::new(false));

        let thieves: Vec<_> = (0..3)
            .map(|_| {
                let deque = Arc::clone(&deque);
                let seen = Arc::clone(&seen);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut local = Vec::new();
                    while !done.load(Ordering::Acquire) || deque.len() > 0 {
                        if let Some(job) = deque.steal() {
                            local.push(job.as_ptr() as usize);
                        }
                    }
                    seen.lock().unwrap().extend(local);
                })
            })
            .collect();

        let mut local = Vec::new();
        for (i, addr) in addrs.iter().enumerate() {
            let job = JobHandle::from_ptr(NonNull::new(*addr as *mut Job).unwrap());
            deque.push(job).unwrap();
            if i % 3 == 0 {
                if let Some(job) = deque.pop() {
                    local.push(job.as_ptr() as usize);
                }
            }
        }
        while let Some(job) = deque.pop() {
            local.push(job.as_ptr() as usize);
        }
        done.store(true, Ordering::Release);
        for thief in thieves {
            thief.join().unwrap();
        }

        let mut seen = seen.lock().unwrap();
        seen.extend(local);
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(seen.len(), JOBS);
        assert_eq!(unique.len(), JOBS);
    }
}
