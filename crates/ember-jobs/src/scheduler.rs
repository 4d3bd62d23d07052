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

//! The work-stealing scheduler and its thread pool.

use std::cell::{RefCell, UnsafeCell};
use std::io;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ember_core::config::JobConfig;
use ember_core::memory::Allocator;
use ember_data::allocators::GrowingLinearAllocator;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::backoff::Backoff;
use crate::deque::JobDeque;
use crate::job::{Job, JobHandle};

type JobArena = GrowingLinearAllocator<64>;

static NEXT_SYSTEM_ID: AtomicUsize = AtomicUsize::new(1);

/// Associates the current thread with one slot of one job system.
struct ThreadBinding {
    system: usize,
    slot: usize,
    rng: SmallRng,
}

thread_local! {
    static BINDINGS: RefCell<Vec<ThreadBinding>> = const { RefCell::new(Vec::new()) };
}

fn bind_current_thread(system: usize, slot: usize) {
    let seed = 0x9E37_79B9_7F4A_7C15_u64 ^ ((system as u64) << 32 | slot as u64);
    BINDINGS.with(|bindings| {
        bindings.borrow_mut().push(ThreadBinding {
            system,
            slot,
            rng: SmallRng::seed_from_u64(seed),
        })
    });
}

fn unbind_current_thread(system: usize) {
    BINDINGS.with(|bindings| bindings.borrow_mut().retain(|b| b.system != system));
}

/// One deque plus the arena its owner allocates jobs from.
struct WorkerSlot {
    deque: JobDeque,
    arena: UnsafeCell<JobArena>,
    clear_requested: AtomicBool,
}

// The arena is only touched by the thread bound to this slot.
unsafe impl Sync for WorkerSlot {}
unsafe impl Send for WorkerSlot {}

struct Shared {
    id: usize,
    slots: Box<[WorkerSlot]>,
    running: AtomicBool,
    clear_pending: AtomicUsize,
    created: AtomicU64,
    executed: AtomicU64,
    stolen: AtomicU64,
    inline_overflows: AtomicU64,
}

/// Counters accumulated since the job system started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Worker threads, excluding the bootstrap thread.
    pub workers: usize,
    /// Jobs created.
    pub created: u64,
    /// Jobs executed.
    pub executed: u64,
    /// Jobs taken from another thread's deque.
    pub stolen: u64,
    /// Jobs run inline because the caller's deque was full.
    pub inline_overflows: u64,
}

/// A cheap, cloneable reference to a running job system.
///
/// Every method must be called from a thread bound to the system: the
/// bootstrap thread that created the [`JobSystem`], or one of its workers
/// (which is where job closures run). Other threads panic.
#[derive(Clone)]
pub struct JobScheduler {
    shared: Arc<Shared>,
}

impl JobScheduler {
    fn current_slot(&self) -> usize {
        let id = self.shared.id;
        BINDINGS
            .with(|bindings| {
                bindings
                    .borrow()
                    .iter()
                    .find(|b| b.system == id)
                    .map(|b| b.slot)
            })
            .unwrap_or_else(|| {
                panic!(
                    "thread {:?} is not bound to job system #{id}; only its bootstrap thread and workers may create or run jobs",
                    thread::current().name().unwrap_or("<unnamed>")
                )
            })
    }

    /// Creates a root job. It does not run until passed to [`run`](Self::run).
    ///
    /// Closures up to [`INLINE_PAYLOAD_BYTES`](crate::INLINE_PAYLOAD_BYTES) are
    /// stored in the job record; larger ones are moved into the job arena. A
    /// closure whose job never runs before [`JobSystem::clear_jobs`] is leaked.
    pub fn create_job<F>(&self, f: F) -> JobHandle
    where
        F: FnOnce(&JobScheduler, JobHandle) + Send + 'static,
    {
        self.allocate(std::ptr::null(), f)
    }

    /// Creates a job counted against `parent`: the parent only finishes after
    /// this child has.
    pub fn create_child_job<F>(&self, parent: JobHandle, f: F) -> JobHandle
    where
        F: FnOnce(&JobScheduler, JobHandle) + Send + 'static,
    {
        parent.add_child();
        self.allocate(parent.as_ptr(), f)
    }

    fn allocate<F>(&self, parent: *const Job, f: F) -> JobHandle
    where
        F: FnOnce(&JobScheduler, JobHandle) + Send + 'static,
    {
        let slot = self.current_slot();
        // SAFETY: only the thread bound to `slot` reaches its arena.
        let arena = unsafe { &mut *self.shared.slots[slot].arena.get() };
        let record = arena
            .allocate(size_of::<Job>())
            .unwrap_or_else(|| arena_exhausted(slot, arena.capacity()));
        let job = record.ptr().cast::<Job>();

        // SAFETY: `record` is a fresh, 64-byte aligned block of at least 64 bytes.
        unsafe {
            if Job::fits_inline::<F>() {
                Job::write_inline(job, parent, f);
            } else {
                assert!(
                    align_of::<F>() <= JobArena::ALIGNMENT,
                    "job closure alignment {} exceeds the arena alignment",
                    align_of::<F>()
                );
                let storage = arena
                    .allocate(size_of::<F>())
                    .unwrap_or_else(|| arena_exhausted(slot, arena.capacity()));
                Job::write_indirect(job, parent, storage.ptr().cast::<F>(), f);
            }
        }
        self.shared.created.fetch_add(1, Ordering::Relaxed);
        // SAFETY: arena blocks are never null.
        JobHandle::from_ptr(unsafe { NonNull::new_unchecked(job) })
    }

    /// Pushes `job` onto the calling thread's deque.
    ///
    /// When the deque is full the job runs inline instead.
    pub fn run(&self, job: JobHandle) {
        let slot = self.current_slot();
        let deque = &self.shared.slots[slot].deque;
        if let Err(job) = deque.push(job) {
            log::warn!(
                "Job deque of slot {slot} is full ({} jobs); running the job inline. Raise jobs.max_jobs_per_queue.",
                deque.capacity()
            );
            self.shared.inline_overflows.fetch_add(1, Ordering::Relaxed);
            self.execute(job);
        }
    }

    /// Executes other jobs until `job` and its descendants have finished.
    pub fn wait(&self, job: JobHandle) {
        let slot = self.current_slot();
        let mut backoff = Backoff::new();
        while !job.is_finished() {
            match self.get_job(slot) {
                Some(next) => {
                    self.execute(next);
                    backoff.reset();
                }
                None => backoff.snooze(),
            }
        }
    }

    /// Counters accumulated since start-up.
    pub fn stats(&self) -> JobStats {
        let shared = &self.shared;
        JobStats {
            workers: shared.slots.len() - 1,
            created: shared.created.load(Ordering::Relaxed),
            executed: shared.executed.load(Ordering::Relaxed),
            stolen: shared.stolen.load(Ordering::Relaxed),
            inline_overflows: shared.inline_overflows.load(Ordering::Relaxed),
        }
    }

    /// Pops a local job, or steals from one random other deque.
    fn get_job(&self, slot: usize) -> Option<JobHandle> {
        let slots = &self.shared.slots;
        if let Some(job) = slots[slot].deque.pop() {
            return Some(job);
        }
        if slots.len() < 2 {
            return None;
        }
        let victim = self.pick_victim(slot, slots.len());
        let job = slots[victim].deque.steal()?;
        self.shared.stolen.fetch_add(1, Ordering::Relaxed);
        log::trace!("Slot {slot} stole a job from slot {victim}");
        Some(job)
    }

    fn pick_victim(&self, slot: usize, count: usize) -> usize {
        let id = self.shared.id;
        BINDINGS.with(|bindings| {
            let mut bindings = bindings.borrow_mut();
            let binding = bindings.iter_mut().find(|b| b.system == id);
            match binding {
                Some(binding) => loop {
                    let victim = binding.rng.gen_range(0..count);
                    if victim != slot {
                        break victim;
                    }
                },
                None => (slot + 1) % count,
            }
        })
    }

    fn execute(&self, job: JobHandle) {
        // SAFETY: every job reaching here was dequeued exactly once.
        unsafe { job.execute(self) };
        self.shared.executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops queued jobs of `slot` and rewinds its arena. Owner thread only.
    fn clear_local(&self, slot: usize) {
        let worker = &self.shared.slots[slot];
        let mut dropped = 0usize;
        while worker.deque.pop().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            log::warn!("Slot {slot} discarded {dropped} queued jobs while clearing");
        }
        // SAFETY: the caller is the thread bound to `slot`.
        unsafe { (*worker.arena.get()).reset() };
    }

    fn worker_main(self, slot: usize) {
        bind_current_thread(self.shared.id, slot);
        log::debug!("Job worker {slot} started");
        let worker = &self.shared.slots[slot];
        let mut backoff = Backoff::new();
        while self.shared.running.load(Ordering::Acquire) {
            if let Some(job) = self.get_job(slot) {
                self.execute(job);
                backoff.reset();
                continue;
            }
            if worker.clear_requested.swap(false, Ordering::AcqRel) {
                self.clear_local(slot);
                self.shared.clear_pending.fetch_sub(1, Ordering::AcqRel);
                continue;
            }
            backoff.idle();
        }
        unbind_current_thread(self.shared.id);
        log::debug!("Job worker {slot} stopped");
    }
}

fn arena_exhausted(slot: usize, capacity: usize) -> ! {
    panic!(
        "job arena of slot {slot} exhausted ({capacity} bytes reserved); call clear_jobs each frame or raise jobs.arena_bytes"
    )
}

/// Owns the worker threads of a [`JobScheduler`].
///
/// The thread calling [`new`](Self::new) becomes the bootstrap thread (slot 0)
/// and may create, run and wait on jobs. Dropping the system stops and joins
/// every worker; jobs still queued at that point never run.
pub struct JobSystem {
    scheduler: JobScheduler,
    workers: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Reserves one arena and one deque per thread and spawns the workers.
    pub fn new(config: &JobConfig) -> io::Result<Self> {
        let worker_count = config.resolved_worker_count();
        let id = NEXT_SYSTEM_ID.fetch_add(1, Ordering::Relaxed);
        let slots = (0..=worker_count)
            .map(|_| {
                Ok(WorkerSlot {
                    deque: JobDeque::with_capacity(config.max_jobs_per_queue),
                    arena: UnsafeCell::new(JobArena::with_capacity(config.arena_bytes)?),
                    clear_requested: AtomicBool::new(false),
                })
            })
            .collect::<io::Result<Box<[_]>>>()?;

        let scheduler = JobScheduler {
            shared: Arc::new(Shared {
                id,
                slots,
                running: AtomicBool::new(true),
                clear_pending: AtomicUsize::new(0),
                created: AtomicU64::new(0),
                executed: AtomicU64::new(0),
                stolen: AtomicU64::new(0),
                inline_overflows: AtomicU64::new(0),
            }),
        };
        bind_current_thread(id, 0);

        let mut system = Self {
            scheduler,
            workers: Vec::with_capacity(worker_count),
        };
        for slot in 1..=worker_count {
            let scheduler = system.scheduler.clone();
            let handle = thread::Builder::new()
                .name(format!("ember-worker-{slot}"))
                .spawn(move || scheduler.worker_main(slot))?;
            system.workers.push(handle);
        }
        log::info!(
            "Job system #{id} started: {worker_count} workers, {} jobs per deque, {} MiB arena per thread",
            config.max_jobs_per_queue,
            config.arena_bytes / (1024 * 1024)
        );
        Ok(system)
    }

    /// The scheduler shared with workers and job closures.
    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Worker threads, excluding the bootstrap thread.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Drains every deque and rewinds every arena, invalidating all
    /// outstanding [`JobHandle`]s.
    ///
    /// Must run on the bootstrap thread once every job it cares about has
    /// finished. Each worker clears its own slot when it next goes idle; this
    /// call spins until all of them have.
    pub fn clear_jobs(&self) {
        let slot = self.scheduler.current_slot();
        assert_eq!(slot, 0, "clear_jobs must be called from the bootstrap thread");
        let shared = &self.scheduler.shared;
        shared.clear_pending.store(self.workers.len(), Ordering::Release);
        for worker in &shared.slots[1..] {
            worker.clear_requested.store(true, Ordering::Release);
        }
        self.scheduler.clear_local(0);

        let mut backoff = Backoff::new();
        while shared.clear_pending.load(Ordering::Acquire) != 0 {
            backoff.snooze();
        }
        log::trace!("Job system #{} cleared", shared.id);
    }
}

impl std::ops::Deref for JobSystem {
    type Target = JobScheduler;

    fn deref(&self) -> &JobScheduler {
        &self.scheduler
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        let shared = &self.scheduler.shared;
        shared.running.store(false, Ordering::Release);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("A job worker of system #{} panicked", shared.id);
            }
        }
        unbind_current_thread(shared.id);
        let stats = self.scheduler.stats();
        log::info!(
            "Job system #{} stopped: {} jobs executed, {} stolen",
            shared.id,
            stats.executed,
            stats.stolen
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn config(workers: usize) -> JobConfig {
        JobConfig {
            worker_count: Some(workers),
            max_jobs_per_queue: 1024,
            arena_bytes: 1 << 20,
        }
    }

    #[test]
    fn child_jobs_finish_before_their_parent() {
        let system = JobSystem::new(&config(2)).unwrap();
        let children_done = Arc::new(AtomicU32::new(0));

        let root = system.create_job(|_, _| {});
        for _ in 0..8 {
            let done = Arc::clone(&children_done);
            let child = system.create_child_job(root, move |_, _| {
                done.fetch_add(1, Ordering::Relaxed);
            });
            system.run(child);
        }
        system.run(root);
        system.wait(root);

        assert!(root.is_finished());
        assert_eq!(children_done.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn oversized_closures_overflow_into_the_arena() {
        let system = JobSystem::new(&config(1)).unwrap();
        let big = [7u64; 32];
        let sum = Arc::new(AtomicU64::new(0));
        let out = Arc::clone(&sum);

        let job = system.create_job(move |_, _| {
            out.store(big.iter().sum(), Ordering::Relaxed);
        });
        system.run(job);
        system.wait(job);

        assert_eq!(sum.load(Ordering::Relaxed), 7 * 32);
    }

    #[test]
    fn full_deque_runs_jobs_inline() {
        let system = JobSystem::new(&JobConfig {
            worker_count: Some(0),
            max_jobs_per_queue: 2,
            arena_bytes: 1 << 16,
        })
        .unwrap();
        let ran = Arc::new(AtomicU32::new(0));

        let root = system.create_job(|_, _| {});
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            let child = system.create_child_job(root, move |_, _| {
                ran.fetch_add(1, Ordering::Relaxed);
            });
            system.run(child);
        }
        assert_eq!(ran.load(Ordering::Relaxed), 1, "third push overflowed and ran inline");

        system.run(root);
        system.wait(root);
        assert_eq!(ran.load(Ordering::Relaxed), 3);
        assert_eq!(system.stats().inline_overflows, 2);
    }

    #[test]
    fn clear_jobs_rewinds_every_arena() {
        let system = JobSystem::new(&config(3)).unwrap();
        for _ in 0..4 {
            let root = system.parallel_for(256, 8, |_| {});
            system.run(root);
            system.wait(root);
            system.clear_jobs();
        }
        // SAFETY: the bootstrap thread owns slot 0.
        let used = unsafe { (*system.scheduler.shared.slots[0].arena.get()).used() };
        assert_eq!(used, 0);
    }

    #[test]
    #[should_panic(expected = "not bound")]
    fn unbound_threads_cannot_create_jobs() {
        let system = JobSystem::new(&config(1)).unwrap();
        let scheduler = system.scheduler().clone();
        let result = thread::spawn(move || {
            scheduler.create_job(|_, _| {});
        })
        .join();
        if let Err(panic) = result {
            std::panic::resume_unwind(panic);
        }
    }
}
