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

use std::sync::Arc;

use crate::job::JobHandle;
use crate::scheduler::JobScheduler;

impl JobScheduler {
    /// Creates a root job calling `f(i)` for every `i` in `0..count`.
    ///
    /// The range is halved recursively, the left half taking `count / 2`,
    /// until every slice holds at most `batch` indices. The root is returned
    /// unsubmitted; pass it to [`run`](Self::run) then [`wait`](Self::wait).
    /// A `batch` of zero is treated as one.
    pub fn parallel_for<F>(&self, count: usize, batch: usize, f: F) -> JobHandle
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let batch = batch.max(1);
        self.create_job(move |scheduler, job| split(scheduler, job, f, 0, count, batch))
    }
}

fn split<F>(scheduler: &JobScheduler, job: JobHandle, f: Arc<F>, start: usize, end: usize, batch: usize)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let count = end - start;
    if count <= batch {
        for i in start..end {
            f(i);
        }
        return;
    }
    let middle = start + count / 2;
    let left_f = Arc::clone(&f);
    let left = scheduler.create_child_job(job, move |scheduler, job| {
        split(scheduler, job, left_f, start, middle, batch)
    });
    scheduler.run(left);
    let right = scheduler.create_child_job(job, move |scheduler, job| {
        split(scheduler, job, f, middle, end, batch)
    });
    scheduler.run(right);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobSystem;
    use ember_core::config::JobConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn system() -> JobSystem {
        JobSystem::new(&JobConfig {
            worker_count: Some(2),
            max_jobs_per_queue: 4096,
            arena_bytes: 1 << 20,
        })
        .unwrap()
    }

    #[test]
    fn empty_range_creates_a_single_idle_job() {
        let system = system();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let before = system.stats();

        let root = system.parallel_for(0, 4, move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        system.run(root);
        system.wait(root);

        let after = system.stats();
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(after.created - before.created, 1);
    }

    #[test]
    fn batch_equal_to_count_never_splits() {
        let system = system();
        let before = system.stats();

        let root = system.parallel_for(64, 64, |_| {});
        system.run(root);
        system.wait(root);

        assert_eq!(system.stats().created - before.created, 1);
    }

    #[test]
    fn every_index_is_visited_once() {
        let system = system();
        let hits: Arc<Vec<AtomicUsize>> = Arc::new((0..333).map(|_| AtomicUsize::new(0)).collect());
        let counters = Arc::clone(&hits);

        let root = system.parallel_for(333, 7, move |i| {
            counters[i].fetch_add(1, Ordering::Relaxed);
        });
        system.run(root);
        system.wait(root);

        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }
}
