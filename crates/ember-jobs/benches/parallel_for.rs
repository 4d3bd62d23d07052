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

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ember_core::config::JobConfig;
use ember_jobs::JobSystem;

fn bench_parallel_for(c: &mut Criterion) {
    let system = JobSystem::new(&JobConfig::default()).expect("job system should start");
    let sink = Arc::new(AtomicU64::new(0));

    let mut group = c.benchmark_group("Job Scheduler");

    for batch in [64usize, 1024] {
        let acc = Arc::clone(&sink);
        group.bench_function(format!("parallel_for 100k / batch {batch}"), |b| {
            b.iter(|| {
                let acc = Arc::clone(&acc);
                let root = system.parallel_for(100_000, batch, move |i| {
                    acc.fetch_add(black_box(i as u64), Ordering::Relaxed);
                });
                system.run(root);
                system.wait(root);
                system.clear_jobs();
            });
        });
    }

    group.bench_function("create + run 1k empty jobs", |b| {
        b.iter(|| {
            let root = system.create_job(|_, _| {});
            for _ in 0..1000 {
                let child = system.create_child_job(root, |_, _| {});
                system.run(child);
            }
            system.run(root);
            system.wait(root);
            system.clear_jobs();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parallel_for);
criterion_main!(benches);
