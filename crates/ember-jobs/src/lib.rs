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

//! # Ember Jobs
//!
//! A fixed pool of worker threads, each owning a bounded Chase–Lev deque and a
//! linear job arena. Jobs form trees through parent links; waiting on a job
//! executes other work until the whole subtree has finished.
//!
//! ```no_run
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use ember_core::config::JobConfig;
//! use ember_jobs::JobSystem;
//!
//! let system = JobSystem::new(&JobConfig::default()).unwrap();
//! let jobs = system.scheduler();
//! let sum = Arc::new(AtomicUsize::new(0));
//! let acc = Arc::clone(&sum);
//! let root = jobs.parallel_for(1000, 16, move |i| {
//!     acc.fetch_add(i, Ordering::Relaxed);
//! });
//! jobs.run(root);
//! jobs.wait(root);
//! assert_eq!(sum.load(Ordering::Relaxed), 499_500);
//! ```

#![warn(missing_docs)]

mod backoff;
mod deque;
mod job;
mod parallel_for;
mod scheduler;

pub use job::{JobHandle, INLINE_PAYLOAD_BYTES};
pub use scheduler::{JobScheduler, JobStats, JobSystem};
