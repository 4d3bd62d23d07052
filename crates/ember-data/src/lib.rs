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

//! # Ember Data
//!
//! Memory and data-layout building blocks consumed by the scheduler and the
//! renderer: the composable allocator family, OS virtual memory, the
//! two-array [`HashIndex`](hash_index::HashIndex) and fixed-capacity
//! [`ResourcePool`](pool::ResourcePool)s.

#![warn(missing_docs)]

pub mod allocators;
pub mod hash_index;
pub mod pool;
pub mod virtual_memory;

pub use hash_index::HashIndex;
pub use pool::ResourcePool;
