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

//! The composable allocator family.
//!
//! Every allocator implements [`Allocator`](ember_core::memory::Allocator);
//! combinators are generic over their parents, so a policy such as
//! "small requests from a free list over the heap, large ones straight from the
//! heap" is a type:
//!
//! ```
//! use ember_core::memory::Allocator;
//! use ember_data::allocators::{Freelist, Mallocator, Segregator};
//!
//! let mut alloc: Segregator<128, Freelist<Mallocator, 64>, Mallocator> = Default::default();
//! let block = alloc.allocate(64).unwrap();
//! alloc.deallocate(block);
//! assert_eq!(alloc.allocate(64).unwrap().ptr(), block.ptr());
//! ```

mod affix;
mod bump;
mod collection_of_stacks;
mod fallback;
mod freelist;
mod growing_linear;
mod mallocator;
mod segregator;
mod stack;

pub use self::affix::AffixAllocator;
pub use self::collection_of_stacks::CollectionOfStacksAllocator;
pub use self::fallback::FallbackAllocator;
pub use self::freelist::Freelist;
pub use self::growing_linear::GrowingLinearAllocator;
pub use self::mallocator::Mallocator;
pub use self::segregator::Segregator;
pub use self::stack::StackAllocator;
