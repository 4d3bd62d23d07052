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

//! Compile-time limits of the renderer.
//!
//! Exceeding any of these is a programmer error and panics with a diagnostic.

/// Texture units a single draw can bind.
pub const MAX_TEXTURE_UNITS: usize = 16;

/// Shader-storage buffer binding points a single draw can use.
pub const MAX_SSBO_BINDINGS: usize = 8;

/// Atomic-counter buffer binding points a single draw can use.
pub const MAX_ATOMIC_COUNTER_BINDINGS: usize = 8;

/// Number of render layers; a layer id is a `u8`.
pub const MAX_RENDER_LAYERS: usize = 256;

/// Attributes a vertex layout can describe.
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Default number of draws (and, separately, dispatches) recorded per frame.
pub const DEFAULT_MAX_DRAWS_PER_FRAME: usize = 16 * 1024;

/// Default size of the per-frame uniform payload arena.
pub const DEFAULT_UNIFORM_ARENA_BYTES: usize = 2 * 1024 * 1024;

/// Default size of each half of the render command stream.
pub const DEFAULT_COMMAND_STREAM_BYTES: usize = 1024 * 1024;

/// Capacity of the vertex-buffer pool.
pub const MAX_VERTEX_BUFFERS: usize = 4096;
/// Capacity of the index-buffer pool.
pub const MAX_INDEX_BUFFERS: usize = 4096;
/// Capacity of the texture pool.
pub const MAX_TEXTURES: usize = 4096;
/// Capacity of the program pool. Bounded by the 12-bit program field of the sort key.
pub const MAX_PROGRAMS: usize = 4096;
/// Capacity of the uniform pool.
pub const MAX_UNIFORMS: usize = 4096;
/// Capacity of the shader-storage buffer pool.
pub const MAX_SHADER_STORAGE_BUFFERS: usize = 1024;
/// Capacity of the atomic-counter buffer pool.
pub const MAX_ATOMIC_COUNTER_BUFFERS: usize = 256;
/// Capacity of the framebuffer pool.
pub const MAX_FRAMEBUFFERS: usize = 256;
