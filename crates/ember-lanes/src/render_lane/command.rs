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

//! Per-draw and per-dispatch records captured at submit time.

use ember_core::renderer::limits::{
    MAX_ATOMIC_COUNTER_BINDINGS, MAX_SSBO_BINDINGS, MAX_TEXTURE_UNITS,
};
use ember_core::renderer::{
    AtomicCounterBufferHandle, IndexBufferHandle, ProgramHandle, RenderState, ScissorRect,
    ShaderStorageBufferHandle, TextureHandle, VertexBufferHandle,
};

/// Element count meaning "the rest of the bound buffer".
pub const WHOLE_BUFFER: u32 = u32::MAX;

/// Bindings shared by draws and dispatches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderBindings {
    /// Program to run.
    pub program: ProgramHandle,
    /// Texture bound to each unit.
    pub textures: [TextureHandle; MAX_TEXTURE_UNITS],
    /// Shader-storage buffer bound to each binding point.
    pub storage_buffers: [ShaderStorageBufferHandle; MAX_SSBO_BINDINGS],
    /// Atomic-counter buffer bound to each binding point.
    pub atomic_counters: [AtomicCounterBufferHandle; MAX_ATOMIC_COUNTER_BINDINGS],
    /// Start of this record's uniform updates in the frame uniform arena.
    pub uniform_start: u32,
    /// End (exclusive) of this record's uniform updates.
    pub uniform_end: u32,
}

impl Default for RenderBindings {
    fn default() -> Self {
        Self {
            program: ProgramHandle::INVALID,
            textures: [TextureHandle::INVALID; MAX_TEXTURE_UNITS],
            storage_buffers: [ShaderStorageBufferHandle::INVALID; MAX_SSBO_BINDINGS],
            atomic_counters: [AtomicCounterBufferHandle::INVALID; MAX_ATOMIC_COUNTER_BINDINGS],
            uniform_start: 0,
            uniform_end: 0,
        }
    }
}

/// One recorded draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    /// Program, textures, buffers and uniforms.
    pub bindings: RenderBindings,
    /// Vertex source.
    pub vertex_buffer: VertexBufferHandle,
    /// First vertex (base vertex for indexed draws).
    pub first_vertex: u32,
    /// Vertices to draw, or [`WHOLE_BUFFER`].
    pub vertex_count: u32,
    /// Index source; `INVALID` draws non-indexed.
    pub index_buffer: IndexBufferHandle,
    /// First index.
    pub first_index: u32,
    /// Indices to draw, or [`WHOLE_BUFFER`].
    pub index_count: u32,
    /// Scissor; `None` covers the whole target.
    pub scissor: Option<ScissorRect>,
    /// Packed raster state, including the primitive topology.
    pub state: RenderState,
}

impl Default for DrawCommand {
    fn default() -> Self {
        Self {
            bindings: RenderBindings::default(),
            vertex_buffer: VertexBufferHandle::INVALID,
            first_vertex: 0,
            vertex_count: WHOLE_BUFFER,
            index_buffer: IndexBufferHandle::INVALID,
            first_index: 0,
            index_count: WHOLE_BUFFER,
            scissor: None,
            state: RenderState::DEFAULT,
        }
    }
}

/// One recorded compute dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComputeCommand {
    /// Program, textures, buffers and uniforms.
    pub bindings: RenderBindings,
    /// Work-group counts.
    pub groups: [u32; 3],
}

/// Where a sort key's record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordRef {
    Draw(u32),
    Compute(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_record_stays_compact() {
        assert!(std::mem::size_of::<DrawCommand>() <= 256);
    }

    #[test]
    fn defaults_bind_nothing() {
        let draw = DrawCommand::default();
        assert!(!draw.bindings.program.is_valid());
        assert!(draw.bindings.textures.iter().all(|t| !t.is_valid()));
        assert_eq!(draw.state, RenderState::DEFAULT);
        assert_eq!(draw.vertex_count, WHOLE_BUFFER);
    }
}
