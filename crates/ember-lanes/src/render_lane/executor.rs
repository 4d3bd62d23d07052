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

//! Sorted replay of a frame's draws and dispatches against the backend.

use ember_core::renderer::limits::MAX_TEXTURE_UNITS;
use ember_core::renderer::{
    BlendEquation, ClearValues, CullMode, GpuVertexArray, GraphicsBackend, IndexBufferHandle,
    MemoryBarrier, PrimitiveTopology, ProgramHandle, RenderLayerHandle, RenderState, RenderStats,
    ScissorRect, SortKey, TextureHandle, VertexBufferHandle,
};
use ember_data::hash_index::HashIndex;

use super::command::{RecordRef, RenderBindings, WHOLE_BUFFER};
use super::frame::FrameSubmissions;
use super::resources::{ProgramRecord, RenderResources};
use super::uniform_encoder::decode_uniforms;

#[derive(Debug, Clone, Copy)]
struct CachedVertexArray {
    vertex_buffer: VertexBufferHandle,
    index_buffer: IndexBufferHandle,
    gpu: GpuVertexArray,
}

/// Vertex arrays keyed by `(vertex buffer, index buffer)`.
#[derive(Debug, Default)]
pub(crate) struct VertexArrayCache {
    index: HashIndex,
    entries: Vec<Option<CachedVertexArray>>,
    free: Vec<u32>,
}

impl VertexArrayCache {
    fn key(vertex_buffer: VertexBufferHandle, index_buffer: IndexBufferHandle) -> u32 {
        vertex_buffer.index().wrapping_mul(0x9E37_79B1) ^ index_buffer.index()
    }

    pub(crate) fn get(
        &self,
        vertex_buffer: VertexBufferHandle,
        index_buffer: IndexBufferHandle,
    ) -> Option<GpuVertexArray> {
        self.index
            .chain(Self::key(vertex_buffer, index_buffer))
            .filter_map(|slot| self.entries.get(slot as usize).copied().flatten())
            .find(|entry| entry.vertex_buffer == vertex_buffer && entry.index_buffer == index_buffer)
            .map(|entry| entry.gpu)
    }

    pub(crate) fn insert(
        &mut self,
        vertex_buffer: VertexBufferHandle,
        index_buffer: IndexBufferHandle,
        gpu: GpuVertexArray,
    ) {
        let entry = CachedVertexArray {
            vertex_buffer,
            index_buffer,
            gpu,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.entries[slot as usize] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                (self.entries.len() - 1) as u32
            }
        };
        self.index.add(Self::key(vertex_buffer, index_buffer), slot);
    }

    /// Destroys every cached array matching `evict`.
    fn evict_where(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        mut evict: impl FnMut(&CachedVertexArray) -> bool,
    ) -> usize {
        let mut evicted = 0;
        for slot in 0..self.entries.len() {
            let Some(entry) = self.entries[slot] else {
                continue;
            };
            if !evict(&entry) {
                continue;
            }
            self.index
                .remove(Self::key(entry.vertex_buffer, entry.index_buffer), slot as u32);
            backend.destroy_vertex_array(entry.gpu);
            self.entries[slot] = None;
            self.free.push(slot as u32);
            evicted += 1;
        }
        evicted
    }

    pub(crate) fn evict_vertex_buffer(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        buffer: VertexBufferHandle,
    ) -> usize {
        self.evict_where(backend, |entry| entry.vertex_buffer == buffer)
    }

    pub(crate) fn evict_index_buffer(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        buffer: IndexBufferHandle,
    ) -> usize {
        self.evict_where(backend, |entry| entry.index_buffer == buffer)
    }

    pub(crate) fn clear(&mut self, backend: &mut dyn GraphicsBackend) {
        self.evict_where(backend, |_| true);
        self.index.clear();
        self.entries.clear();
        self.free.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }
}

/// What the executor believes is bound on the backend.
struct TrackedState {
    layer: Option<u8>,
    program: ProgramHandle,
    program_usable: bool,
    textures: [TextureHandle; MAX_TEXTURE_UNITS],
    state: RenderState,
    scissor: ScissorRect,
    vertex_array: Option<GpuVertexArray>,
}

/// Replays one frame's sorted records, skipping every backend call whose
/// value is already bound.
#[derive(Debug)]
pub struct FrameExecutor {
    frame_number: u64,
    keys: Vec<(SortKey, RecordRef)>,
    vertex_arrays: VertexArrayCache,
    framebuffer_size: (u32, u32),
    clear: ClearValues,
}

impl FrameExecutor {
    pub(crate) fn new(framebuffer_size: (u32, u32), clear: ClearValues) -> Self {
        Self {
            frame_number: 0,
            keys: Vec::new(),
            vertex_arrays: VertexArrayCache::default(),
            framebuffer_size,
            clear,
        }
    }

    /// Frames executed so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub(crate) fn set_framebuffer_size(&mut self, width: u32, height: u32) {
        self.framebuffer_size = (width, height);
    }

    pub(crate) fn set_clear(&mut self, clear: ClearValues) {
        self.clear = clear;
    }

    pub(crate) fn vertex_arrays(&mut self) -> &mut VertexArrayCache {
        &mut self.vertex_arrays
    }

    /// Applies the frame's records in key order.
    ///
    /// # Safety
    ///
    /// Render phase only: no recorder may be submitting into `frame`.
    pub(crate) unsafe fn execute(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        resources: &RenderResources,
        frame: &FrameSubmissions,
        stats: &mut RenderStats,
    ) {
        self.frame_number += 1;
        stats.frame_number = self.frame_number;

        frame.sorted_keys(&mut self.keys);

        let (width, height) = self.framebuffer_size;
        let mut tracked = TrackedState {
            layer: None,
            program: ProgramHandle::INVALID,
            program_usable: false,
            textures: [TextureHandle::INVALID; MAX_TEXTURE_UNITS],
            state: RenderState::DEFAULT,
            scissor: ScissorRect::full(width, height),
            vertex_array: None,
        };
        Self::apply_defaults(backend, &tracked);
        backend.clear(self.clear);

        let keys = std::mem::take(&mut self.keys);
        for (key, record) in &keys {
            let layer = key.layer();
            if tracked.layer != Some(layer) {
                Self::enter_layer(backend, resources, layer);
                tracked.layer = Some(layer);
            }

            let bindings: &RenderBindings = match *record {
                RecordRef::Draw(index) => &frame.draw(index).bindings,
                RecordRef::Compute(index) => &frame.compute(index).bindings,
            };
            let Some(program) = Self::bind_program(backend, resources, &mut tracked, bindings.program, stats)
            else {
                continue;
            };
            if program.compute != matches!(record, RecordRef::Compute(_)) {
                log::warn!(
                    "{:?} is a {} program; record skipped",
                    bindings.program,
                    if program.compute { "compute" } else { "graphics" }
                );
                continue;
            }
            Self::replay_uniforms(backend, resources, frame, program, bindings, stats);
            Self::bind_textures(backend, resources, &mut tracked, bindings, stats);
            Self::bind_buffers(backend, resources, bindings, stats);

            match *record {
                RecordRef::Compute(index) => {
                    let [x, y, z] = frame.compute(index).groups;
                    backend.dispatch_compute(x, y, z);
                    backend.memory_barrier(MemoryBarrier::ALL);
                    stats.dispatches += 1;
                    log::trace!("Dispatched {x}x{y}x{z} with {:?}", bindings.program);
                }
                RecordRef::Draw(index) => {
                    let draw = frame.draw(index);
                    Self::apply_state(backend, &mut tracked, draw.state, stats);

                    let scissor = draw.scissor.unwrap_or(ScissorRect::full(width, height));
                    if scissor != tracked.scissor {
                        backend.set_scissor(scissor);
                        tracked.scissor = scissor;
                        stats.scissor_changes += 1;
                    }

                    let Some(vertex_buffer) = resources.vertex_buffers.get(draw.vertex_buffer) else {
                        log::warn!("Draw references missing {:?}; skipped", draw.vertex_buffer);
                        continue;
                    };
                    let index_buffer = if draw.index_buffer.is_valid() {
                        match resources.index_buffers.get(draw.index_buffer) {
                            Some(record) => Some(record),
                            None => {
                                log::warn!("Draw references missing {:?}; skipped", draw.index_buffer);
                                continue;
                            }
                        }
                    } else {
                        None
                    };

                    let vertex_array = match self.vertex_arrays.get(draw.vertex_buffer, draw.index_buffer) {
                        Some(gpu) => gpu,
                        None => {
                            let created = backend.create_vertex_array(
                                vertex_buffer.gpu,
                                &vertex_buffer.layout,
                                vertex_buffer.vertex_count,
                                index_buffer.map(|record| record.gpu),
                            );
                            match created {
                                Ok(gpu) => {
                                    self.vertex_arrays.insert(draw.vertex_buffer, draw.index_buffer, gpu);
                                    stats.vertex_array_misses += 1;
                                    gpu
                                }
                                Err(error) => {
                                    log::warn!("Vertex array creation failed: {error}; draw skipped");
                                    continue;
                                }
                            }
                        }
                    };
                    if tracked.vertex_array != Some(vertex_array) {
                        backend.bind_vertex_array(Some(vertex_array));
                        tracked.vertex_array = Some(vertex_array);
                    }

                    let primitive = draw.state.primitive().unwrap_or(PrimitiveTopology::Triangles);
                    match index_buffer {
                        Some(indices) => {
                            let count = if draw.index_count == WHOLE_BUFFER {
                                (indices.index_count as u32).saturating_sub(draw.first_index)
                            } else {
                                draw.index_count
                            };
                            backend.draw_indexed(
                                primitive,
                                indices.format,
                                count,
                                draw.first_index as usize * indices.format.size(),
                                draw.first_vertex as i32,
                            );
                        }
                        None => {
                            let count = if draw.vertex_count == WHOLE_BUFFER {
                                (vertex_buffer.vertex_count as u32).saturating_sub(draw.first_vertex)
                            } else {
                                draw.vertex_count
                            };
                            backend.draw(primitive, draw.first_vertex, count);
                        }
                    }
                    stats.draw_calls += 1;
                }
            }
        }
        self.keys = keys;
    }

    fn apply_defaults(backend: &mut dyn GraphicsBackend, tracked: &TrackedState) {
        let state = tracked.state;
        backend.bind_framebuffer(None);
        backend.bind_program(None);
        backend.bind_vertex_array(None);
        backend.set_write_mask(state.write_mask());
        if let Some(test) = state.depth_test() {
            backend.set_depth_test(test);
        }
        backend.set_blend(None);
        backend.set_blend_equation(BlendEquation::Add);
        backend.set_cull_mode(state.cull().unwrap_or(CullMode::Back));
        backend.set_scissor(tracked.scissor);
    }

    fn enter_layer(backend: &mut dyn GraphicsBackend, resources: &RenderResources, layer: u8) {
        let Some(record) = resources.layers.get(RenderLayerHandle::from_index(u32::from(layer))) else {
            backend.bind_framebuffer(None);
            return;
        };
        let framebuffer = record
            .framebuffer()
            .and_then(|handle| resources.framebuffers.get(handle))
            .map(|framebuffer| framebuffer.gpu);
        backend.bind_framebuffer(framebuffer);
        let clear = record.descriptor.clear;
        if clear.color.is_some() || clear.depth.is_some() {
            backend.clear(clear);
        }
        log::trace!("Entered render layer {layer} ({})", record.descriptor.name);
    }

    /// Binds `handle` if it differs from the tracked program. Returns `None`
    /// when the record must be skipped.
    fn bind_program<'r>(
        backend: &mut dyn GraphicsBackend,
        resources: &'r RenderResources,
        tracked: &mut TrackedState,
        handle: ProgramHandle,
        stats: &mut RenderStats,
    ) -> Option<&'r ProgramRecord> {
        let program = resources.programs.get(handle);
        if handle != tracked.program {
            tracked.program = handle;
            tracked.program_usable = false;
            match program.and_then(|record| record.gpu) {
                Some(gpu) => {
                    backend.bind_program(Some(gpu));
                    tracked.program_usable = true;
                    stats.program_binds += 1;
                }
                None => log::warn!("{handle:?} is missing or failed to link; its records are skipped"),
            }
        }
        if tracked.program_usable {
            program
        } else {
            None
        }
    }

    unsafe fn replay_uniforms(
        backend: &mut dyn GraphicsBackend,
        resources: &RenderResources,
        frame: &FrameSubmissions,
        program: &ProgramRecord,
        bindings: &RenderBindings,
        stats: &mut RenderStats,
    ) {
        if bindings.uniform_start == bindings.uniform_end {
            return;
        }
        let bytes = frame.uniforms().range(bindings.uniform_start..bindings.uniform_end);
        for update in decode_uniforms(bytes) {
            let Some(uniform) = resources.uniforms.get(update.uniform) else {
                log::warn!("Update to unknown {:?} ignored", update.uniform);
                continue;
            };
            let Some(active) = program.uniform(uniform.hash, &uniform.name) else {
                log::warn!("Uniform `{}` is not active in the bound program", uniform.name);
                continue;
            };
            if !active.ty.accepts(update.ty) {
                log::warn!(
                    "Uniform `{}` is declared {:?} but was written as {:?}",
                    uniform.name,
                    active.ty,
                    update.ty
                );
                continue;
            }
            let count = update.count.min(active.count.max(1));
            let len = update.ty.size() * count as usize;
            backend.set_uniform(active.location, update.ty, count, &update.payload[..len]);
            stats.uniform_uploads += 1;
        }
    }

    fn bind_textures(
        backend: &mut dyn GraphicsBackend,
        resources: &RenderResources,
        tracked: &mut TrackedState,
        bindings: &RenderBindings,
        stats: &mut RenderStats,
    ) {
        for (unit, (&wanted, bound)) in bindings
            .textures
            .iter()
            .zip(tracked.textures.iter_mut())
            .enumerate()
        {
            if wanted == *bound {
                continue;
            }
            let gpu = resources.textures.get(wanted).map(|texture| texture.gpu);
            backend.bind_texture(unit as u32, gpu);
            *bound = wanted;
            stats.texture_binds += 1;
        }
    }

    fn bind_buffers(
        backend: &mut dyn GraphicsBackend,
        resources: &RenderResources,
        bindings: &RenderBindings,
        stats: &mut RenderStats,
    ) {
        for (binding, &handle) in bindings.storage_buffers.iter().enumerate() {
            if !handle.is_valid() {
                continue;
            }
            let gpu = resources.storage_buffers.get(handle).map(|buffer| buffer.gpu);
            backend.bind_storage_buffer(binding as u32, gpu);
            stats.buffer_binds += 1;
        }
        for (binding, &handle) in bindings.atomic_counters.iter().enumerate() {
            if !handle.is_valid() {
                continue;
            }
            let gpu = resources.atomic_counters.get(handle).map(|buffer| buffer.gpu);
            backend.bind_atomic_counter_buffer(binding as u32, gpu);
            stats.buffer_binds += 1;
        }
    }

    /// Issues a backend call for each raster sub-field that differs from the
    /// tracked state. Undecodable sub-fields leave the backend untouched.
    fn apply_state(
        backend: &mut dyn GraphicsBackend,
        tracked: &mut TrackedState,
        state: RenderState,
        stats: &mut RenderStats,
    ) {
        let changed = tracked.state.bits() ^ state.bits();
        if changed == 0 {
            return;
        }
        let mut applied = tracked.state.bits();
        let mut adopt = |mask: u64| applied = (applied & !mask) | (state.bits() & mask);

        if changed & RenderState::WRITE_MASK != 0 {
            backend.set_write_mask(state.write_mask());
            adopt(RenderState::WRITE_MASK);
            stats.state_changes += 1;
        }
        if changed & RenderState::DEPTH_TEST_MASK != 0 {
            match state.depth_test() {
                Some(test) => {
                    backend.set_depth_test(test);
                    adopt(RenderState::DEPTH_TEST_MASK);
                    stats.state_changes += 1;
                }
                None => log::warn!("Unknown depth test in render state {:#x}", state.bits()),
            }
        }
        if changed & RenderState::BLEND_FUNC_MASK != 0 {
            match state.blend() {
                Some(factors) => {
                    backend.set_blend(factors);
                    adopt(RenderState::BLEND_FUNC_MASK);
                    stats.state_changes += 1;
                }
                None => log::warn!("Unknown blend factor in render state {:#x}", state.bits()),
            }
        }
        if changed & RenderState::BLEND_EQUATION_MASK != 0 {
            match state.blend_equation() {
                Some(equation) => {
                    backend.set_blend_equation(equation);
                    adopt(RenderState::BLEND_EQUATION_MASK);
                    stats.state_changes += 1;
                }
                None => log::warn!("Unknown blend equation in render state {:#x}", state.bits()),
            }
        }
        if changed & RenderState::CULL_MASK != 0 {
            match state.cull() {
                Some(mode) => {
                    backend.set_cull_mode(mode);
                    adopt(RenderState::CULL_MASK);
                    stats.state_changes += 1;
                }
                None => log::warn!("Unknown cull mode in render state {:#x}", state.bits()),
            }
        }
        // Topology is a draw argument, not bound state.
        if changed & RenderState::PRIMITIVE_MASK != 0 && state.primitive().is_some() {
            adopt(RenderState::PRIMITIVE_MASK);
        }
        tracked.state = RenderState::from_bits(applied);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_array_cache_matches_both_handles() {
        let mut cache = VertexArrayCache::default();
        let vb = VertexBufferHandle::from_index(1);
        cache.insert(vb, IndexBufferHandle::INVALID, GpuVertexArray(10));
        cache.insert(vb, IndexBufferHandle::from_index(2), GpuVertexArray(11));

        assert_eq!(cache.get(vb, IndexBufferHandle::INVALID), Some(GpuVertexArray(10)));
        assert_eq!(cache.get(vb, IndexBufferHandle::from_index(2)), Some(GpuVertexArray(11)));
        assert_eq!(cache.get(VertexBufferHandle::from_index(2), IndexBufferHandle::INVALID), None);
        assert_eq!(cache.len(), 2);
    }
}
