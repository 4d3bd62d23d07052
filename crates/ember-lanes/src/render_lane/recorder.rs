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

//! The per-thread draw builder.

use std::sync::Arc;

use ember_core::renderer::limits::{
    MAX_ATOMIC_COUNTER_BINDINGS, MAX_SSBO_BINDINGS, MAX_TEXTURE_UNITS,
};
use ember_core::renderer::{
    AtomicCounterBufferHandle, IndexBufferHandle, ProgramHandle, RenderLayerHandle, RenderState,
    ScissorRect, ShaderStorageBufferHandle, SortKeyFields, TextureHandle, UniformHandle,
    UniformType, UniformValue, VertexBufferHandle,
};

use super::command::{ComputeCommand, DrawCommand, RenderBindings, WHOLE_BUFFER};
use super::frame::FrameChannel;
use super::uniform_encoder::UniformEncoder;

/// Builds draws and dispatches for the current frame.
///
/// Each thread that records owns its own recorder (obtained from
/// [`RenderFrontend::recorder`](super::RenderFrontend::recorder)); recorders on
/// different threads only meet at the atomic slot counters of the frame.
/// State set with the `set_*` methods applies to the next
/// [`submit`](Self::submit) or [`submit_compute`](Self::submit_compute).
pub struct DrawRecorder {
    channel: Arc<FrameChannel>,
    current: DrawCommand,
    uniforms: UniformEncoder,
}

impl DrawRecorder {
    pub(crate) fn new(channel: Arc<FrameChannel>) -> Self {
        Self {
            channel,
            current: DrawCommand::default(),
            uniforms: UniformEncoder::new(),
        }
    }

    /// Replaces the packed raster state (write mask, depth, blend, cull, primitive).
    pub fn set_state(&mut self, state: RenderState) -> &mut Self {
        self.current.state = state;
        self
    }

    /// Draws `count` vertices of `buffer` starting at `first`.
    /// `count` may be [`WHOLE_BUFFER`].
    pub fn set_vertex_buffer(&mut self, buffer: VertexBufferHandle, first: u32, count: u32) -> &mut Self {
        self.current.vertex_buffer = buffer;
        self.current.first_vertex = first;
        self.current.vertex_count = count;
        self
    }

    /// Draws `count` indices of `buffer` starting at `first`.
    /// `count` may be [`WHOLE_BUFFER`].
    pub fn set_index_buffer(&mut self, buffer: IndexBufferHandle, first: u32, count: u32) -> &mut Self {
        self.current.index_buffer = buffer;
        self.current.first_index = first;
        self.current.index_count = count;
        self
    }

    /// Binds `texture` to `unit` and points `sampler` at that unit.
    ///
    /// # Panics
    ///
    /// Panics if `unit` is not below `MAX_TEXTURE_UNITS`.
    pub fn set_texture(&mut self, unit: u8, sampler: UniformHandle, texture: TextureHandle) -> &mut Self {
        let slot = unit as usize;
        assert!(
            slot < MAX_TEXTURE_UNITS,
            "texture unit {unit} out of range (max {MAX_TEXTURE_UNITS})"
        );
        self.current.bindings.textures[slot] = texture;
        if sampler.is_valid() {
            let unit = unit as i32;
            self.uniforms
                .push_raw(sampler, UniformType::Int, 1, bytemuck::bytes_of(&unit));
        }
        self
    }

    /// Binds a shader-storage buffer.
    pub fn set_shader_storage_buffer(&mut self, binding: u8, buffer: ShaderStorageBufferHandle) -> &mut Self {
        let slot = binding as usize;
        assert!(
            slot < MAX_SSBO_BINDINGS,
            "storage binding {binding} out of range (max {MAX_SSBO_BINDINGS})"
        );
        self.current.bindings.storage_buffers[slot] = buffer;
        self
    }

    /// Binds an atomic-counter buffer.
    pub fn set_atomic_counter_buffer(&mut self, binding: u8, buffer: AtomicCounterBufferHandle) -> &mut Self {
        let slot = binding as usize;
        assert!(
            slot < MAX_ATOMIC_COUNTER_BINDINGS,
            "atomic-counter binding {binding} out of range (max {MAX_ATOMIC_COUNTER_BINDINGS})"
        );
        self.current.bindings.atomic_counters[slot] = buffer;
        self
    }

    /// Restricts rasterisation to a rectangle.
    pub fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32) -> &mut Self {
        self.current.scissor = Some(ScissorRect::new(x, y, width, height));
        self
    }

    /// Removes the scissor.
    pub fn clear_scissor(&mut self) -> &mut Self {
        self.current.scissor = None;
        self
    }

    /// Queues a uniform update replayed right before the next draw.
    pub fn set_uniform<T: UniformValue>(&mut self, uniform: UniformHandle, values: &[T]) -> &mut Self {
        self.uniforms.push(uniform, values);
        self
    }

    /// Records a draw.
    ///
    /// Unless `preserve_state` is set, every `set_*` value returns to its
    /// default afterwards. Queued uniforms are consumed either way.
    pub fn submit(&mut self, layer: RenderLayerHandle, program: ProgramHandle, depth: u32, preserve_state: bool) {
        let Some(layer) = Self::layer_id(layer) else {
            self.finish_submit(preserve_state);
            return;
        };
        if !program.is_valid() {
            log::warn!("Draw submitted without a program; dropped");
            self.finish_submit(preserve_state);
            return;
        }
        let mut draw = self.current;
        draw.bindings.program = program;
        self.capture_uniforms(&mut draw.bindings);
        let frame = &self.channel.frame;

        let fields = SortKeyFields {
            layer,
            compute: false,
            sequence: frame.next_sequence(layer),
            program: program.index() as u16,
            depth,
        };
        frame.push_draw(fields, draw);
        log::trace!("Draw recorded in layer {layer} with program {program:?}");
        self.finish_submit(preserve_state);
    }

    /// Records a compute dispatch of `x * y * z` work groups. Textures, buffers
    /// and uniforms set so far apply to it; the recorder state is then reset.
    pub fn submit_compute(&mut self, layer: RenderLayerHandle, program: ProgramHandle, x: u32, y: u32, z: u32) {
        let Some(layer) = Self::layer_id(layer) else {
            self.finish_submit(false);
            return;
        };
        if !program.is_valid() {
            log::warn!("Dispatch submitted without a program; dropped");
            self.finish_submit(false);
            return;
        }
        let mut compute = ComputeCommand {
            bindings: self.current.bindings,
            groups: [x, y, z],
        };
        compute.bindings.program = program;
        self.capture_uniforms(&mut compute.bindings);
        let frame = &self.channel.frame;

        let fields = SortKeyFields {
            layer,
            compute: true,
            sequence: frame.next_sequence(layer),
            program: program.index() as u16,
            depth: 0,
        };
        frame.push_compute(fields, compute);
        self.finish_submit(false);
    }

    /// Drops every pending `set_*` value and queued uniform.
    pub fn discard(&mut self) {
        self.finish_submit(false);
    }

    fn layer_id(layer: RenderLayerHandle) -> Option<u8> {
        match u8::try_from(layer.index()) {
            Ok(id) => Some(id),
            Err(_) => {
                log::warn!("Submit to invalid render layer {layer:?}; dropped");
                None
            }
        }
    }

    fn capture_uniforms(&mut self, bindings: &mut RenderBindings) {
        let range = self.channel.frame.uniforms().append(self.uniforms.as_bytes());
        bindings.uniform_start = range.start;
        bindings.uniform_end = range.end;
    }

    fn finish_submit(&mut self, preserve_state: bool) {
        self.uniforms.clear();
        if !preserve_state {
            self.current = DrawCommand::default();
        }
    }
}

impl std::fmt::Debug for DrawRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawRecorder")
            .field("current", &self.current)
            .field("pending_uniform_bytes", &self.uniforms.as_bytes().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::command::RecordRef;
    use crate::render_lane::uniform_encoder::decode_uniforms;
    use ember_core::config::RenderConfig;

    fn channel() -> Arc<FrameChannel> {
        Arc::new(FrameChannel::new(&RenderConfig {
            max_draws_per_frame: 16,
            uniform_arena_bytes: 1024,
            command_stream_bytes: 1024,
            ..RenderConfig::default()
        }))
    }

    fn layer(index: u32) -> RenderLayerHandle {
        RenderLayerHandle::from_index(index)
    }

    #[test]
    fn submit_captures_state_then_resets() {
        let channel = channel();
        let mut recorder = DrawRecorder::new(Arc::clone(&channel));
        let vb = VertexBufferHandle::from_index(4);

        recorder
            .set_vertex_buffer(vb, 3, 6)
            .set_state(RenderState::WRITE_RGB)
            .set_scissor(1, 2, 3, 4);
        recorder.submit(layer(0), ProgramHandle::from_index(2), 7, false);
        recorder.submit(layer(0), ProgramHandle::from_index(2), 7, false);

        let mut keys = Vec::new();
        unsafe { channel.frame.sorted_keys(&mut keys) };
        assert_eq!(keys.len(), 2);
        let RecordRef::Draw(first) = keys[0].1 else { panic!("expected a draw") };
        let RecordRef::Draw(second) = keys[1].1 else { panic!("expected a draw") };
        let (first, second) = unsafe { (channel.frame.draw(first), channel.frame.draw(second)) };
        assert_eq!(first.vertex_buffer, vb);
        assert_eq!(first.first_vertex, 3);
        assert_eq!(first.scissor, Some(ScissorRect::new(1, 2, 3, 4)));
        assert_eq!(second.vertex_buffer, VertexBufferHandle::INVALID);
        assert_eq!(second.scissor, None);
        assert_eq!(second.state, RenderState::DEFAULT);
    }

    #[test]
    fn preserve_state_keeps_bindings_but_not_uniforms() {
        let channel = channel();
        let mut recorder = DrawRecorder::new(Arc::clone(&channel));
        let tint = UniformHandle::from_index(1);

        recorder
            .set_vertex_buffer(VertexBufferHandle::from_index(0), 0, WHOLE_BUFFER)
            .set_uniform(tint, &[[1.0f32, 0.0, 0.0, 1.0]]);
        recorder.submit(layer(0), ProgramHandle::from_index(0), 0, true);
        recorder.submit(layer(0), ProgramHandle::from_index(0), 1, true);

        let first = unsafe { channel.frame.draw(0) };
        let second = unsafe { channel.frame.draw(1) };
        assert_eq!(second.vertex_buffer, first.vertex_buffer);
        assert_eq!(first.bindings.uniform_end - first.bindings.uniform_start, 4 + 16);
        assert_eq!(second.bindings.uniform_start, second.bindings.uniform_end);
    }

    #[test]
    fn dropped_submit_still_resets_pending_state() {
        let channel = channel();
        let mut recorder = DrawRecorder::new(Arc::clone(&channel));
        let tint = UniformHandle::from_index(1);

        recorder
            .set_vertex_buffer(VertexBufferHandle::from_index(4), 0, WHOLE_BUFFER)
            .set_uniform(tint, &[[1.0f32, 0.0, 0.0, 1.0]]);
        recorder.submit(RenderLayerHandle::INVALID, ProgramHandle::from_index(0), 0, false);
        recorder.set_uniform(tint, &[[0.0f32, 1.0, 0.0, 1.0]]);
        recorder.submit_compute(RenderLayerHandle::INVALID, ProgramHandle::from_index(0), 1, 1, 1);
        recorder.submit(layer(0), ProgramHandle::from_index(0), 0, false);

        let mut keys = Vec::new();
        unsafe { channel.frame.sorted_keys(&mut keys) };
        assert_eq!(keys.len(), 1);
        let draw = unsafe { channel.frame.draw(0) };
        assert_eq!(draw.vertex_buffer, VertexBufferHandle::INVALID);
        assert_eq!(draw.bindings.uniform_start, draw.bindings.uniform_end);
    }

    #[test]
    fn set_texture_emits_the_sampler_unit() {
        let channel = channel();
        let mut recorder = DrawRecorder::new(Arc::clone(&channel));
        let sampler = UniformHandle::from_index(9);

        recorder.set_texture(3, sampler, TextureHandle::from_index(5));
        recorder.submit(layer(0), ProgramHandle::from_index(0), 0, false);

        let draw = unsafe { channel.frame.draw(0) };
        assert_eq!(draw.bindings.textures[3], TextureHandle::from_index(5));
        let bytes = unsafe {
            channel
                .frame
                .uniforms()
                .range(draw.bindings.uniform_start..draw.bindings.uniform_end)
        };
        let records: Vec<_> = decode_uniforms(bytes).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uniform, sampler);
        assert_eq!(records[0].payload, &3i32.to_ne_bytes());
    }

    #[test]
    fn compute_sorts_before_draws_in_the_same_layer() {
        let channel = channel();
        let mut recorder = DrawRecorder::new(Arc::clone(&channel));

        recorder.submit(layer(1), ProgramHandle::from_index(0), 0, false);
        recorder.submit_compute(layer(1), ProgramHandle::from_index(3), 8, 1, 1);

        let mut keys = Vec::new();
        unsafe { channel.frame.sorted_keys(&mut keys) };
        assert!(keys[0].0.is_compute());
        assert_eq!(keys[0].1, RecordRef::Compute(0));
        assert_eq!(unsafe { channel.frame.compute(0) }.groups, [8, 1, 1]);
    }
}
