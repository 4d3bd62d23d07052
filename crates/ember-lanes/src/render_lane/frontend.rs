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

//! The game-side resource registry.

use std::sync::Arc;

use ember_core::renderer::limits::{
    MAX_ATOMIC_COUNTER_BUFFERS, MAX_FRAMEBUFFERS, MAX_INDEX_BUFFERS, MAX_PROGRAMS,
    MAX_RENDER_LAYERS, MAX_SHADER_STORAGE_BUFFERS, MAX_TEXTURES, MAX_UNIFORMS, MAX_VERTEX_BUFFERS,
};
use ember_core::renderer::{
    uniform_name_hash, AtomicCounterBuffer, AtomicCounterBufferHandle, ClearValues, Framebuffer,
    FramebufferDescriptor, FramebufferHandle, Handle, IndexBuffer, IndexBufferDescriptor,
    IndexBufferHandle, Program, ProgramDescriptor, ProgramHandle, RenderLayer,
    RenderLayerDescriptor, RenderLayerHandle, RenderStats, ShaderError, ShaderStorageBuffer,
    ShaderStorageBufferHandle, StorageBufferDescriptor, Texture, TextureDescriptor, TextureHandle,
    Uniform, UniformDescriptor, UniformHandle, VertexBuffer, VertexBufferDescriptor,
    VertexBufferHandle,
};
use ember_data::{HashIndex, ResourcePool};

use super::frame::FrameChannel;
use super::memory::MemoryRef;
use super::recorder::DrawRecorder;
use super::renderer::Renderer;

/// A pool slot: the descriptor the resource was created with, and whether a
/// destroy is already queued for it.
#[derive(Debug)]
struct Entry<D> {
    descriptor: D,
    destroyed: bool,
}

impl<D> Entry<D> {
    fn new(descriptor: D) -> Self {
        Self {
            descriptor,
            destroyed: false,
        }
    }
}

type Pool<K, D> = ResourcePool<K, Entry<D>>;

#[derive(Debug, Clone, Copy)]
enum PendingRelease {
    VertexBuffer(VertexBufferHandle),
    IndexBuffer(IndexBufferHandle),
    StorageBuffer(ShaderStorageBufferHandle),
    AtomicCounterBuffer(AtomicCounterBufferHandle),
    Texture(TextureHandle),
    Program(ProgramHandle),
    Uniform(UniformHandle),
    RenderLayer(RenderLayerHandle),
    Framebuffer(FramebufferHandle),
}

fn describe<K, D>(pool: &Pool<K, D>, handle: Handle<K>) -> Option<&D> {
    pool.get(handle)
        .filter(|entry| !entry.destroyed)
        .map(|entry| &entry.descriptor)
}

fn mark_destroyed<K, D>(pool: &mut Pool<K, D>, handle: Handle<K>) {
    let name = pool.name();
    let Some(entry) = pool.get_mut(handle) else {
        panic!("destroy of unknown {handle:?} in the {name} pool");
    };
    assert!(!entry.destroyed, "double destroy of {handle:?} in the {name} pool");
    entry.destroyed = true;
}

/// Creates, updates and destroys GPU resources from the game thread.
///
/// Handles are allocated immediately and may be used by draws in the same
/// frame. The GPU work itself is queued on the command stream and happens on
/// the render thread before that frame's draws execute. A destroyed handle's
/// slot is only reissued once the render thread has processed the destroy.
pub struct RenderFrontend {
    channel: Arc<FrameChannel>,
    vertex_buffers: Pool<VertexBuffer, VertexBufferDescriptor>,
    index_buffers: Pool<IndexBuffer, IndexBufferDescriptor>,
    storage_buffers: Pool<ShaderStorageBuffer, StorageBufferDescriptor>,
    atomic_counters: Pool<AtomicCounterBuffer, StorageBufferDescriptor>,
    textures: Pool<Texture, TextureDescriptor>,
    programs: Pool<Program, ProgramDescriptor>,
    uniforms: Pool<Uniform, UniformDescriptor>,
    uniform_names: HashIndex,
    layers: Pool<RenderLayer, RenderLayerDescriptor>,
    framebuffers: Pool<Framebuffer, FramebufferDescriptor>,
    pending_release: Vec<PendingRelease>,
}

impl RenderFrontend {
    /// Creates a frontend feeding `channel`.
    pub fn new(channel: Arc<FrameChannel>) -> Self {
        Self {
            channel,
            vertex_buffers: ResourcePool::new("vertex buffer", MAX_VERTEX_BUFFERS),
            index_buffers: ResourcePool::new("index buffer", MAX_INDEX_BUFFERS),
            storage_buffers: ResourcePool::new("storage buffer", MAX_SHADER_STORAGE_BUFFERS),
            atomic_counters: ResourcePool::new("atomic counter buffer", MAX_ATOMIC_COUNTER_BUFFERS),
            textures: ResourcePool::new("texture", MAX_TEXTURES),
            programs: ResourcePool::new("program", MAX_PROGRAMS),
            uniforms: ResourcePool::new("uniform", MAX_UNIFORMS),
            uniform_names: HashIndex::with_sizes(1024, MAX_UNIFORMS),
            layers: ResourcePool::new("render layer", MAX_RENDER_LAYERS),
            framebuffers: ResourcePool::new("framebuffer", MAX_FRAMEBUFFERS),
            pending_release: Vec::new(),
        }
    }

    /// The channel shared with the render thread.
    pub fn channel(&self) -> &Arc<FrameChannel> {
        &self.channel
    }

    /// A new recorder for the current thread.
    pub fn recorder(&self) -> DrawRecorder {
        DrawRecorder::new(Arc::clone(&self.channel))
    }

    fn enqueue(&self, command: impl FnOnce(&mut Renderer) + Send + 'static) {
        self.channel.commands.push(command);
    }

    /// Creates a vertex buffer, optionally filled with `data`.
    pub fn create_vertex_buffer(
        &mut self,
        descriptor: VertexBufferDescriptor,
        data: Option<MemoryRef>,
    ) -> VertexBufferHandle {
        let handle = self.vertex_buffers.insert(Entry::new(descriptor.clone()));
        self.enqueue(move |renderer| renderer.create_vertex_buffer(handle, descriptor, data));
        handle
    }

    /// Overwrites part of a vertex buffer.
    pub fn update_vertex_buffer(&mut self, handle: VertexBufferHandle, offset: usize, data: MemoryRef) {
        self.enqueue(move |renderer| renderer.update_vertex_buffer(handle, offset, data));
    }

    /// Queues the destruction of a vertex buffer and of every vertex array using it.
    pub fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        mark_destroyed(&mut self.vertex_buffers, handle);
        self.enqueue(move |renderer| renderer.destroy_vertex_buffer(handle));
        self.pending_release.push(PendingRelease::VertexBuffer(handle));
    }

    /// The descriptor `handle` was created with.
    pub fn vertex_buffer(&self, handle: VertexBufferHandle) -> Option<&VertexBufferDescriptor> {
        describe(&self.vertex_buffers, handle)
    }

    /// Creates an index buffer, optionally filled with `data`.
    pub fn create_index_buffer(
        &mut self,
        descriptor: IndexBufferDescriptor,
        data: Option<MemoryRef>,
    ) -> IndexBufferHandle {
        let handle = self.index_buffers.insert(Entry::new(descriptor.clone()));
        self.enqueue(move |renderer| renderer.create_index_buffer(handle, descriptor, data));
        handle
    }

    /// Overwrites part of an index buffer.
    pub fn update_index_buffer(&mut self, handle: IndexBufferHandle, offset: usize, data: MemoryRef) {
        self.enqueue(move |renderer| renderer.update_index_buffer(handle, offset, data));
    }

    /// Queues the destruction of an index buffer and of every vertex array using it.
    pub fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        mark_destroyed(&mut self.index_buffers, handle);
        self.enqueue(move |renderer| renderer.destroy_index_buffer(handle));
        self.pending_release.push(PendingRelease::IndexBuffer(handle));
    }

    /// The descriptor `handle` was created with.
    pub fn index_buffer(&self, handle: IndexBufferHandle) -> Option<&IndexBufferDescriptor> {
        describe(&self.index_buffers, handle)
    }

    /// Creates a shader-storage buffer.
    pub fn create_storage_buffer(
        &mut self,
        descriptor: StorageBufferDescriptor,
        data: Option<MemoryRef>,
    ) -> ShaderStorageBufferHandle {
        let handle = self.storage_buffers.insert(Entry::new(descriptor.clone()));
        self.enqueue(move |renderer| renderer.create_storage_buffer(handle, descriptor, data));
        handle
    }

    /// Overwrites part of a shader-storage buffer.
    pub fn update_storage_buffer(
        &mut self,
        handle: ShaderStorageBufferHandle,
        offset: usize,
        data: MemoryRef,
    ) {
        self.enqueue(move |renderer| renderer.update_storage_buffer(handle, offset, data));
    }

    /// Destroys a storage buffer once the render thread reaches the command.
    pub fn destroy_storage_buffer(&mut self, handle: ShaderStorageBufferHandle) {
        mark_destroyed(&mut self.storage_buffers, handle);
        self.enqueue(move |renderer| renderer.destroy_storage_buffer(handle));
        self.pending_release.push(PendingRelease::StorageBuffer(handle));
    }

    /// The descriptor a live storage buffer was created with.
    pub fn storage_buffer(&self, handle: ShaderStorageBufferHandle) -> Option<&StorageBufferDescriptor> {
        describe(&self.storage_buffers, handle)
    }

    /// Creates an atomic-counter buffer.
    pub fn create_atomic_counter_buffer(
        &mut self,
        descriptor: StorageBufferDescriptor,
        data: Option<MemoryRef>,
    ) -> AtomicCounterBufferHandle {
        let handle = self.atomic_counters.insert(Entry::new(descriptor.clone()));
        self.enqueue(move |renderer| renderer.create_atomic_counter_buffer(handle, descriptor, data));
        handle
    }

    /// Destroys an atomic-counter buffer.
    pub fn destroy_atomic_counter_buffer(&mut self, handle: AtomicCounterBufferHandle) {
        mark_destroyed(&mut self.atomic_counters, handle);
        self.enqueue(move |renderer| renderer.destroy_atomic_counter_buffer(handle));
        self.pending_release.push(PendingRelease::AtomicCounterBuffer(handle));
    }

    /// The descriptor of a live atomic-counter buffer.
    pub fn atomic_counter_buffer(&self, handle: AtomicCounterBufferHandle) -> Option<&StorageBufferDescriptor> {
        describe(&self.atomic_counters, handle)
    }

    /// Creates a texture, optionally with base-level texels.
    pub fn create_texture(&mut self, descriptor: TextureDescriptor, data: Option<MemoryRef>) -> TextureHandle {
        let handle = self.textures.insert(Entry::new(descriptor.clone()));
        self.enqueue(move |renderer| renderer.create_texture(handle, descriptor, data));
        handle
    }

    /// Destroys a texture.
    pub fn destroy_texture(&mut self, handle: TextureHandle) {
        mark_destroyed(&mut self.textures, handle);
        self.enqueue(move |renderer| renderer.destroy_texture(handle));
        self.pending_release.push(PendingRelease::Texture(handle));
    }

    /// The descriptor a live texture was created with.
    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureDescriptor> {
        describe(&self.textures, handle)
    }

    /// Compiles and links a program on the render thread.
    ///
    /// Failures are reported through the shader error callback and the
    /// renderer event bus; draws using the handle are then skipped.
    pub fn create_program(&mut self, descriptor: ProgramDescriptor) -> ProgramHandle {
        let handle = self.programs.insert(Entry::new(descriptor.clone()));
        self.enqueue(move |renderer| renderer.create_program(handle, descriptor));
        handle
    }

    /// Destroys a program.
    pub fn destroy_program(&mut self, handle: ProgramHandle) {
        mark_destroyed(&mut self.programs, handle);
        self.enqueue(move |renderer| renderer.destroy_program(handle));
        self.pending_release.push(PendingRelease::Program(handle));
    }

    /// The descriptor of a live program.
    pub fn program(&self, handle: ProgramHandle) -> Option<&ProgramDescriptor> {
        describe(&self.programs, handle)
    }

    /// Declares a named uniform. Declaring a live name again returns the
    /// existing handle.
    pub fn create_uniform(&mut self, descriptor: UniformDescriptor) -> UniformHandle {
        let hash = uniform_name_hash(&descriptor.name);
        for index in self.uniform_names.chain(hash) {
            let handle = UniformHandle::from_index(index);
            let Some(existing) = describe(&self.uniforms, handle) else {
                continue;
            };
            if existing.name != descriptor.name {
                continue;
            }
            if existing.ty != descriptor.ty || existing.count != descriptor.count {
                log::warn!(
                    "Uniform `{}` redeclared as {:?}[{}]; keeping {:?}[{}]",
                    descriptor.name,
                    descriptor.ty,
                    descriptor.count,
                    existing.ty,
                    existing.count
                );
            }
            return handle;
        }

        let handle = self.uniforms.insert(Entry::new(descriptor.clone()));
        self.uniform_names.add(hash, handle.index());
        self.enqueue(move |renderer| renderer.create_uniform(handle, descriptor));
        handle
    }

    /// Releases a uniform handle.
    pub fn destroy_uniform(&mut self, handle: UniformHandle) {
        mark_destroyed(&mut self.uniforms, handle);
        self.enqueue(move |renderer| renderer.destroy_uniform(handle));
        self.pending_release.push(PendingRelease::Uniform(handle));
    }

    /// The name and type a uniform was declared with.
    pub fn uniform(&self, handle: UniformHandle) -> Option<&UniformDescriptor> {
        describe(&self.uniforms, handle)
    }

    /// Creates a render layer. The layer's index is the top byte of every sort
    /// key submitted to it, so layers created earlier draw first.
    pub fn create_render_layer(&mut self, descriptor: RenderLayerDescriptor) -> RenderLayerHandle {
        let handle = self.layers.insert(Entry::new(descriptor.clone()));
        self.channel
            .frame
            .set_layer_sequential(handle.index() as u8, descriptor.sequential);
        self.enqueue(move |renderer| renderer.create_render_layer(handle, descriptor));
        handle
    }

    /// Destroys a render layer.
    pub fn destroy_render_layer(&mut self, handle: RenderLayerHandle) {
        mark_destroyed(&mut self.layers, handle);
        self.enqueue(move |renderer| renderer.destroy_render_layer(handle));
        self.pending_release.push(PendingRelease::RenderLayer(handle));
    }

    /// The descriptor of a live render layer.
    pub fn render_layer(&self, handle: RenderLayerHandle) -> Option<&RenderLayerDescriptor> {
        describe(&self.layers, handle)
    }

    /// Creates a framebuffer from existing textures.
    pub fn create_framebuffer(&mut self, descriptor: FramebufferDescriptor) -> FramebufferHandle {
        let handle = self.framebuffers.insert(Entry::new(descriptor.clone()));
        self.enqueue(move |renderer| renderer.create_framebuffer(handle, descriptor));
        handle
    }

    /// Destroys a framebuffer.
    pub fn destroy_framebuffer(&mut self, handle: FramebufferHandle) {
        mark_destroyed(&mut self.framebuffers, handle);
        self.enqueue(move |renderer| renderer.destroy_framebuffer(handle));
        self.pending_release.push(PendingRelease::Framebuffer(handle));
    }

    /// The descriptor a live framebuffer was created with.
    pub fn framebuffer(&self, handle: FramebufferHandle) -> Option<&FramebufferDescriptor> {
        describe(&self.framebuffers, handle)
    }

    /// Registers the callback invoked on the render thread for every shader
    /// compile or link failure.
    pub fn set_shader_error_callback<F>(&mut self, callback: F)
    where
        F: FnMut(ProgramHandle, &ShaderError) + Send + 'static,
    {
        self.enqueue(move |renderer| renderer.set_shader_error_callback(Some(Box::new(callback))));
    }

    /// Resizes the default framebuffer used for the full-target scissor.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.enqueue(move |renderer| renderer.resize(width, height));
    }

    /// Changes the clear applied to the default framebuffer each frame.
    pub fn set_clear(&mut self, clear: ClearValues) {
        self.enqueue(move |renderer| renderer.set_clear(clear));
    }

    /// Hands the frame to the render thread and waits until it has rendered.
    pub fn end_frame(&mut self) {
        self.channel.end_frame();
        self.release_pending();
    }

    /// Like [`end_frame`](Self::end_frame), but gives up waiting once `alive`
    /// returns `false`. Returns `true` if the frame was rendered.
    pub fn end_frame_while(&mut self, alive: impl FnMut() -> bool) -> bool {
        let rendered = self.channel.end_frame_while(alive);
        if rendered {
            self.release_pending();
        }
        rendered
    }

    /// Renders the frame on the calling thread with `renderer`.
    ///
    /// Every recorder must have finished submitting, as for
    /// [`end_frame`](Self::end_frame).
    ///
    /// # Panics
    ///
    /// Panics if `renderer` was built on another channel.
    pub fn end_frame_local(&mut self, renderer: &mut Renderer) -> RenderStats {
        assert!(
            Arc::ptr_eq(renderer.channel(), &self.channel),
            "renderer consumes a different frame channel"
        );
        self.channel.submit_local();
        let stats = renderer.render_frame();
        self.channel.complete_local();
        self.release_pending();
        stats
    }

    fn release_pending(&mut self) {
        for pending in self.pending_release.drain(..) {
            match pending {
                PendingRelease::VertexBuffer(handle) => {
                    self.vertex_buffers.remove(handle);
                }
                PendingRelease::IndexBuffer(handle) => {
                    self.index_buffers.remove(handle);
                }
                PendingRelease::StorageBuffer(handle) => {
                    self.storage_buffers.remove(handle);
                }
                PendingRelease::AtomicCounterBuffer(handle) => {
                    self.atomic_counters.remove(handle);
                }
                PendingRelease::Texture(handle) => {
                    self.textures.remove(handle);
                }
                PendingRelease::Program(handle) => {
                    self.programs.remove(handle);
                }
                PendingRelease::Uniform(handle) => {
                    let entry = self.uniforms.remove(handle);
                    self.uniform_names
                        .remove(uniform_name_hash(&entry.descriptor.name), handle.index());
                }
                PendingRelease::RenderLayer(handle) => {
                    self.layers.remove(handle);
                    self.channel.frame.set_layer_sequential(handle.index() as u8, false);
                }
                PendingRelease::Framebuffer(handle) => {
                    self.framebuffers.remove(handle);
                }
            }
        }
    }
}

impl std::fmt::Debug for RenderFrontend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderFrontend")
            .field("vertex_buffers", &self.vertex_buffers.len())
            .field("index_buffers", &self.index_buffers.len())
            .field("textures", &self.textures.len())
            .field("programs", &self.programs.len())
            .field("uniforms", &self.uniforms.len())
            .field("layers", &self.layers.len())
            .field("pending_release", &self.pending_release.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::config::RenderConfig;
    use ember_core::renderer::UniformType;
    use std::borrow::Cow;

    fn frontend() -> RenderFrontend {
        let config = RenderConfig {
            max_draws_per_frame: 16,
            uniform_arena_bytes: 1024,
            command_stream_bytes: 4096,
            ..RenderConfig::default()
        };
        RenderFrontend::new(Arc::new(FrameChannel::new(&config)))
    }

    fn uniform(name: &'static str, ty: UniformType) -> UniformDescriptor {
        UniformDescriptor {
            name: Cow::Borrowed(name),
            ty,
            count: 1,
        }
    }

    #[test]
    fn creation_queues_a_command_and_returns_a_usable_handle() {
        let mut frontend = frontend();
        let descriptor = TextureDescriptor::new_2d(4, 4, ember_core::renderer::TextureFormat::Rgba8);

        let handle = frontend.create_texture(descriptor.clone(), None);

        assert!(handle.is_valid());
        assert_eq!(frontend.texture(handle), Some(&descriptor));
        assert!(frontend.channel().commands.pending_bytes() > 0);
    }

    #[test]
    fn uniforms_are_deduplicated_by_name() {
        let mut frontend = frontend();
        let a = frontend.create_uniform(uniform("u_color", UniformType::Vec4));
        let b = frontend.create_uniform(uniform("u_color", UniformType::Vec4));
        let c = frontend.create_uniform(uniform("u_mvp", UniformType::Mat4));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn destroyed_handles_are_hidden_but_not_reissued_before_the_frame_ends() {
        let mut frontend = frontend();
        let first = frontend.create_program(ProgramDescriptor {
            label: None,
            source: ember_core::renderer::ProgramSource::Compute {
                compute: Cow::Borrowed("void main() {}"),
            },
        });
        frontend.destroy_program(first);
        assert!(frontend.program(first).is_none());

        let second = frontend.create_program(ProgramDescriptor {
            label: None,
            source: ember_core::renderer::ProgramSource::Compute {
                compute: Cow::Borrowed("void main() {}"),
            },
        });
        assert_ne!(first, second);
    }

    #[test]
    #[should_panic(expected = "double destroy")]
    fn double_destroy_panics() {
        let mut frontend = frontend();
        let layer = frontend.create_render_layer(RenderLayerDescriptor::default());
        frontend.destroy_render_layer(layer);
        frontend.destroy_render_layer(layer);
    }
}
