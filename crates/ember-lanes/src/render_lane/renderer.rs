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

//! The render-thread side: resource realisation and frame execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ember_core::config::RenderConfig;
use ember_core::event::RenderEvent;
use ember_core::event::EventBus;
use ember_core::renderer::{
    uniform_name_hash, AtomicCounterBufferHandle, BufferKind, ClearValues, FramebufferDescriptor, FramebufferHandle,
    GraphicsBackend, IndexBufferDescriptor, IndexBufferHandle, ProgramDescriptor, ProgramHandle,
    RenderLayerDescriptor, RenderLayerHandle, RenderStats, ResourceError, ShaderError,
    ShaderStorageBufferHandle, StorageBufferDescriptor, TextureDescriptor, TextureHandle,
    UniformDescriptor, UniformHandle, VertexBufferDescriptor, VertexBufferHandle,
};
use ember_core::Stopwatch;

use super::executor::FrameExecutor;
use super::frame::FrameChannel;
use super::memory::MemoryRef;
use super::resources::{
    FramebufferRecord, IndexBufferRecord, LayerRecord, ProgramRecord, RenderResources,
    StorageBufferRecord, TextureRecord, UniformRecord, VertexBufferRecord,
};

/// Called on the render thread when a program fails to compile or link.
pub type ShaderErrorCallback = Box<dyn FnMut(ProgramHandle, &ShaderError) + Send>;

/// Owns the graphics backend and everything realised on it.
///
/// A renderer lives on the render thread. It consumes the command stream the
/// [`RenderFrontend`](super::RenderFrontend) fills, then executes the frame's
/// sorted draws and dispatches.
pub struct Renderer {
    backend: Box<dyn GraphicsBackend>,
    resources: RenderResources,
    executor: FrameExecutor,
    channel: Arc<FrameChannel>,
    frame_refs: Vec<MemoryRef>,
    events: EventBus<RenderEvent>,
    on_shader_error: Option<ShaderErrorCallback>,
}

impl Renderer {
    /// Creates a renderer drawing with `backend`.
    pub fn new(
        backend: Box<dyn GraphicsBackend>,
        channel: Arc<FrameChannel>,
        config: &RenderConfig,
        events: EventBus<RenderEvent>,
    ) -> Self {
        log::info!(
            "Renderer initialised on the '{}' backend ({}x{})",
            backend.name(),
            config.framebuffer_size.0,
            config.framebuffer_size.1
        );
        Self {
            backend,
            resources: RenderResources::new(),
            executor: FrameExecutor::new(config.framebuffer_size, config.clear_values()),
            channel,
            frame_refs: Vec::new(),
            events,
            on_shader_error: None,
        }
    }

    /// The backend's name.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Frames rendered so far.
    pub fn frame_number(&self) -> u64 {
        self.executor.frame_number()
    }

    pub(crate) fn channel(&self) -> &Arc<FrameChannel> {
        &self.channel
    }

    /// The bus carrying shader failures and per-frame statistics.
    pub fn events(&self) -> &EventBus<RenderEvent> {
        &self.events
    }

    /// Render loop: renders every frame the game side hands over until
    /// `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) {
        log::info!("Render loop started");
        while self.channel.wait_for_frame(|| running.load(Ordering::Acquire)) {
            self.render_frame();
            self.channel.frame_done();
        }
        log::info!("Render loop stopped after {} frames", self.frame_number());
    }

    /// Executes the pending commands and the frame, then releases the frame's
    /// memory refs.
    pub(crate) fn render_frame(&mut self) -> RenderStats {
        let stopwatch = Stopwatch::new();
        let channel = Arc::clone(&self.channel);
        let mut stats = RenderStats::default();

        // SAFETY: called between the game side's hand-over and `frame_done`,
        // so no producer touches the read half or the frame buffers.
        unsafe {
            stats.commands_executed = channel.commands.execute(self) as u32;
            self.executor
                .execute(&mut *self.backend, &self.resources, &channel.frame, &mut stats);
        }
        channel.frame.reset();
        self.frame_refs.clear();
        self.backend.end_frame();

        stats.cpu_time_ms = stopwatch.elapsed_ms_f32();
        log::trace!(
            "Frame {} rendered: {} draws, {} dispatches",
            stats.frame_number,
            stats.draw_calls,
            stats.dispatches
        );
        self.events.publish(RenderEvent::FrameRendered(stats));
        stats
    }

    fn resource_failed(&self, kind: &'static str, index: u32, error: ResourceError) {
        log::error!("Failed to create {kind} #{index}: {error}");
        self.events.publish(RenderEvent::ResourceFailed { kind, index, error });
    }

    /// Keeps `data` alive until the current frame has rendered.
    fn retain(&mut self, data: Option<MemoryRef>) {
        if let Some(data) = data {
            self.frame_refs.push(data);
        }
    }

    pub(crate) fn set_shader_error_callback(&mut self, callback: Option<ShaderErrorCallback>) {
        self.on_shader_error = callback;
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        log::debug!("Default framebuffer resized to {width}x{height}");
        self.executor.set_framebuffer_size(width, height);
    }

    pub(crate) fn set_clear(&mut self, clear: ClearValues) {
        self.executor.set_clear(clear);
    }

    pub(crate) fn create_vertex_buffer(
        &mut self,
        handle: VertexBufferHandle,
        descriptor: VertexBufferDescriptor,
        data: Option<MemoryRef>,
    ) {
        let bytes = data.as_ref().map(MemoryRef::as_slice);
        match self
            .backend
            .create_buffer(BufferKind::Vertex, descriptor.size, descriptor.usage, bytes)
        {
            Ok(gpu) => {
                log::debug!("Created vertex buffer {handle:?} ({} bytes)", descriptor.size);
                let record = VertexBufferRecord {
                    gpu,
                    layout: descriptor.layout,
                    size: descriptor.size,
                    vertex_count: descriptor.vertex_count(),
                };
                self.resources.vertex_buffers.insert(handle, record);
            }
            Err(error) => self.resource_failed("vertex buffer", handle.index(), error),
        }
        self.retain(data);
    }

    pub(crate) fn create_index_buffer(
        &mut self,
        handle: IndexBufferHandle,
        descriptor: IndexBufferDescriptor,
        data: Option<MemoryRef>,
    ) {
        let bytes = data.as_ref().map(MemoryRef::as_slice);
        match self
            .backend
            .create_buffer(BufferKind::Index, descriptor.size, descriptor.usage, bytes)
        {
            Ok(gpu) => {
                log::debug!("Created index buffer {handle:?} ({} bytes)", descriptor.size);
                let record = IndexBufferRecord {
                    gpu,
                    format: descriptor.format,
                    size: descriptor.size,
                    index_count: descriptor.index_count(),
                };
                self.resources.index_buffers.insert(handle, record);
            }
            Err(error) => self.resource_failed("index buffer", handle.index(), error),
        }
        self.retain(data);
    }

    pub(crate) fn create_storage_buffer(
        &mut self,
        handle: ShaderStorageBufferHandle,
        descriptor: StorageBufferDescriptor,
        data: Option<MemoryRef>,
    ) {
        let bytes = data.as_ref().map(MemoryRef::as_slice);
        match self.backend.create_buffer(
            BufferKind::ShaderStorage,
            descriptor.size,
            descriptor.usage,
            bytes,
        ) {
            Ok(gpu) => {
                let record = StorageBufferRecord {
                    gpu,
                    size: descriptor.size,
                };
                self.resources.storage_buffers.insert(handle, record);
            }
            Err(error) => self.resource_failed("storage buffer", handle.index(), error),
        }
        self.retain(data);
    }

    pub(crate) fn create_atomic_counter_buffer(
        &mut self,
        handle: AtomicCounterBufferHandle,
        descriptor: StorageBufferDescriptor,
        data: Option<MemoryRef>,
    ) {
        let bytes = data.as_ref().map(MemoryRef::as_slice);
        match self.backend.create_buffer(
            BufferKind::AtomicCounter,
            descriptor.size,
            descriptor.usage,
            bytes,
        ) {
            Ok(gpu) => {
                let record = StorageBufferRecord {
                    gpu,
                    size: descriptor.size,
                };
                self.resources.atomic_counters.insert(handle, record);
            }
            Err(error) => self.resource_failed("atomic counter buffer", handle.index(), error),
        }
        self.retain(data);
    }

    pub(crate) fn update_vertex_buffer(&mut self, handle: VertexBufferHandle, offset: usize, data: MemoryRef) {
        match self.resources.vertex_buffers.get(handle) {
            Some(record) if offset + data.len() <= record.size => {
                self.backend
                    .update_buffer(record.gpu, BufferKind::Vertex, offset, data.as_slice());
            }
            Some(record) => self.out_of_bounds("vertex buffer", handle.index(), offset, data.len(), record.size),
            None => log::warn!("Update of missing {handle:?} ignored"),
        }
        self.retain(Some(data));
    }

    pub(crate) fn update_index_buffer(&mut self, handle: IndexBufferHandle, offset: usize, data: MemoryRef) {
        match self.resources.index_buffers.get(handle) {
            Some(record) if offset + data.len() <= record.size => {
                self.backend
                    .update_buffer(record.gpu, BufferKind::Index, offset, data.as_slice());
            }
            Some(record) => self.out_of_bounds("index buffer", handle.index(), offset, data.len(), record.size),
            None => log::warn!("Update of missing {handle:?} ignored"),
        }
        self.retain(Some(data));
    }

    pub(crate) fn update_storage_buffer(
        &mut self,
        handle: ShaderStorageBufferHandle,
        offset: usize,
        data: MemoryRef,
    ) {
        match self.resources.storage_buffers.get(handle) {
            Some(record) if offset + data.len() <= record.size => {
                self.backend
                    .update_buffer(record.gpu, BufferKind::ShaderStorage, offset, data.as_slice());
            }
            Some(record) => self.out_of_bounds("storage buffer", handle.index(), offset, data.len(), record.size),
            None => log::warn!("Update of missing {handle:?} ignored"),
        }
        self.retain(Some(data));
    }

    fn out_of_bounds(&self, kind: &'static str, index: u32, offset: usize, len: usize, size: usize) {
        let error = ResourceError::OutOfBounds {
            offset,
            len,
            size,
        };
        log::warn!("Update of {kind} #{index} rejected: {error}");
        self.events.publish(RenderEvent::ResourceFailed { kind, index, error });
    }

    pub(crate) fn create_texture(
        &mut self,
        handle: TextureHandle,
        descriptor: TextureDescriptor,
        data: Option<MemoryRef>,
    ) {
        let bytes = data.as_ref().map(MemoryRef::as_slice);
        match self.backend.create_texture(&descriptor, bytes) {
            Ok(gpu) => {
                log::debug!(
                    "Created texture {handle:?} ({}x{} {:?})",
                    descriptor.width,
                    descriptor.height,
                    descriptor.format
                );
                self.resources
                    .textures
                    .insert(handle, TextureRecord { gpu, descriptor });
            }
            Err(error) => self.resource_failed("texture", handle.index(), error),
        }
        self.retain(data);
    }

    pub(crate) fn create_program(&mut self, handle: ProgramHandle, descriptor: ProgramDescriptor) {
        let compute = descriptor.source.is_compute();
        let record = match self.backend.create_program(&descriptor) {
            Ok(gpu) => {
                let active = self.backend.active_uniforms(gpu);
                log::debug!(
                    "Linked program {handle:?} ({}) with {} active uniforms",
                    descriptor.label.as_deref().unwrap_or("unnamed"),
                    active.len()
                );
                ProgramRecord::linked(gpu, compute, active)
            }
            Err(error) => {
                log::error!(
                    "Program {handle:?} ({}) failed: {error}",
                    descriptor.label.as_deref().unwrap_or("unnamed")
                );
                if let Some(callback) = self.on_shader_error.as_mut() {
                    callback(handle, &error);
                }
                self.events.publish(RenderEvent::ShaderFailed {
                    program: handle,
                    error,
                });
                ProgramRecord::failed(compute)
            }
        };
        self.resources.programs.insert(handle, record);
    }

    pub(crate) fn create_uniform(&mut self, handle: UniformHandle, descriptor: UniformDescriptor) {
        let record = UniformRecord {
            hash: uniform_name_hash(&descriptor.name),
            name: descriptor.name.into_owned(),
            ty: descriptor.ty,
            count: descriptor.count,
        };
        self.resources.uniforms.insert(handle, record);
    }

    pub(crate) fn create_render_layer(&mut self, handle: RenderLayerHandle, descriptor: RenderLayerDescriptor) {
        log::debug!("Created render layer {handle:?} ({})", descriptor.name);
        self.resources.layers.insert(handle, LayerRecord { descriptor });
    }

    pub(crate) fn create_framebuffer(&mut self, handle: FramebufferHandle, descriptor: FramebufferDescriptor) {
        let resolve = |texture: TextureHandle| self.resources.textures.get(texture).map(|record| record.gpu);
        let color: Option<Vec<_>> = descriptor.color.iter().map(|&texture| resolve(texture)).collect();
        let depth = match descriptor.depth {
            None => Some(None),
            Some(texture) => resolve(texture).map(Some),
        };
        let (Some(color), Some(depth)) = (color, depth) else {
            self.resource_failed("framebuffer", handle.index(), ResourceError::InvalidHandle);
            return;
        };
        match self.backend.create_framebuffer(&color, depth) {
            Ok(gpu) => self.resources.framebuffers.insert(handle, FramebufferRecord { gpu }),
            Err(error) => self.resource_failed("framebuffer", handle.index(), error),
        }
    }

    pub(crate) fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        let evicted = self
            .executor
            .vertex_arrays()
            .evict_vertex_buffer(&mut *self.backend, handle);
        if let Some(record) = self.resources.vertex_buffers.remove(handle) {
            self.backend.destroy_buffer(record.gpu);
            log::debug!("Destroyed vertex buffer {handle:?} ({evicted} vertex arrays evicted)");
        }
    }

    pub(crate) fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        let evicted = self
            .executor
            .vertex_arrays()
            .evict_index_buffer(&mut *self.backend, handle);
        if let Some(record) = self.resources.index_buffers.remove(handle) {
            self.backend.destroy_buffer(record.gpu);
            log::debug!("Destroyed index buffer {handle:?} ({evicted} vertex arrays evicted)");
        }
    }

    pub(crate) fn destroy_storage_buffer(&mut self, handle: ShaderStorageBufferHandle) {
        if let Some(record) = self.resources.storage_buffers.remove(handle) {
            self.backend.destroy_buffer(record.gpu);
        }
    }

    pub(crate) fn destroy_atomic_counter_buffer(&mut self, handle: AtomicCounterBufferHandle) {
        if let Some(record) = self.resources.atomic_counters.remove(handle) {
            self.backend.destroy_buffer(record.gpu);
        }
    }

    pub(crate) fn destroy_texture(&mut self, handle: TextureHandle) {
        if let Some(record) = self.resources.textures.remove(handle) {
            self.backend.destroy_texture(record.gpu);
        }
    }

    pub(crate) fn destroy_program(&mut self, handle: ProgramHandle) {
        if let Some(gpu) = self.resources.programs.remove(handle).and_then(|record| record.gpu) {
            self.backend.destroy_program(gpu);
        }
    }

    pub(crate) fn destroy_uniform(&mut self, handle: UniformHandle) {
        self.resources.uniforms.remove(handle);
    }

    pub(crate) fn destroy_render_layer(&mut self, handle: RenderLayerHandle) {
        self.resources.layers.remove(handle);
    }

    pub(crate) fn destroy_framebuffer(&mut self, handle: FramebufferHandle) {
        if let Some(record) = self.resources.framebuffers.remove(handle) {
            self.backend.destroy_framebuffer(record.gpu);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let backend = &mut *self.backend;
        self.executor.vertex_arrays().clear(backend);
        let resources = &mut self.resources;
        for record in resources.framebuffers.drain() {
            backend.destroy_framebuffer(record.gpu);
        }
        for record in resources.programs.drain() {
            if let Some(gpu) = record.gpu {
                backend.destroy_program(gpu);
            }
        }
        for record in resources.textures.drain() {
            backend.destroy_texture(record.gpu);
        }
        let buffers = resources
            .vertex_buffers
            .drain()
            .map(|record| record.gpu)
            .chain(resources.index_buffers.drain().map(|record| record.gpu))
            .chain(resources.storage_buffers.drain().map(|record| record.gpu))
            .chain(resources.atomic_counters.drain().map(|record| record.gpu))
            .collect::<Vec<_>>();
        for gpu in buffers {
            backend.destroy_buffer(gpu);
        }
        self.frame_refs.clear();
        log::info!("Renderer on '{}' shut down", backend.name());
    }
}
