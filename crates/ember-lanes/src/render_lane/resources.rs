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

//! Render-thread records of GPU resources, indexed by the handles the game
//! side issued.

use std::marker::PhantomData;

use ember_core::renderer::limits::{
    MAX_ATOMIC_COUNTER_BUFFERS, MAX_FRAMEBUFFERS, MAX_INDEX_BUFFERS, MAX_PROGRAMS,
    MAX_RENDER_LAYERS, MAX_SHADER_STORAGE_BUFFERS, MAX_TEXTURES, MAX_UNIFORMS, MAX_VERTEX_BUFFERS,
};
use ember_core::renderer::{
    ActiveUniform, AtomicCounterBuffer, Framebuffer, FramebufferHandle, GpuBuffer, GpuFramebuffer,
    GpuProgram, GpuTexture, Handle, IndexBuffer, IndexFormat, Program, RenderLayer,
    RenderLayerDescriptor, ShaderStorageBuffer, Texture, TextureDescriptor, Uniform, UniformType,
    VertexBuffer, VertexLayout,
};
use ember_data::hash_index::{HashIndex, INVALID_INDEX};

/// A dense table of render-side records addressed by game-issued handles.
pub(crate) struct ResourceTable<K, R> {
    name: &'static str,
    slots: Vec<Option<R>>,
    capacity: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K, R> ResourceTable<K, R> {
    pub(crate) fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            slots: Vec::new(),
            capacity,
            _kind: PhantomData,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn insert(&mut self, handle: Handle<K>, record: R) {
        let index = handle.index() as usize;
        assert!(
            index < self.capacity,
            "{} handle #{index} exceeds the table capacity {}",
            self.name,
            self.capacity
        );
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        assert!(
            self.slots[index].is_none(),
            "{} #{index} created twice without a destroy",
            self.name
        );
        self.slots[index] = Some(record);
    }

    pub(crate) fn remove(&mut self, handle: Handle<K>) -> Option<R> {
        self.slots.get_mut(handle.index() as usize)?.take()
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle<K>) -> Option<&R> {
        self.slots.get(handle.index() as usize)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut R> {
        self.slots.get_mut(handle.index() as usize)?.as_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = R> + '_ {
        self.slots.drain(..).flatten()
    }
}

/// A vertex buffer on the GPU.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VertexBufferRecord {
    pub gpu: GpuBuffer,
    pub layout: VertexLayout,
    pub size: usize,
    pub vertex_count: usize,
}

/// An index buffer on the GPU.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexBufferRecord {
    pub gpu: GpuBuffer,
    pub format: IndexFormat,
    pub size: usize,
    pub index_count: usize,
}

/// A shader-storage or atomic-counter buffer on the GPU.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StorageBufferRecord {
    pub gpu: GpuBuffer,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct TextureRecord {
    pub gpu: GpuTexture,
    pub descriptor: TextureDescriptor,
}

/// A linked program and its name-hash → active-uniform table.
#[derive(Debug)]
pub(crate) struct ProgramRecord {
    /// `None` when compilation or linking failed.
    pub gpu: Option<GpuProgram>,
    pub compute: bool,
    uniforms: Vec<(u32, ActiveUniform)>,
    lookup: HashIndex,
}

impl ProgramRecord {
    pub(crate) fn linked(gpu: GpuProgram, compute: bool, active: Vec<ActiveUniform>) -> Self {
        let mut lookup = HashIndex::with_sizes(
            active.len().next_power_of_two().max(16),
            active.len(),
        );
        let uniforms: Vec<_> = active
            .into_iter()
            .map(|uniform| (ember_core::renderer::uniform_name_hash(&uniform.name), uniform))
            .collect();
        for (slot, (hash, _)) in uniforms.iter().enumerate() {
            lookup.add(*hash, slot as u32);
        }
        Self {
            gpu: Some(gpu),
            compute,
            uniforms,
            lookup,
        }
    }

    pub(crate) fn failed(compute: bool) -> Self {
        Self {
            gpu: None,
            compute,
            uniforms: Vec::new(),
            lookup: HashIndex::new(),
        }
    }

    /// Resolves a uniform by name hash and name.
    pub(crate) fn uniform(&self, hash: u32, name: &str) -> Option<&ActiveUniform> {
        let mut slot = self.lookup.first(hash);
        while slot != INVALID_INDEX {
            let (candidate_hash, uniform) = &self.uniforms[slot as usize];
            if *candidate_hash == hash && uniform.name == name {
                return Some(uniform);
            }
            slot = self.lookup.next(slot);
        }
        None
    }

    pub(crate) fn active_uniforms(&self) -> impl Iterator<Item = &ActiveUniform> {
        self.uniforms.iter().map(|(_, uniform)| uniform)
    }
}

/// A named uniform as declared by the game side.
#[derive(Debug, Clone)]
pub(crate) struct UniformRecord {
    pub name: String,
    pub hash: u32,
    pub ty: UniformType,
    pub count: u8,
}

#[derive(Debug, Clone)]
pub(crate) struct LayerRecord {
    pub descriptor: RenderLayerDescriptor,
}

impl LayerRecord {
    pub(crate) fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.descriptor.framebuffer
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FramebufferRecord {
    pub gpu: GpuFramebuffer,
}

/// Every render-side table, one per resource kind.
pub(crate) struct RenderResources {
    pub vertex_buffers: ResourceTable<VertexBuffer, VertexBufferRecord>,
    pub index_buffers: ResourceTable<IndexBuffer, IndexBufferRecord>,
    pub storage_buffers: ResourceTable<ShaderStorageBuffer, StorageBufferRecord>,
    pub atomic_counters: ResourceTable<AtomicCounterBuffer, StorageBufferRecord>,
    pub textures: ResourceTable<Texture, TextureRecord>,
    pub programs: ResourceTable<Program, ProgramRecord>,
    pub uniforms: ResourceTable<Uniform, UniformRecord>,
    pub layers: ResourceTable<RenderLayer, LayerRecord>,
    pub framebuffers: ResourceTable<Framebuffer, FramebufferRecord>,
}

impl RenderResources {
    pub(crate) fn new() -> Self {
        Self {
            vertex_buffers: ResourceTable::new("vertex buffer", MAX_VERTEX_BUFFERS),
            index_buffers: ResourceTable::new("index buffer", MAX_INDEX_BUFFERS),
            storage_buffers: ResourceTable::new("storage buffer", MAX_SHADER_STORAGE_BUFFERS),
            atomic_counters: ResourceTable::new("atomic counter buffer", MAX_ATOMIC_COUNTER_BUFFERS),
            textures: ResourceTable::new("texture", MAX_TEXTURES),
            programs: ResourceTable::new("program", MAX_PROGRAMS),
            uniforms: ResourceTable::new("uniform", MAX_UNIFORMS),
            layers: ResourceTable::new("render layer", MAX_RENDER_LAYERS),
            framebuffers: ResourceTable::new("framebuffer", MAX_FRAMEBUFFERS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::renderer::TextureHandle;

    #[test]
    fn table_tracks_game_issued_indices() {
        let mut table: ResourceTable<Texture, u32> = ResourceTable::new("textures", 8);
        table.insert(TextureHandle::from_index(5), 50);
        assert_eq!(table.get(TextureHandle::from_index(5)), Some(&50));
        assert_eq!(table.get(TextureHandle::from_index(4)), None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.remove(TextureHandle::from_index(5)), Some(50));
        assert_eq!(table.remove(TextureHandle::from_index(5)), None);
    }

    #[test]
    #[should_panic(expected = "created twice")]
    fn table_rejects_double_create() {
        let mut table: ResourceTable<Texture, u32> = ResourceTable::new("textures", 8);
        table.insert(TextureHandle::from_index(1), 1);
        table.insert(TextureHandle::from_index(1), 2);
    }

    #[test]
    fn program_resolves_uniforms_by_name() {
        let active = vec![
            ActiveUniform {
                name: "u_color".into(),
                location: 4,
                ty: UniformType::Vec4,
                count: 1,
            },
            ActiveUniform {
                name: "u_mvp".into(),
                location: 0,
                ty: UniformType::Mat4,
                count: 1,
            },
        ];
        let program = ProgramRecord::linked(GpuProgram(1), false, active);
        let hash = ember_core::renderer::uniform_name_hash("u_mvp");

        assert_eq!(program.uniform(hash, "u_mvp").map(|u| u.location), Some(0));
        assert!(program.uniform(hash, "u_missing").is_none());
        assert_eq!(program.active_uniforms().count(), 2);
    }
}
