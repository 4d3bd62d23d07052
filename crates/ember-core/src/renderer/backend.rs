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

//! The graphics backend contract consumed by the frame executor.

use super::descriptors::{
    BufferKind, BufferUsage, ClearValues, IndexFormat, ProgramDescriptor, ScissorRect,
    TextureDescriptor,
};
use super::error::{ResourceError, ShaderError};
use super::state::{BlendEquation, BlendFactor, CullMode, DepthTest, PrimitiveTopology, WriteMask};
use super::uniform::UniformType;
use super::vertex::VertexLayout;
use std::ops::{BitOr, BitOrAssign};

macro_rules! gpu_ids {
    ($($(#[$doc:meta])* $name:ident;)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u32);
        )*
    };
}

gpu_ids! {
    /// A backend buffer object.
    GpuBuffer;
    /// A backend texture object.
    GpuTexture;
    /// A linked backend program.
    GpuProgram;
    /// A backend framebuffer object.
    GpuFramebuffer;
    /// A backend vertex-array object binding a vertex buffer layout and an index buffer.
    GpuVertexArray;
}

/// A uniform reported active by a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// The declared name, without any `[0]` array suffix.
    pub name: String,
    /// Backend location.
    pub location: i32,
    /// Declared type.
    pub ty: UniformType,
    /// Array length.
    pub count: u8,
}

/// Which kinds of shader writes a memory barrier makes visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryBarrier(u32);

impl MemoryBarrier {
    /// Shader-storage writes.
    pub const SHADER_STORAGE: Self = Self(1 << 0);
    /// Atomic-counter writes.
    pub const ATOMIC_COUNTER: Self = Self(1 << 1);
    /// Image writes.
    pub const SHADER_IMAGE_ACCESS: Self = Self(1 << 2);
    /// Vertex attribute fetches from written buffers.
    pub const VERTEX_ATTRIB_ARRAY: Self = Self(1 << 3);
    /// Every barrier bit.
    pub const ALL: Self = Self(0xF);

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MemoryBarrier {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MemoryBarrier {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A graphics API driver.
///
/// Every method is called from the render thread only. The executor tracks bound
/// state itself and calls a setter only when the value changes, so
/// implementations forward calls without caching.
pub trait GraphicsBackend {
    /// A human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Creates a GPU buffer.
    /// ## Arguments
    /// * `kind` - The binding role of the buffer.
    /// * `size` - Size in bytes.
    /// * `usage` - Expected update frequency.
    /// * `data` - Optional initial contents, at most `size` bytes.
    /// ## Errors
    /// * `ResourceError` - If the backend cannot allocate the buffer.
    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: usize,
        usage: BufferUsage,
        data: Option<&[u8]>,
    ) -> Result<GpuBuffer, ResourceError>;

    /// Overwrites `data.len()` bytes of `buffer` starting at `offset`.
    fn update_buffer(&mut self, buffer: GpuBuffer, kind: BufferKind, offset: usize, data: &[u8]);

    /// Releases a buffer.
    fn destroy_buffer(&mut self, buffer: GpuBuffer);

    /// Creates a 2D texture.
    /// ## Arguments
    /// * `descriptor` - Size, format and sampling of the texture.
    /// * `data` - Optional base-level texels.
    /// ## Errors
    /// * `ResourceError` - If the texture cannot be created.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<GpuTexture, ResourceError>;

    /// Releases a texture.
    fn destroy_texture(&mut self, texture: GpuTexture);

    /// Compiles and links a program.
    /// ## Errors
    /// * `ShaderError` - Carrying the backend's compile or link log.
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<GpuProgram, ShaderError>;

    /// Lists the active uniforms of a linked program.
    fn active_uniforms(&mut self, program: GpuProgram) -> Vec<ActiveUniform>;

    /// Releases a program.
    fn destroy_program(&mut self, program: GpuProgram);

    /// Creates a framebuffer from existing textures.
    /// ## Errors
    /// * `ResourceError` - If the attachment combination is incomplete.
    fn create_framebuffer(
        &mut self,
        color: &[GpuTexture],
        depth: Option<GpuTexture>,
    ) -> Result<GpuFramebuffer, ResourceError>;

    /// Releases a framebuffer. Attached textures are untouched.
    fn destroy_framebuffer(&mut self, framebuffer: GpuFramebuffer);

    /// Creates a vertex array describing `layout` over `vertex_buffer`, plus the
    /// optional index buffer.
    fn create_vertex_array(
        &mut self,
        vertex_buffer: GpuBuffer,
        layout: &VertexLayout,
        vertex_count: usize,
        index_buffer: Option<GpuBuffer>,
    ) -> Result<GpuVertexArray, ResourceError>;

    /// Releases a vertex array.
    fn destroy_vertex_array(&mut self, vertex_array: GpuVertexArray);

    /// Binds a render target; `None` binds the default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebuffer>);

    /// Clears the bound target.
    fn clear(&mut self, values: ClearValues);

    /// Binds a program; `None` unbinds.
    fn bind_program(&mut self, program: Option<GpuProgram>);

    /// Uploads `count` elements of `ty` to `location` of the bound program.
    fn set_uniform(&mut self, location: i32, ty: UniformType, count: u8, data: &[u8]);

    /// Binds a texture to a unit.
    fn bind_texture(&mut self, unit: u32, texture: Option<GpuTexture>);

    /// Binds a shader-storage buffer to an indexed binding point.
    fn bind_storage_buffer(&mut self, binding: u32, buffer: Option<GpuBuffer>);

    /// Binds an atomic-counter buffer to an indexed binding point.
    fn bind_atomic_counter_buffer(&mut self, binding: u32, buffer: Option<GpuBuffer>);

    /// Sets which attachments are written.
    fn set_write_mask(&mut self, mask: WriteMask);

    /// Sets the depth comparison.
    fn set_depth_test(&mut self, test: DepthTest);

    /// Sets the blend function; `None` disables blending.
    fn set_blend(&mut self, factors: Option<(BlendFactor, BlendFactor)>);

    /// Sets the blend equation.
    fn set_blend_equation(&mut self, equation: BlendEquation);

    /// Sets face culling.
    fn set_cull_mode(&mut self, mode: CullMode);

    /// Sets the scissor rectangle.
    fn set_scissor(&mut self, rect: ScissorRect);

    /// Binds a vertex array; `None` unbinds.
    fn bind_vertex_array(&mut self, vertex_array: Option<GpuVertexArray>);

    /// Issues an indexed draw from the bound vertex array.
    fn draw_indexed(
        &mut self,
        primitive: PrimitiveTopology,
        format: IndexFormat,
        count: u32,
        byte_offset: usize,
        base_vertex: i32,
    );

    /// Issues a non-indexed draw from the bound vertex array.
    fn draw(&mut self, primitive: PrimitiveTopology, first: u32, count: u32);

    /// Dispatches the bound compute program.
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);

    /// Makes prior shader writes visible to later commands.
    fn memory_barrier(&mut self, barrier: MemoryBarrier);

    /// Called once after each rendered frame.
    fn end_frame(&mut self) {}
}
