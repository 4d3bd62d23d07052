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

//! Descriptors used to create renderer resources.
//!
//! A descriptor is kept by the resource registry for the lifetime of the
//! resource, so the attributes a resource was created with can be queried back.

use super::handle::{FramebufferHandle, TextureHandle};
use super::uniform::UniformType;
use super::vertex::VertexLayout;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// How often the contents of a buffer are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times.
    #[default]
    Static,
    /// Updated occasionally through the update commands.
    Dynamic,
    /// Rewritten every frame.
    Stream,
}

/// The role of a GPU buffer, which decides the binding target the backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attribute data.
    Vertex,
    /// Index data.
    Index,
    /// Shader-storage data.
    ShaderStorage,
    /// Atomic counters.
    AtomicCounter,
}

/// Element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit indices.
    #[default]
    U16,
    /// 32-bit indices.
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// A descriptor for a vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Size of the buffer in bytes.
    pub size: usize,
    /// Layout of the vertices stored in the buffer.
    pub layout: VertexLayout,
    /// Update frequency.
    pub usage: BufferUsage,
}

impl VertexBufferDescriptor {
    /// Number of whole vertices the buffer holds under its layout.
    pub fn vertex_count(&self) -> usize {
        self.layout.vertex_count(self.size)
    }
}

/// A descriptor for an index buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBufferDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Size of the buffer in bytes.
    pub size: usize,
    /// Element type.
    pub format: IndexFormat,
    /// Update frequency.
    pub usage: BufferUsage,
}

impl IndexBufferDescriptor {
    /// Number of indices the buffer holds.
    pub fn index_count(&self) -> usize {
        self.size / self.format.size()
    }
}

/// A descriptor for a shader-storage or atomic-counter buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageBufferDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Size of the buffer in bytes.
    pub size: usize,
    /// Update frequency.
    pub usage: BufferUsage,
}

/// Texel format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// One 8-bit normalized channel.
    R8,
    /// Four 8-bit normalized channels.
    #[default]
    Rgba8,
    /// Four 16-bit float channels.
    Rgba16F,
    /// Four 32-bit float channels.
    Rgba32F,
    /// One 32-bit float channel.
    R32F,
    /// One 32-bit unsigned integer channel.
    R32U,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
    /// 32-bit float depth.
    Depth32F,
}

impl TextureFormat {
    /// Bytes per texel.
    pub const fn texel_size(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::Rgba8 | Self::R32F | Self::R32U | Self::Depth24Stencil8 | Self::Depth32F => 4,
            Self::Rgba16F => 8,
            Self::Rgba32F => 16,
        }
    }

    /// Returns `true` for depth formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth24Stencil8 | Self::Depth32F)
    }
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Linear,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Coordinates repeat.
    #[default]
    Repeat,
    /// Coordinates clamp to the edge texel.
    ClampToEdge,
    /// Coordinates repeat, mirrored.
    MirroredRepeat,
}

/// A descriptor for a 2D texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Minification and magnification filter.
    pub filter: FilterMode,
    /// Wrapping on both axes.
    pub wrap: WrapMode,
    /// Whether a full mip chain is generated after upload.
    pub mipmaps: bool,
}

impl TextureDescriptor {
    /// A descriptor with default sampling for a `width` x `height` texture.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            format,
            filter: FilterMode::default(),
            wrap: WrapMode::default(),
            mipmaps: false,
        }
    }

    /// Size in bytes of the base level.
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.texel_size()
    }
}

/// Source code for a shader program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSource {
    /// A vertex + fragment pair.
    Graphics {
        /// Vertex stage source.
        vertex: Cow<'static, str>,
        /// Fragment stage source.
        fragment: Cow<'static, str>,
    },
    /// A single compute stage.
    Compute {
        /// Compute stage source.
        compute: Cow<'static, str>,
    },
}

impl ProgramSource {
    /// Returns `true` for compute programs.
    pub fn is_compute(&self) -> bool {
        matches!(self, Self::Compute { .. })
    }
}

/// A descriptor for a shader program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Stage sources.
    pub source: ProgramSource,
}

/// A descriptor for a named uniform shared by every program that declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDescriptor {
    /// The name as declared in shader source.
    pub name: Cow<'static, str>,
    /// Value type.
    pub ty: UniformType,
    /// Array length, at least 1.
    pub count: u8,
}

/// Colour and depth clear values. `None` leaves the attachment untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClearValues {
    /// RGBA clear colour.
    pub color: Option<[f32; 4]>,
    /// Depth clear value.
    pub depth: Option<f32>,
}

/// A descriptor for a render layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderLayerDescriptor {
    /// Debug name.
    pub name: Cow<'static, str>,
    /// When set, draws in this layer execute in submission order.
    pub sequential: bool,
    /// Target framebuffer; `None` targets the default framebuffer.
    pub framebuffer: Option<FramebufferHandle>,
    /// Clear applied when the executor enters the layer.
    pub clear: ClearValues,
}

/// A descriptor for an off-screen framebuffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FramebufferDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Colour attachments, bound to draw buffers in order.
    pub color: Vec<TextureHandle>,
    /// Depth attachment.
    pub depth: Option<TextureHandle>,
}

/// A scissor rectangle in framebuffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Bottom edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl ScissorRect {
    /// Creates a rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The full-framebuffer rectangle for a `width` x `height` target.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}
