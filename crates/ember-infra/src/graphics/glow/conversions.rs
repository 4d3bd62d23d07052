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

use ember_core::renderer::{
    AttributeType, BlendEquation, BlendFactor, BufferKind, BufferUsage, CullMode, DepthTest,
    FilterMode, IndexFormat, MemoryBarrier, PrimitiveTopology, TextureFormat, UniformType,
    WrapMode,
};

/// A local extension trait to convert the engine's enums into OpenGL enum values.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_gl()` syntax.
pub trait IntoGl<T> {
    /// Consumes self and converts it into an OpenGL value.
    fn into_gl(self) -> T;
}

// --- Buffers ---

impl IntoGl<u32> for BufferKind {
    fn into_gl(self) -> u32 {
        match self {
            BufferKind::Vertex => glow::ARRAY_BUFFER,
            BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
            BufferKind::ShaderStorage => glow::SHADER_STORAGE_BUFFER,
            BufferKind::AtomicCounter => glow::ATOMIC_COUNTER_BUFFER,
        }
    }
}

impl IntoGl<u32> for BufferUsage {
    fn into_gl(self) -> u32 {
        match self {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
            BufferUsage::Stream => glow::STREAM_DRAW,
        }
    }
}

impl IntoGl<u32> for IndexFormat {
    fn into_gl(self) -> u32 {
        match self {
            IndexFormat::U16 => glow::UNSIGNED_SHORT,
            IndexFormat::U32 => glow::UNSIGNED_INT,
        }
    }
}

impl IntoGl<u32> for AttributeType {
    fn into_gl(self) -> u32 {
        match self {
            AttributeType::I8 => glow::BYTE,
            AttributeType::U8 => glow::UNSIGNED_BYTE,
            AttributeType::I16 => glow::SHORT,
            AttributeType::U16 => glow::UNSIGNED_SHORT,
            AttributeType::I32 => glow::INT,
            AttributeType::U32 => glow::UNSIGNED_INT,
            AttributeType::F16 => glow::HALF_FLOAT,
            AttributeType::F32 => glow::FLOAT,
            AttributeType::F64 => glow::DOUBLE,
            AttributeType::I2_10_10_10 => glow::INT_2_10_10_10_REV,
            AttributeType::U2_10_10_10 => glow::UNSIGNED_INT_2_10_10_10_REV,
        }
    }
}

// --- Textures ---

/// `(internal format, pixel format, pixel type)` for `tex_image_2d`.
impl IntoGl<(i32, u32, u32)> for TextureFormat {
    fn into_gl(self) -> (i32, u32, u32) {
        match self {
            TextureFormat::R8 => (glow::R8 as i32, glow::RED, glow::UNSIGNED_BYTE),
            TextureFormat::Rgba8 => (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
            TextureFormat::Rgba16F => (glow::RGBA16F as i32, glow::RGBA, glow::HALF_FLOAT),
            TextureFormat::Rgba32F => (glow::RGBA32F as i32, glow::RGBA, glow::FLOAT),
            TextureFormat::R32F => (glow::R32F as i32, glow::RED, glow::FLOAT),
            TextureFormat::R32U => (glow::R32UI as i32, glow::RED_INTEGER, glow::UNSIGNED_INT),
            TextureFormat::Depth24Stencil8 => (
                glow::DEPTH24_STENCIL8 as i32,
                glow::DEPTH_STENCIL,
                glow::UNSIGNED_INT_24_8,
            ),
            TextureFormat::Depth32F => (glow::DEPTH_COMPONENT32F as i32, glow::DEPTH_COMPONENT, glow::FLOAT),
        }
    }
}

/// `(min filter, mag filter)`.
pub fn filter(mode: FilterMode, mipmaps: bool) -> (i32, i32) {
    match (mode, mipmaps) {
        (FilterMode::Nearest, false) => (glow::NEAREST as i32, glow::NEAREST as i32),
        (FilterMode::Nearest, true) => (glow::NEAREST_MIPMAP_NEAREST as i32, glow::NEAREST as i32),
        (FilterMode::Linear, false) => (glow::LINEAR as i32, glow::LINEAR as i32),
        (FilterMode::Linear, true) => (glow::LINEAR_MIPMAP_LINEAR as i32, glow::LINEAR as i32),
    }
}

impl IntoGl<i32> for WrapMode {
    fn into_gl(self) -> i32 {
        (match self {
            WrapMode::Repeat => glow::REPEAT,
            WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
            WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
        }) as i32
    }
}

// --- Raster state ---

/// `None` means the depth test is disabled.
impl IntoGl<Option<u32>> for DepthTest {
    fn into_gl(self) -> Option<u32> {
        Some(match self {
            DepthTest::Off => return None,
            DepthTest::Less => glow::LESS,
            DepthTest::LessEqual => glow::LEQUAL,
            DepthTest::Equal => glow::EQUAL,
            DepthTest::GreaterEqual => glow::GEQUAL,
            DepthTest::Greater => glow::GREATER,
            DepthTest::NotEqual => glow::NOTEQUAL,
            DepthTest::Never => glow::NEVER,
            DepthTest::Always => glow::ALWAYS,
        })
    }
}

impl IntoGl<u32> for BlendFactor {
    fn into_gl(self) -> u32 {
        match self {
            BlendFactor::Zero => glow::ZERO,
            BlendFactor::One => glow::ONE,
            BlendFactor::SrcColor => glow::SRC_COLOR,
            BlendFactor::InvSrcColor => glow::ONE_MINUS_SRC_COLOR,
            BlendFactor::SrcAlpha => glow::SRC_ALPHA,
            BlendFactor::InvSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstAlpha => glow::DST_ALPHA,
            BlendFactor::InvDstAlpha => glow::ONE_MINUS_DST_ALPHA,
            BlendFactor::DstColor => glow::DST_COLOR,
            BlendFactor::InvDstColor => glow::ONE_MINUS_DST_COLOR,
        }
    }
}

impl IntoGl<u32> for BlendEquation {
    fn into_gl(self) -> u32 {
        match self {
            BlendEquation::Add => glow::FUNC_ADD,
            BlendEquation::Subtract => glow::FUNC_SUBTRACT,
            BlendEquation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
            BlendEquation::Min => glow::MIN,
            BlendEquation::Max => glow::MAX,
        }
    }
}

/// `None` means culling is disabled.
impl IntoGl<Option<u32>> for CullMode {
    fn into_gl(self) -> Option<u32> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(glow::FRONT),
            CullMode::Back => Some(glow::BACK),
            CullMode::FrontAndBack => Some(glow::FRONT_AND_BACK),
        }
    }
}

impl IntoGl<u32> for PrimitiveTopology {
    fn into_gl(self) -> u32 {
        match self {
            PrimitiveTopology::Triangles => glow::TRIANGLES,
            PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
            PrimitiveTopology::Lines => glow::LINES,
            PrimitiveTopology::LineStrip => glow::LINE_STRIP,
            PrimitiveTopology::Points => glow::POINTS,
        }
    }
}

impl IntoGl<u32> for MemoryBarrier {
    fn into_gl(self) -> u32 {
        if self == MemoryBarrier::ALL {
            return glow::ALL_BARRIER_BITS;
        }
        let mut bits = 0;
        if self.contains(MemoryBarrier::SHADER_STORAGE) {
            bits |= glow::SHADER_STORAGE_BARRIER_BIT;
        }
        if self.contains(MemoryBarrier::ATOMIC_COUNTER) {
            bits |= glow::ATOMIC_COUNTER_BARRIER_BIT;
        }
        if self.contains(MemoryBarrier::SHADER_IMAGE_ACCESS) {
            bits |= glow::SHADER_IMAGE_ACCESS_BARRIER_BIT;
        }
        if self.contains(MemoryBarrier::VERTEX_ATTRIB_ARRAY) {
            bits |= glow::VERTEX_ATTRIB_ARRAY_BARRIER_BIT;
        }
        bits
    }
}

/// Maps a `glGetActiveUniform` type to the engine's uniform type.
pub fn uniform_type_from_gl(gl_type: u32) -> Option<UniformType> {
    Some(match gl_type {
        glow::FLOAT => UniformType::Float,
        glow::FLOAT_VEC2 => UniformType::Vec2,
        glow::FLOAT_VEC3 => UniformType::Vec3,
        glow::FLOAT_VEC4 => UniformType::Vec4,
        glow::FLOAT_MAT3 => UniformType::Mat3,
        glow::FLOAT_MAT4 => UniformType::Mat4,
        glow::INT | glow::BOOL => UniformType::Int,
        glow::INT_VEC2 => UniformType::IVec2,
        glow::INT_VEC3 => UniformType::IVec3,
        glow::INT_VEC4 => UniformType::IVec4,
        glow::UNSIGNED_INT => UniformType::UInt,
        glow::SAMPLER_2D
        | glow::SAMPLER_2D_SHADOW
        | glow::INT_SAMPLER_2D
        | glow::UNSIGNED_INT_SAMPLER_2D
        | glow::IMAGE_2D => UniformType::Sampler,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_states_map_to_none() {
        let depth: Option<u32> = DepthTest::Off.into_gl();
        let cull: Option<u32> = CullMode::None.into_gl();
        assert_eq!(depth, None);
        assert_eq!(cull, None);
        let less: Option<u32> = DepthTest::Less.into_gl();
        assert_eq!(less, Some(glow::LESS));
    }

    #[test]
    fn barrier_bits_combine() {
        let bits: u32 = (MemoryBarrier::SHADER_STORAGE | MemoryBarrier::ATOMIC_COUNTER).into_gl();
        assert_eq!(
            bits,
            glow::SHADER_STORAGE_BARRIER_BIT | glow::ATOMIC_COUNTER_BARRIER_BIT
        );
        let all: u32 = MemoryBarrier::ALL.into_gl();
        assert_eq!(all, glow::ALL_BARRIER_BITS);
    }

    #[test]
    fn reflected_uniform_types() {
        assert_eq!(uniform_type_from_gl(glow::FLOAT_MAT4), Some(UniformType::Mat4));
        assert_eq!(uniform_type_from_gl(glow::SAMPLER_2D), Some(UniformType::Sampler));
        assert_eq!(uniform_type_from_gl(glow::DOUBLE), None);
    }
}
