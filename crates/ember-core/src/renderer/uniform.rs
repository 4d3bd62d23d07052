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

//! Uniform value types and their wire encoding.

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

/// The type byte stored in every uniform update record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UniformType {
    /// `float`
    Float = 0,
    /// `vec2`
    Vec2 = 1,
    /// `vec3`
    Vec3 = 2,
    /// `vec4`
    Vec4 = 3,
    /// `mat3`
    Mat3 = 4,
    /// `mat4`
    Mat4 = 5,
    /// `int`
    Int = 6,
    /// `ivec2`
    IVec2 = 7,
    /// `ivec3`
    IVec3 = 8,
    /// `ivec4`
    IVec4 = 9,
    /// `uint`
    UInt = 10,
    /// Any sampler; the value is the texture unit as an `int`.
    Sampler = 11,
}

impl UniformType {
    /// Size in bytes of one element of this type.
    pub const fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt | Self::Sampler => 4,
            Self::Vec2 | Self::IVec2 => 8,
            Self::Vec3 | Self::IVec3 => 12,
            Self::Vec4 | Self::IVec4 => 16,
            Self::Mat3 => 36,
            Self::Mat4 => 64,
        }
    }

    /// Decodes a type byte.
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Float,
            1 => Self::Vec2,
            2 => Self::Vec3,
            3 => Self::Vec4,
            4 => Self::Mat3,
            5 => Self::Mat4,
            6 => Self::Int,
            7 => Self::IVec2,
            8 => Self::IVec3,
            9 => Self::IVec4,
            10 => Self::UInt,
            11 => Self::Sampler,
            _ => return None,
        })
    }

    /// Returns `true` if values of `other` may be written to a uniform declared as `self`.
    ///
    /// Samplers accept plain `int` writes, which is how texture units are assigned.
    pub const fn accepts(self, other: Self) -> bool {
        self as u8 == other as u8 || matches!((self, other), (Self::Sampler, Self::Int))
    }
}

/// Rust value types that map onto a [`UniformType`].
pub trait UniformValue: Pod {
    /// The uniform type this value encodes as.
    const TYPE: UniformType;
}

macro_rules! uniform_values {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl UniformValue for $ty {
            const TYPE: UniformType = UniformType::$variant;
        })*
    };
}

uniform_values! {
    f32 => Float,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    [[f32; 3]; 3] => Mat3,
    [[f32; 4]; 4] => Mat4,
    i32 => Int,
    [i32; 2] => IVec2,
    [i32; 3] => IVec3,
    [i32; 4] => IVec4,
    u32 => UInt,
}

/// Hashes a uniform name the way program location tables are keyed (FNV-1a, 32-bit).
pub fn uniform_name_hash(name: &str) -> u32 {
    name.bytes().fold(0x811c_9dc5u32, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(0x0100_0193)
    })
}
