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

//! Vertex layouts and the packed per-attribute descriptor byte.

use super::limits::MAX_VERTEX_ATTRIBUTES;

/// The scalar type of one attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeType {
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Half-precision float.
    F16,
    /// Single-precision float.
    #[default]
    F32,
    /// Double-precision float.
    F64,
    /// Signed `2_10_10_10` packed into one 32-bit word.
    I2_10_10_10,
    /// Unsigned `2_10_10_10` packed into one 32-bit word.
    U2_10_10_10,
}

impl AttributeType {
    /// Returns `true` for the packed 10/10/10/2 formats.
    pub const fn is_packed(self) -> bool {
        matches!(self, Self::I2_10_10_10 | Self::U2_10_10_10)
    }

    /// Returns `true` for the integer formats that a shader can read unconverted.
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::U8 | Self::I16 | Self::U16 | Self::I32 | Self::U32
        )
    }

    /// Size of one component in bytes. Packed formats report the whole word.
    pub const fn component_size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 | Self::F16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
            Self::I2_10_10_10 | Self::U2_10_10_10 => 4,
        }
    }
}

/// One vertex attribute.
///
/// The location, normalized flag and component count share one byte laid out as
/// `lllll|n|ss`: five bits of binding location, the normalized flag, and
/// `size - 1` in the low two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexAttribute {
    packed: u8,
    ty: AttributeType,
}

impl VertexAttribute {
    /// Highest binding location the packed byte can carry.
    pub const MAX_LOCATION: u8 = 31;

    /// Describes an attribute at `location` with `size` components (1..=4).
    ///
    /// # Panics
    ///
    /// Panics if `location` exceeds [`Self::MAX_LOCATION`], if `size` is outside
    /// `1..=4`, or if a packed format is given a size other than 4.
    pub const fn new(location: u8, size: u8, ty: AttributeType, normalized: bool) -> Self {
        assert!(location <= Self::MAX_LOCATION, "vertex attribute location out of range");
        assert!(size >= 1 && size <= 4, "vertex attribute size must be 1..=4");
        assert!(!ty.is_packed() || size == 4, "packed formats carry four components");
        Self {
            packed: Self::pack(location, size, normalized),
            ty,
        }
    }

    /// Encodes the descriptor byte.
    pub const fn pack(location: u8, size: u8, normalized: bool) -> u8 {
        (location << 3) | ((normalized as u8) << 2) | ((size - 1) & 0x3)
    }

    /// Returns the raw descriptor byte.
    pub const fn packed(&self) -> u8 {
        self.packed
    }

    /// Binding location.
    pub const fn location(&self) -> u8 {
        self.packed >> 3
    }

    /// Whether integer data is normalized to `[0, 1]` or `[-1, 1]`.
    pub const fn normalized(&self) -> bool {
        self.packed & 0x4 != 0
    }

    /// Component count, 1..=4.
    pub const fn size(&self) -> u8 {
        (self.packed & 0x3) + 1
    }

    /// Component type.
    pub const fn ty(&self) -> AttributeType {
        self.ty
    }

    /// Bytes one vertex spends on this attribute.
    pub const fn byte_size(&self) -> usize {
        if self.ty.is_packed() {
            self.ty.component_size()
        } else {
            self.ty.component_size() * self.size() as usize
        }
    }
}

/// How attribute streams share a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexArrangement {
    /// All attributes of a vertex are adjacent; one stride covers the vertex.
    #[default]
    Interleaved,
    /// Each attribute occupies its own contiguous run, one after another.
    Planar,
}

/// An ordered list of up to [`MAX_VERTEX_ATTRIBUTES`] attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    attributes: [VertexAttribute; MAX_VERTEX_ATTRIBUTES],
    count: u8,
    arrangement: VertexArrangement,
}

impl VertexLayout {
    /// An empty interleaved layout.
    pub const fn interleaved() -> Self {
        Self::empty(VertexArrangement::Interleaved)
    }

    /// An empty planar layout.
    pub const fn planar() -> Self {
        Self::empty(VertexArrangement::Planar)
    }

    const fn empty(arrangement: VertexArrangement) -> Self {
        Self {
            attributes: [VertexAttribute {
                packed: 0,
                ty: AttributeType::F32,
            }; MAX_VERTEX_ATTRIBUTES],
            count: 0,
            arrangement,
        }
    }

    /// Appends an attribute.
    ///
    /// # Panics
    ///
    /// Panics when the layout already holds [`MAX_VERTEX_ATTRIBUTES`] attributes.
    pub fn with(mut self, attribute: VertexAttribute) -> Self {
        assert!(
            (self.count as usize) < MAX_VERTEX_ATTRIBUTES,
            "vertex layout is limited to {MAX_VERTEX_ATTRIBUTES} attributes"
        );
        self.attributes[self.count as usize] = attribute;
        self.count += 1;
        self
    }

    /// Shorthand for [`with`](Self::with) on a new attribute.
    pub fn attribute(self, location: u8, size: u8, ty: AttributeType, normalized: bool) -> Self {
        self.with(VertexAttribute::new(location, size, ty, normalized))
    }

    /// The attributes in declaration order.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes[..self.count as usize]
    }

    /// The arrangement of the attribute streams.
    pub fn arrangement(&self) -> VertexArrangement {
        self.arrangement
    }

    /// Bytes per vertex across all attributes.
    pub fn vertex_size(&self) -> usize {
        self.attributes().iter().map(VertexAttribute::byte_size).sum()
    }

    /// Distance between two consecutive elements of attribute `index`.
    pub fn stride(&self, index: usize) -> usize {
        match self.arrangement {
            VertexArrangement::Interleaved => self.vertex_size(),
            VertexArrangement::Planar => self.attributes()[index].byte_size(),
        }
    }

    /// Byte offset of attribute `index` for a buffer holding `vertex_count` vertices.
    pub fn offset(&self, index: usize, vertex_count: usize) -> usize {
        let preceding = self.attributes()[..index].iter().map(VertexAttribute::byte_size);
        match self.arrangement {
            VertexArrangement::Interleaved => preceding.sum(),
            VertexArrangement::Planar => preceding.map(|size| size * vertex_count).sum(),
        }
    }

    /// Number of whole vertices a buffer of `bytes` bytes holds.
    pub fn vertex_count(&self, bytes: usize) -> usize {
        match self.vertex_size() {
            0 => 0,
            size => bytes / size,
        }
    }
}
