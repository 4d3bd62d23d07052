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

//! The packed 64-bit render-state word.
//!
//! Pipeline code builds a state by OR-ing the named constants of [`RenderState`].
//! The bit layout is a stable external contract:
//!
//! | Bits  | Field                    |
//! |-------|--------------------------|
//! | 0     | RGB write                |
//! | 1     | alpha write              |
//! | 2     | depth write              |
//! | 4–7   | depth test               |
//! | 8–11  | blend source factor      |
//! | 12–15 | blend destination factor |
//! | 16–19 | blend equation           |
//! | 20–23 | cull mode                |
//! | 24–27 | primitive topology       |
//!
//! Sub-field values outside the documented ranges decode to `None`; the frame
//! executor treats them as "no change".

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// A packed fixed-function pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderState(u64);

impl RenderState {
    /// Writes the RGB channels.
    pub const WRITE_RGB: Self = Self(1 << 0);
    /// Writes the alpha channel.
    pub const WRITE_A: Self = Self(1 << 1);
    /// Writes depth.
    pub const WRITE_Z: Self = Self(1 << 2);
    /// All write bits.
    pub const WRITE_MASK: u64 = 0x7;

    /// Shift of the depth-test field.
    pub const DEPTH_TEST_SHIFT: u32 = 4;
    /// Mask of the depth-test field.
    pub const DEPTH_TEST_MASK: u64 = 0xF << Self::DEPTH_TEST_SHIFT;
    /// Depth testing disabled.
    pub const DEPTH_TEST_OFF: Self = Self(0);
    /// Passes if the incoming depth is less than the stored depth.
    pub const DEPTH_TEST_LESS: Self = Self(1 << Self::DEPTH_TEST_SHIFT);
    /// Passes if less or equal.
    pub const DEPTH_TEST_LEQUAL: Self = Self(2 << Self::DEPTH_TEST_SHIFT);
    /// Passes if equal.
    pub const DEPTH_TEST_EQUAL: Self = Self(3 << Self::DEPTH_TEST_SHIFT);
    /// Passes if greater or equal.
    pub const DEPTH_TEST_GEQUAL: Self = Self(4 << Self::DEPTH_TEST_SHIFT);
    /// Passes if greater.
    pub const DEPTH_TEST_GREATER: Self = Self(5 << Self::DEPTH_TEST_SHIFT);
    /// Passes if not equal.
    pub const DEPTH_TEST_NOTEQUAL: Self = Self(6 << Self::DEPTH_TEST_SHIFT);
    /// Never passes.
    pub const DEPTH_TEST_NEVER: Self = Self(7 << Self::DEPTH_TEST_SHIFT);
    /// Always passes.
    pub const DEPTH_TEST_ALWAYS: Self = Self(8 << Self::DEPTH_TEST_SHIFT);

    /// Shift of the blend source factor.
    pub const BLEND_SRC_SHIFT: u32 = 8;
    /// Shift of the blend destination factor.
    pub const BLEND_DST_SHIFT: u32 = 12;
    /// Mask of both blend factors.
    pub const BLEND_FUNC_MASK: u64 = 0xFF << Self::BLEND_SRC_SHIFT;

    /// Shift of the blend-equation field.
    pub const BLEND_EQUATION_SHIFT: u32 = 16;
    /// Mask of the blend-equation field.
    pub const BLEND_EQUATION_MASK: u64 = 0xF << Self::BLEND_EQUATION_SHIFT;
    /// `src + dst`.
    pub const BLEND_EQUATION_ADD: Self = Self(0);
    /// `src - dst`.
    pub const BLEND_EQUATION_SUB: Self = Self(1 << Self::BLEND_EQUATION_SHIFT);
    /// `dst - src`.
    pub const BLEND_EQUATION_REVSUB: Self = Self(2 << Self::BLEND_EQUATION_SHIFT);
    /// `min(src, dst)`.
    pub const BLEND_EQUATION_MIN: Self = Self(3 << Self::BLEND_EQUATION_SHIFT);
    /// `max(src, dst)`.
    pub const BLEND_EQUATION_MAX: Self = Self(4 << Self::BLEND_EQUATION_SHIFT);

    /// Shift of the cull field.
    pub const CULL_SHIFT: u32 = 20;
    /// Mask of the cull field.
    pub const CULL_MASK: u64 = 0xF << Self::CULL_SHIFT;
    /// Face culling disabled.
    pub const CULL_NONE: Self = Self(0);
    /// Cull front faces.
    pub const CULL_FRONT: Self = Self(1 << Self::CULL_SHIFT);
    /// Cull back faces.
    pub const CULL_BACK: Self = Self(2 << Self::CULL_SHIFT);
    /// Cull every face.
    pub const CULL_FRONT_AND_BACK: Self = Self(3 << Self::CULL_SHIFT);

    /// Shift of the primitive field.
    pub const PRIMITIVE_SHIFT: u32 = 24;
    /// Mask of the primitive field.
    pub const PRIMITIVE_MASK: u64 = 0xF << Self::PRIMITIVE_SHIFT;
    /// Triangle list.
    pub const PRIMITIVE_TRIANGLES: Self = Self(0);
    /// Triangle strip.
    pub const PRIMITIVE_TRIANGLE_STRIP: Self = Self(1 << Self::PRIMITIVE_SHIFT);
    /// Line list.
    pub const PRIMITIVE_LINES: Self = Self(2 << Self::PRIMITIVE_SHIFT);
    /// Line strip.
    pub const PRIMITIVE_LINE_STRIP: Self = Self(3 << Self::PRIMITIVE_SHIFT);
    /// Point list.
    pub const PRIMITIVE_POINTS: Self = Self(4 << Self::PRIMITIVE_SHIFT);

    /// Opaque geometry: all writes, `LESS` depth test, back-face culling, triangles.
    pub const DEFAULT: Self = Self(
        Self::WRITE_RGB.0 | Self::WRITE_A.0 | Self::WRITE_Z.0 | Self::DEPTH_TEST_LESS.0 | Self::CULL_BACK.0,
    );

    /// Wraps raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Builds the blend-function sub-field from two factors.
    pub const fn blend_func(src: BlendFactor, dst: BlendFactor) -> Self {
        Self(((src as u64) << Self::BLEND_SRC_SHIFT) | ((dst as u64) << Self::BLEND_DST_SHIFT))
    }

    /// Returns a copy with the primitive field replaced.
    pub const fn with_primitive(self, primitive: PrimitiveTopology) -> Self {
        Self((self.0 & !Self::PRIMITIVE_MASK) | ((primitive as u64) << Self::PRIMITIVE_SHIFT))
    }

    /// Returns `true` if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Decodes the write mask.
    pub const fn write_mask(self) -> WriteMask {
        WriteMask {
            rgb: self.0 & Self::WRITE_RGB.0 != 0,
            alpha: self.0 & Self::WRITE_A.0 != 0,
            depth: self.0 & Self::WRITE_Z.0 != 0,
        }
    }

    /// Decodes the depth test. `None` means the raw value is unknown.
    pub fn depth_test(self) -> Option<DepthTest> {
        DepthTest::from_raw(((self.0 & Self::DEPTH_TEST_MASK) >> Self::DEPTH_TEST_SHIFT) as u8)
    }

    /// Decodes the blend function. `Some(None)` means blending is disabled.
    pub fn blend(self) -> Option<Option<(BlendFactor, BlendFactor)>> {
        let src = ((self.0 >> Self::BLEND_SRC_SHIFT) & 0xF) as u8;
        let dst = ((self.0 >> Self::BLEND_DST_SHIFT) & 0xF) as u8;
        if src == 0 && dst == 0 {
            return Some(None);
        }
        match (BlendFactor::from_raw(src), BlendFactor::from_raw(dst)) {
            (Some(src), Some(dst)) => Some(Some((src, dst))),
            _ => None,
        }
    }

    /// Decodes the blend equation.
    pub fn blend_equation(self) -> Option<BlendEquation> {
        BlendEquation::from_raw(((self.0 & Self::BLEND_EQUATION_MASK) >> Self::BLEND_EQUATION_SHIFT) as u8)
    }

    /// Decodes the cull mode.
    pub fn cull(self) -> Option<CullMode> {
        CullMode::from_raw(((self.0 & Self::CULL_MASK) >> Self::CULL_SHIFT) as u8)
    }

    /// Decodes the primitive topology.
    pub fn primitive(self) -> Option<PrimitiveTopology> {
        PrimitiveTopology::from_raw(((self.0 & Self::PRIMITIVE_MASK) >> Self::PRIMITIVE_SHIFT) as u8)
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for RenderState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RenderState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd<u64> for RenderState {
    type Output = u64;

    fn bitand(self, rhs: u64) -> u64 {
        self.0 & rhs
    }
}

/// Which attachments a draw writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMask {
    /// RGB channels.
    pub rgb: bool,
    /// Alpha channel.
    pub alpha: bool,
    /// Depth buffer.
    pub depth: bool,
}

/// Depth comparison function; `Off` disables the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DepthTest {
    /// No depth test.
    Off = 0,
    /// `<`
    Less = 1,
    /// `<=`
    LessEqual = 2,
    /// `==`
    Equal = 3,
    /// `>=`
    GreaterEqual = 4,
    /// `>`
    Greater = 5,
    /// `!=`
    NotEqual = 6,
    /// Never passes.
    Never = 7,
    /// Always passes.
    Always = 8,
}

impl DepthTest {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Off,
            1 => Self::Less,
            2 => Self::LessEqual,
            3 => Self::Equal,
            4 => Self::GreaterEqual,
            5 => Self::Greater,
            6 => Self::NotEqual,
            7 => Self::Never,
            8 => Self::Always,
            _ => return None,
        })
    }
}

/// Blend factor applied to the source or destination colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendFactor {
    /// 0
    Zero = 1,
    /// 1
    One = 2,
    /// Source colour.
    SrcColor = 3,
    /// 1 - source colour.
    InvSrcColor = 4,
    /// Source alpha.
    SrcAlpha = 5,
    /// 1 - source alpha.
    InvSrcAlpha = 6,
    /// Destination alpha.
    DstAlpha = 7,
    /// 1 - destination alpha.
    InvDstAlpha = 8,
    /// Destination colour.
    DstColor = 9,
    /// 1 - destination colour.
    InvDstColor = 10,
}

impl BlendFactor {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => Self::Zero,
            2 => Self::One,
            3 => Self::SrcColor,
            4 => Self::InvSrcColor,
            5 => Self::SrcAlpha,
            6 => Self::InvSrcAlpha,
            7 => Self::DstAlpha,
            8 => Self::InvDstAlpha,
            9 => Self::DstColor,
            10 => Self::InvDstColor,
            _ => return None,
        })
    }
}

/// How source and destination are combined after the blend factors are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendEquation {
    /// `src + dst`
    Add = 0,
    /// `src - dst`
    Subtract = 1,
    /// `dst - src`
    ReverseSubtract = 2,
    /// `min(src, dst)`
    Min = 3,
    /// `max(src, dst)`
    Max = 4,
}

impl BlendEquation {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Add,
            1 => Self::Subtract,
            2 => Self::ReverseSubtract,
            3 => Self::Min,
            4 => Self::Max,
            _ => return None,
        })
    }
}

/// Which faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CullMode {
    /// Culling disabled.
    None = 0,
    /// Front faces.
    Front = 1,
    /// Back faces.
    Back = 2,
    /// Both.
    FrontAndBack = 3,
}

impl CullMode {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::None,
            1 => Self::Front,
            2 => Self::Back,
            3 => Self::FrontAndBack,
            _ => return None,
        })
    }
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PrimitiveTopology {
    /// Independent triangles.
    #[default]
    Triangles = 0,
    /// Triangle strip.
    TriangleStrip = 1,
    /// Independent lines.
    Lines = 2,
    /// Line strip.
    LineStrip = 3,
    /// Points.
    Points = 4,
}

impl PrimitiveTopology {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Triangles,
            1 => Self::TriangleStrip,
            2 => Self::Lines,
            3 => Self::LineStrip,
            4 => Self::Points,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_decodes_to_opaque_geometry() {
        let state = RenderState::DEFAULT;
        assert_eq!(
            state.write_mask(),
            WriteMask {
                rgb: true,
                alpha: true,
                depth: true
            }
        );
        assert_eq!(state.depth_test(), Some(DepthTest::Less));
        assert_eq!(state.blend(), Some(None));
        assert_eq!(state.blend_equation(), Some(BlendEquation::Add));
        assert_eq!(state.cull(), Some(CullMode::Back));
        assert_eq!(state.primitive(), Some(PrimitiveTopology::Triangles));
    }

    #[test]
    fn named_constants_compose_by_or() {
        let state = RenderState::WRITE_RGB
            | RenderState::DEPTH_TEST_ALWAYS
            | RenderState::blend_func(BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha)
            | RenderState::BLEND_EQUATION_MAX
            | RenderState::CULL_FRONT
            | RenderState::PRIMITIVE_LINES;
        assert!(!state.write_mask().depth);
        assert_eq!(state.depth_test(), Some(DepthTest::Always));
        assert_eq!(
            state.blend(),
            Some(Some((BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha)))
        );
        assert_eq!(state.blend_equation(), Some(BlendEquation::Max));
        assert_eq!(state.cull(), Some(CullMode::Front));
        assert_eq!(state.primitive(), Some(PrimitiveTopology::Lines));
    }

    #[test]
    fn unknown_values_decode_to_none() {
        let state = RenderState::from_bits(
            (12 << RenderState::DEPTH_TEST_SHIFT)
                | (15 << RenderState::BLEND_SRC_SHIFT)
                | (9 << RenderState::BLEND_EQUATION_SHIFT)
                | (7 << RenderState::CULL_SHIFT)
                | (11 << RenderState::PRIMITIVE_SHIFT),
        );
        assert_eq!(state.depth_test(), None);
        assert_eq!(state.blend(), None);
        assert_eq!(state.blend_equation(), None);
        assert_eq!(state.cull(), None);
        assert_eq!(state.primitive(), None);
    }

    #[test]
    fn with_primitive_replaces_only_that_field() {
        let state = RenderState::DEFAULT.with_primitive(PrimitiveTopology::Points);
        assert_eq!(state.primitive(), Some(PrimitiveTopology::Points));
        assert_eq!(state.cull(), Some(CullMode::Back));
    }
}
