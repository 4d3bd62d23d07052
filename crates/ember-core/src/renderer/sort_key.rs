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

//! The 64-bit draw sort key.
//!
//! Layout, high to low: `layer(8) | compute(1) | sequence(11) | program(12) | depth(32)`.
//! Ascending key order is draw issue order: lower layers first, compute before
//! graphics within a layer, then sequence, then program grouping, then depth.
//!
//! The compute field is stored inverted (bit 55 clear for a dispatch, set for a
//! draw) so that plain ascending order places dispatches ahead of draws.

use std::fmt;

/// A packed, totally ordered draw key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey(u64);

/// The decoded fields of a [`SortKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortKeyFields {
    /// Render layer, 0..=255.
    pub layer: u8,
    /// `true` for compute dispatches.
    pub compute: bool,
    /// Intra-layer sequence, 0..=2047.
    pub sequence: u16,
    /// Program index, 0..=4095.
    pub program: u16,
    /// Caller-supplied depth.
    pub depth: u32,
}

impl SortKey {
    const LAYER_SHIFT: u32 = 56;
    const COMPUTE_SHIFT: u32 = 55;
    const SEQUENCE_SHIFT: u32 = 44;
    const PROGRAM_SHIFT: u32 = 32;

    /// Largest representable sequence value.
    pub const MAX_SEQUENCE: u16 = (1 << 11) - 1;
    /// Largest representable program index.
    pub const MAX_PROGRAM: u16 = (1 << 12) - 1;

    /// Packs the fields. Out-of-range sequence and program values are masked.
    pub const fn encode(fields: SortKeyFields) -> Self {
        Self(
            ((fields.layer as u64) << Self::LAYER_SHIFT)
                | ((!fields.compute as u64) << Self::COMPUTE_SHIFT)
                | (((fields.sequence & Self::MAX_SEQUENCE) as u64) << Self::SEQUENCE_SHIFT)
                | (((fields.program & Self::MAX_PROGRAM) as u64) << Self::PROGRAM_SHIFT)
                | fields.depth as u64,
        )
    }

    /// Unpacks the fields.
    pub const fn decode(self) -> SortKeyFields {
        SortKeyFields {
            layer: (self.0 >> Self::LAYER_SHIFT) as u8,
            compute: (self.0 >> Self::COMPUTE_SHIFT) & 1 == 0,
            sequence: ((self.0 >> Self::SEQUENCE_SHIFT) as u16) & Self::MAX_SEQUENCE,
            program: ((self.0 >> Self::PROGRAM_SHIFT) as u16) & Self::MAX_PROGRAM,
            depth: self.0 as u32,
        }
    }

    /// Wraps raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if the key belongs to a compute dispatch.
    #[inline]
    pub const fn is_compute(self) -> bool {
        (self.0 >> Self::COMPUTE_SHIFT) & 1 == 0
    }

    /// Returns the layer field.
    #[inline]
    pub const fn layer(self) -> u8 {
        (self.0 >> Self::LAYER_SHIFT) as u8
    }
}

impl From<SortKeyFields> for SortKey {
    fn from(fields: SortKeyFields) -> Self {
        Self::encode(fields)
    }
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = self.decode();
        write!(
            f,
            "SortKey(layer={}, {}, seq={}, program={}, depth={})",
            k.layer,
            if k.compute { "compute" } else { "draw" },
            k.sequence,
            k.program,
            k.depth
        )
    }
}
