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

//! Typed, dense 32-bit resource handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// An opaque index into a typed resource pool.
///
/// `K` is a zero-sized marker naming the resource kind, so a texture handle
/// cannot be passed where a program handle is expected. Handles carry no
/// generation: using a handle after its resource was destroyed is a contract
/// violation the pools do not detect.
pub struct Handle<K> {
    index: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    /// The "unset" sentinel (`0xFFFF_FFFF`).
    pub const INVALID: Self = Self::from_index(u32::MAX);

    /// Wraps a raw pool index.
    pub const fn from_index(index: u32) -> Self {
        Self {
            index,
            _kind: PhantomData,
        }
    }

    /// Returns the raw pool index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns `true` unless this is [`Handle::INVALID`].
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.index != u32::MAX
    }
}

// Manual impls so that `K` itself does not need to implement these traits.
impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<K> Default for Handle<K> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<K>().rsplit("::").next().unwrap_or("?");
        if self.is_valid() {
            write!(f, "{kind}#{}", self.index)
        } else {
            write!(f, "{kind}#INVALID")
        }
    }
}

macro_rules! resource_kinds {
    ($($(#[$doc:meta])* $kind:ident => $alias:ident;)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub enum $kind {}

            #[doc = concat!("A handle to a [`", stringify!($kind), "`] resource.")]
            pub type $alias = Handle<$kind>;
        )*
    };
}

resource_kinds! {
    /// Marker for vertex buffers.
    VertexBuffer => VertexBufferHandle;
    /// Marker for index buffers.
    IndexBuffer => IndexBufferHandle;
    /// Marker for textures.
    Texture => TextureHandle;
    /// Marker for shader programs.
    Program => ProgramHandle;
    /// Marker for named uniforms.
    Uniform => UniformHandle;
    /// Marker for shader-storage buffers.
    ShaderStorageBuffer => ShaderStorageBufferHandle;
    /// Marker for atomic-counter buffers.
    AtomicCounterBuffer => AtomicCounterBufferHandle;
    /// Marker for render layers.
    RenderLayer => RenderLayerHandle;
    /// Marker for framebuffers.
    Framebuffer => FramebufferHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_is_all_ones() {
        assert_eq!(TextureHandle::INVALID.index(), 0xFFFF_FFFF);
        assert!(!TextureHandle::INVALID.is_valid());
        assert_eq!(TextureHandle::default(), TextureHandle::INVALID);
    }

    #[test]
    fn handles_compare_by_index() {
        let a = ProgramHandle::from_index(3);
        let b = ProgramHandle::from_index(3);
        assert_eq!(a, b);
        assert_ne!(a, ProgramHandle::from_index(4));
        assert_eq!(format!("{a:?}"), "Program#3");
    }
}
