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

//! Renderer contracts: handles, the packed state and key words, resource
//! descriptors, and the graphics backend interface.

pub mod backend;
pub mod descriptors;
pub mod error;
pub mod handle;
pub mod limits;
pub mod sort_key;
pub mod state;
pub mod stats;
pub mod uniform;
pub mod vertex;

pub use self::backend::{
    ActiveUniform, GpuBuffer, GpuFramebuffer, GpuProgram, GpuTexture, GpuVertexArray,
    GraphicsBackend, MemoryBarrier,
};
pub use self::descriptors::*;
pub use self::error::{RenderError, ResourceError, ShaderError, ShaderStage};
pub use self::handle::*;
pub use self::sort_key::{SortKey, SortKeyFields};
pub use self::state::{
    BlendEquation, BlendFactor, CullMode, DepthTest, PrimitiveTopology, RenderState, WriteMask,
};
pub use self::stats::RenderStats;
pub use self::uniform::{uniform_name_hash, UniformType, UniformValue};
pub use self::vertex::{AttributeType, VertexArrangement, VertexAttribute, VertexLayout};
