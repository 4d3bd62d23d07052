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

//! Event plumbing shared between the engine layers.

mod bus;

pub use self::bus::EventBus;

use crate::renderer::{ProgramHandle, RenderStats, ResourceError, ShaderError};

/// Events published by the renderer on its [`EventBus`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// A program failed to compile or link. The handle stays allocated but is not drawable.
    ShaderFailed {
        /// The program that failed.
        program: ProgramHandle,
        /// The backend diagnostic.
        error: ShaderError,
    },
    /// A resource could not be created or updated on the GPU.
    ResourceFailed {
        /// The kind of resource, for diagnostics.
        kind: &'static str,
        /// The raw handle index.
        index: u32,
        /// The backend diagnostic.
        error: ResourceError,
    },
    /// A frame finished executing.
    FrameRendered(RenderStats),
}
