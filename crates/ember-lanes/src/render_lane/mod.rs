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

//! Rendering lane - the hot path from draw submission to backend calls.
//!
//! The game side fills a [`FrameChannel`] through [`RenderFrontend`] (resource
//! commands) and any number of [`DrawRecorder`]s (draws and dispatches). The
//! render thread's [`Renderer`] replays the commands, then the
//! [`FrameExecutor`] sorts the frame by key and issues only the backend calls
//! whose bound value changes.

mod command;
mod command_stream;
mod executor;
mod fence;
mod frame;
mod frontend;
mod memory;
mod recorder;
mod renderer;
mod resources;
mod uniform_encoder;

pub use command::{ComputeCommand, DrawCommand, RenderBindings, WHOLE_BUFFER};
pub use command_stream::CommandStream;
pub use executor::FrameExecutor;
pub use fence::Fence;
pub use frame::{FrameChannel, FrameSubmissions};
pub use frontend::RenderFrontend;
pub use memory::MemoryRef;
pub use recorder::DrawRecorder;
pub use renderer::{Renderer, ShaderErrorCallback};
pub use uniform_encoder::{decode_uniforms, UniformArena, UniformEncoder, UniformRecord};
