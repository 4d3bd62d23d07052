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

//! The public-facing Software Development Kit (SDK) for the Ember engine.
//!
//! An [`Engine`] owns the job system, the render thread and a list of
//! [`System`]s, and drives them with a fixed-step frame loop:
//!
//! ```no_run
//! use ember_core::EngineConfig;
//! use ember_sdk::{Engine, System, SystemContext};
//!
//! struct QuitAfter(u64);
//!
//! impl System for QuitAfter {
//!     fn late_update(&mut self, ctx: &mut SystemContext<'_>) {
//!         if ctx.time().frame + 1 >= self.0 {
//!             ctx.quit();
//!         }
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let (mut engine, _input) = Engine::headless(EngineConfig::default())?;
//!     engine.add_system(QuitAfter(60));
//!     engine.run()
//! }
//! ```

#![warn(missing_docs)]

mod engine;
mod frame_loop;
mod system;
mod telemetry;

pub use engine::Engine;
pub use frame_loop::{FrameLoop, FrameTiming};
pub use system::{FrameTime, System, SystemContext};
pub use telemetry::{Telemetry, TelemetryWindow};

/// The types most applications need.
pub mod prelude {
    pub use crate::{Engine, FrameTime, System, SystemContext};
    pub use ember_core::config::EngineConfig;
    pub use ember_core::event::RenderEvent;
    pub use ember_core::platform::{InputSnapshot, KeyCode, MouseButton};
    pub use ember_core::renderer::{
        AttributeType, BufferUsage, ClearValues, IndexFormat, ProgramDescriptor, ProgramSource,
        RenderLayerDescriptor, RenderState, UniformDescriptor, UniformType, VertexBufferDescriptor,
        VertexLayout,
    };
    pub use ember_lanes::render_lane::{MemoryRef, RenderFrontend, WHOLE_BUFFER};
}
