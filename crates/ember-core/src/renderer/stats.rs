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

//! Performance statistics for the rendering system.

use std::ops::AddAssign;

/// Counters gathered while executing a single frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// Records replayed from the command stream.
    pub commands_executed: u32,
    /// Draw calls issued.
    pub draw_calls: u32,
    /// Compute dispatches issued.
    pub dispatches: u32,
    /// Program binds.
    pub program_binds: u32,
    /// Texture-unit binds.
    pub texture_binds: u32,
    /// Shader-storage and atomic-counter binds.
    pub buffer_binds: u32,
    /// Raster-state backend calls (write mask, depth, blend, cull).
    pub state_changes: u32,
    /// Scissor changes.
    pub scissor_changes: u32,
    /// Vertex arrays created because the cache missed.
    pub vertex_array_misses: u32,
    /// Uniform uploads.
    pub uniform_uploads: u32,
    /// CPU time spent in the frame executor.
    pub cpu_time_ms: f32,
}

impl AddAssign<&RenderStats> for RenderStats {
    fn add_assign(&mut self, rhs: &RenderStats) {
        self.frame_number = self.frame_number.max(rhs.frame_number);
        self.commands_executed += rhs.commands_executed;
        self.draw_calls += rhs.draw_calls;
        self.dispatches += rhs.dispatches;
        self.program_binds += rhs.program_binds;
        self.texture_binds += rhs.texture_binds;
        self.buffer_binds += rhs.buffer_binds;
        self.state_changes += rhs.state_changes;
        self.scissor_changes += rhs.scissor_changes;
        self.vertex_array_misses += rhs.vertex_array_misses;
        self.uniform_uploads += rhs.uniform_uploads;
        self.cpu_time_ms += rhs.cpu_time_ms;
    }
}
