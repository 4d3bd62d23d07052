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

//! Game-side systems driven by the frame loop.

use ember_core::event::RenderEvent;
use ember_core::platform::InputSnapshot;
use ember_jobs::JobSystem;
use ember_lanes::render_lane::RenderFrontend;
use std::time::Duration;

/// Timing of the current frame loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Frames completed before this one.
    pub frame: u64,
    /// Wall time since the previous iteration.
    pub delta: Duration,
    /// Length of one fixed step.
    pub fixed_step: Duration,
    /// Total simulated time.
    pub simulated: Duration,
    /// Fraction of a fixed step not yet simulated.
    pub alpha: f32,
}

/// Everything a system may touch during a callback.
pub struct SystemContext<'a> {
    pub(crate) jobs: &'a JobSystem,
    pub(crate) render: &'a mut RenderFrontend,
    pub(crate) input: &'a InputSnapshot,
    pub(crate) render_events: &'a [RenderEvent],
    pub(crate) time: FrameTime,
    pub(crate) quit: &'a mut bool,
}

impl SystemContext<'_> {
    /// The job system. Jobs must be waited on before the callback returns.
    pub fn jobs(&self) -> &JobSystem {
        self.jobs
    }

    /// The game-side renderer API.
    pub fn render(&mut self) -> &mut RenderFrontend {
        self.render
    }

    /// Input polled at the start of this frame.
    pub fn input(&self) -> &InputSnapshot {
        self.input
    }

    /// Renderer events received since the previous frame.
    pub fn render_events(&self) -> &[RenderEvent] {
        self.render_events
    }

    /// Timing of the current iteration.
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Asks the engine to stop after the current frame.
    pub fn quit(&mut self) {
        *self.quit = true;
    }

    /// Returns `true` once any system has asked to stop.
    pub fn quit_requested(&self) -> bool {
        *self.quit
    }
}

/// A unit of game logic owned by the engine.
///
/// Systems run on the game thread in registration order, for every callback.
pub trait System {
    /// A name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Runs once, before the first frame.
    fn initialize(&mut self, _ctx: &mut SystemContext<'_>) {}

    /// Runs zero or more times per frame, once per elapsed fixed step.
    fn fixed_update(&mut self, _ctx: &mut SystemContext<'_>) {}

    /// Runs once per frame with the frame's wall time.
    fn update(&mut self, _ctx: &mut SystemContext<'_>, _dt: Duration) {}

    /// Runs once per frame after every system's `update`.
    fn late_update(&mut self, _ctx: &mut SystemContext<'_>) {}
}
