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

//! Fixed-step timing with a variable-rate update.

use ember_core::config::LoopConfig;
use ember_core::Clock;
use std::time::Duration;

/// How much time one iteration of the frame loop covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    /// Wall time since the previous iteration.
    pub frame_dt: Duration,
    /// Fixed updates to run this iteration.
    pub fixed_steps: u32,
    /// Time discarded because the step clamp was hit.
    pub dropped: Duration,
}

/// Accumulates clock time and converts it into fixed simulation steps.
///
/// Each call to [`advance`](Self::advance) adds the time elapsed since the
/// previous call and returns how many whole steps it covers. The leftover stays
/// in the accumulator, so the simulated time never runs ahead of the clock and
/// never falls behind it by more than one step. Setting
/// `max_fixed_steps_per_frame` trades that guarantee for a bounded frame cost.
pub struct FrameLoop {
    clock: Box<dyn Clock>,
    fixed_step: Duration,
    max_steps: Option<u32>,
    last: Duration,
    accumulator: Duration,
    simulated: Duration,
}

impl FrameLoop {
    /// Starts the loop at the clock's current time.
    pub fn new(clock: Box<dyn Clock>, config: &LoopConfig) -> Self {
        let last = clock.now();
        Self {
            clock,
            fixed_step: config.fixed_step(),
            max_steps: config.max_fixed_steps_per_frame.map(|max| max.max(1)),
            last,
            accumulator: Duration::ZERO,
            simulated: Duration::ZERO,
        }
    }

    /// Length of one fixed step.
    pub fn fixed_step(&self) -> Duration {
        self.fixed_step
    }

    /// Total time covered by the fixed steps handed out so far.
    pub fn simulated(&self) -> Duration {
        self.simulated
    }

    /// Time not yet covered by a fixed step.
    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    /// Fraction of a step left in the accumulator, for render interpolation.
    pub fn alpha(&self) -> f32 {
        self.accumulator.as_secs_f32() / self.fixed_step.as_secs_f32()
    }

    /// Samples the clock and returns the work for this iteration.
    pub fn advance(&mut self) -> FrameTiming {
        let now = self.clock.now();
        let frame_dt = now.saturating_sub(self.last);
        self.last = now;
        self.accumulator += frame_dt;

        let mut fixed_steps = 0;
        let max_steps = self.max_steps.unwrap_or(u32::MAX);
        while self.accumulator >= self.fixed_step && fixed_steps < max_steps {
            self.accumulator -= self.fixed_step;
            self.simulated += self.fixed_step;
            fixed_steps += 1;
        }

        let mut dropped = Duration::ZERO;
        if self.accumulator >= self.fixed_step {
            let step = self.fixed_step.as_nanos();
            let excess = self.accumulator.as_nanos() / step * step;
            dropped = Duration::from_nanos(excess as u64);
            self.accumulator -= dropped;
            log::debug!(
                "Frame loop fell behind by {:.1} ms; dropped after {fixed_steps} fixed steps",
                dropped.as_secs_f64() * 1000.0
            );
        }

        FrameTiming {
            frame_dt,
            fixed_steps,
            dropped,
        }
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("fixed_step", &self.fixed_step)
            .field("max_steps", &self.max_steps)
            .field("accumulator", &self.accumulator)
            .field("simulated", &self.simulated)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::ManualClock;
    use proptest::prelude::*;

    fn config(step_ms: f64, max_steps: Option<u32>) -> LoopConfig {
        LoopConfig {
            fixed_step_ms: step_ms,
            max_fixed_steps_per_frame: max_steps,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn accumulates_partial_steps() {
        let clock = ManualClock::new();
        let mut frame_loop = FrameLoop::new(Box::new(clock.clone()), &config(10.0, Some(8)));

        clock.advance(Duration::from_millis(6));
        assert_eq!(frame_loop.advance().fixed_steps, 0);
        clock.advance(Duration::from_millis(6));
        let timing = frame_loop.advance();
        assert_eq!(timing.fixed_steps, 1);
        assert_eq!(timing.frame_dt, Duration::from_millis(6));
        assert_eq!(frame_loop.accumulator(), Duration::from_millis(2));
        assert!((frame_loop.alpha() - 0.2).abs() < 1e-4);
    }

    #[test]
    fn long_frames_are_clamped() {
        let clock = ManualClock::new();
        let mut frame_loop = FrameLoop::new(Box::new(clock.clone()), &config(10.0, Some(4)));

        clock.advance(Duration::from_millis(105));
        let timing = frame_loop.advance();
        assert_eq!(timing.fixed_steps, 4);
        assert_eq!(timing.dropped, Duration::from_millis(60));
        assert_eq!(frame_loop.accumulator(), Duration::from_millis(5));
        assert_eq!(frame_loop.simulated(), Duration::from_millis(40));
    }

    #[test]
    fn default_loop_catches_up_after_a_hitch() {
        // Arrange
        let clock = ManualClock::new();
        let mut frame_loop = FrameLoop::new(Box::new(clock.clone()), &LoopConfig::default());
        let step = frame_loop.fixed_step();

        // Act
        clock.advance(Duration::from_millis(200));
        let timing = frame_loop.advance();

        // Assert
        assert_eq!(timing.dropped, Duration::ZERO);
        assert_eq!(step * timing.fixed_steps, frame_loop.simulated());
        assert!(frame_loop.simulated() <= Duration::from_millis(200));
        assert!(frame_loop.simulated() + step >= Duration::from_millis(200));
        assert!(frame_loop.accumulator() < step);
    }

    proptest! {
        #[test]
        fn simulated_time_trails_the_clock_by_less_than_a_step(
            frames in prop::collection::vec(0u64..25_000, 1..200)
        ) {
            let clock = ManualClock::new();
            let mut frame_loop = FrameLoop::new(Box::new(clock.clone()), &LoopConfig::default());
            let step = frame_loop.fixed_step();
            let mut elapsed = Duration::ZERO;
            let mut stepped = Duration::ZERO;

            for micros in frames {
                let dt = Duration::from_micros(micros);
                clock.advance(dt);
                elapsed += dt;
                stepped += step * frame_loop.advance().fixed_steps;

                prop_assert!(stepped <= elapsed);
                prop_assert!(elapsed - stepped < step);
            }
        }
    }
}
