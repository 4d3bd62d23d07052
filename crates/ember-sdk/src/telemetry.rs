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

//! Periodic engine statistics.

use ember_core::memory::stats as memory_stats;
use ember_core::renderer::RenderStats;
use ember_jobs::JobStats;
use std::time::Duration;

/// Aggregated figures for one telemetry window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryWindow {
    /// Frames in the window.
    pub frames: u64,
    /// Renderer counters summed over the window.
    pub render: RenderStats,
    /// Game-side frame time summed over the window.
    pub game_time: Duration,
    /// Longest game-side frame.
    pub worst_frame: Duration,
}

impl TelemetryWindow {
    /// Mean game-side frame time in milliseconds.
    pub fn average_frame_ms(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.game_time.as_secs_f64() * 1000.0 / self.frames as f64
    }

    /// Mean draw calls per frame.
    pub fn average_draw_calls(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        f64::from(self.render.draw_calls) / self.frames as f64
    }
}

/// Collects per-frame statistics and logs a summary every `interval` frames.
#[derive(Debug)]
pub struct Telemetry {
    interval: u64,
    window: TelemetryWindow,
    last_jobs: JobStats,
}

impl Telemetry {
    /// An `interval` of zero disables the summary.
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            window: TelemetryWindow::default(),
            last_jobs: JobStats::default(),
        }
    }

    /// Adds the stats of a rendered frame.
    pub fn record_render(&mut self, stats: &RenderStats) {
        self.window.render += stats;
    }

    /// Closes a game-side frame. Returns the finished window when a summary was
    /// logged.
    pub fn end_frame(&mut self, frame_time: Duration, jobs: JobStats) -> Option<TelemetryWindow> {
        self.window.frames += 1;
        self.window.game_time += frame_time;
        self.window.worst_frame = self.window.worst_frame.max(frame_time);

        if self.interval == 0 || self.window.frames < self.interval {
            return None;
        }
        let window = std::mem::take(&mut self.window);
        self.log_summary(&window, jobs);
        self.last_jobs = jobs;
        Some(window)
    }

    fn log_summary(&self, window: &TelemetryWindow, jobs: JobStats) {
        let memory = memory_stats::snapshot();
        log::info!("--- Telemetry Summary ({} frames) ---", window.frames);
        log::info!(
            "  Frame: {:.3} ms avg, {:.3} ms worst",
            window.average_frame_ms(),
            window.worst_frame.as_secs_f64() * 1000.0
        );
        log::info!(
            "  Render: {:.1} draws/frame, {} dispatches, {} program binds, {} state changes, {:.3} ms render CPU total",
            window.average_draw_calls(),
            window.render.dispatches,
            window.render.program_binds,
            window.render.state_changes,
            window.render.cpu_time_ms
        );
        log::info!(
            "  Jobs: {} created, {} executed, {} stolen, {} inline ({} workers)",
            jobs.created.saturating_sub(self.last_jobs.created),
            jobs.executed.saturating_sub(self.last_jobs.executed),
            jobs.stolen.saturating_sub(self.last_jobs.stolen),
            jobs.inline_overflows.saturating_sub(self.last_jobs.inline_overflows),
            jobs.workers
        );
        log::info!(
            "  Memory: {:.2} MB heap (peak {:.2} MB), {:.2} MB committed",
            memory.current_heap_bytes as f64 / (1024.0 * 1024.0),
            memory.peak_heap_bytes as f64 / (1024.0 * 1024.0),
            memory.committed_virtual_bytes as f64 / (1024.0 * 1024.0)
        );
        log::info!("-------------------------");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_window_resets_after_interval() {
        let mut telemetry = Telemetry::new(3);
        let stats = RenderStats {
            draw_calls: 4,
            ..RenderStats::default()
        };

        for frame in 0..2 {
            telemetry.record_render(&stats);
            assert!(telemetry
                .end_frame(Duration::from_millis(frame + 1), JobStats::default())
                .is_none());
        }
        telemetry.record_render(&stats);
        let window = telemetry
            .end_frame(Duration::from_millis(6), JobStats::default())
            .expect("third frame closes the window");

        assert_eq!(window.frames, 3);
        assert_eq!(window.render.draw_calls, 12);
        assert_eq!(window.worst_frame, Duration::from_millis(6));
        assert!((window.average_frame_ms() - 3.0).abs() < 1e-9);
        assert!((window.average_draw_calls() - 4.0).abs() < 1e-9);
        assert!(telemetry
            .end_frame(Duration::ZERO, JobStats::default())
            .is_none());
    }

    #[test]
    fn zero_interval_never_reports() {
        let mut telemetry = Telemetry::new(0);
        for _ in 0..10 {
            assert!(telemetry.end_frame(Duration::ZERO, JobStats::default()).is_none());
        }
    }
}
