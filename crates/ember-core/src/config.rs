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

//! Engine configuration.
//!
//! Every field has a default, so a configuration file only needs to name the
//! values it overrides:
//!
//! ```json
//! { "jobs": { "worker_count": 3 }, "frame_loop": { "fixed_step_ms": 16.0 } }
//! ```

use crate::renderer::descriptors::ClearValues;
use crate::renderer::limits::{
    DEFAULT_COMMAND_STREAM_BYTES, DEFAULT_MAX_DRAWS_PER_FRAME, DEFAULT_UNIFORM_ARENA_BYTES,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid JSON for this schema.
    #[error("failed to parse engine configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is outside its accepted range.
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Job scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Worker threads besides the bootstrap thread. `None` picks
    /// `available_parallelism() - 1`, at least one.
    pub worker_count: Option<usize>,
    /// Capacity of each work-stealing deque. Must be a power of two.
    pub max_jobs_per_queue: usize,
    /// Virtual address space reserved for each thread's job arena, in bytes.
    pub arena_bytes: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            max_jobs_per_queue: 128 * 1024,
            arena_bytes: 64 * 1024 * 1024,
        }
    }
}

impl JobConfig {
    /// The worker count after applying the hardware default.
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        })
    }
}

/// Renderer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Capacity of the per-frame draw, compute and key buffers.
    pub max_draws_per_frame: usize,
    /// Capacity of the per-frame uniform payload arena, in bytes.
    pub uniform_arena_bytes: usize,
    /// Capacity of each half of the command stream, in bytes.
    pub command_stream_bytes: usize,
    /// Default framebuffer clear colour.
    pub clear_color: [f32; 4],
    /// Default framebuffer clear depth.
    pub clear_depth: f32,
    /// Initial default framebuffer size in pixels.
    pub framebuffer_size: (u32, u32),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_draws_per_frame: DEFAULT_MAX_DRAWS_PER_FRAME,
            uniform_arena_bytes: DEFAULT_UNIFORM_ARENA_BYTES,
            command_stream_bytes: DEFAULT_COMMAND_STREAM_BYTES,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            framebuffer_size: (1280, 720),
        }
    }
}

impl RenderConfig {
    /// The clear applied to the default framebuffer at the start of each frame.
    pub fn clear_values(&self) -> ClearValues {
        ClearValues {
            color: Some(self.clear_color),
            depth: Some(self.clear_depth),
        }
    }
}

/// Fixed-step frame loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Simulation tick length in milliseconds.
    pub fixed_step_ms: f64,
    /// Optional upper bound on fixed updates run in one frame. When set, whole
    /// steps beyond it are dropped. Unset by default, so simulated time always
    /// tracks the clock to within one step.
    pub max_fixed_steps_per_frame: Option<u32>,
    /// Frames between two telemetry log lines; 0 disables the summary.
    pub telemetry_interval_frames: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fixed_step_ms: 10.0,
            max_fixed_steps_per_frame: None,
            telemetry_interval_frames: 600,
        }
    }
}

impl LoopConfig {
    /// The fixed step as a duration.
    pub fn fixed_step(&self) -> Duration {
        Duration::from_secs_f64(self.fixed_step_ms / 1000.0)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Job scheduler settings.
    pub jobs: JobConfig,
    /// Renderer settings.
    pub render: RenderConfig,
    /// Frame loop settings.
    pub frame_loop: LoopConfig,
}

impl EngineConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded engine configuration from '{}'.", path.display());
        Ok(config)
    }

    /// Checks the cross-field and range constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if !self.jobs.max_jobs_per_queue.is_power_of_two() {
            return Err(invalid(
                "jobs.max_jobs_per_queue",
                format!("{} is not a power of two", self.jobs.max_jobs_per_queue),
            ));
        }
        if self.jobs.worker_count == Some(0) {
            return Err(invalid("jobs.worker_count", "must be at least 1"));
        }
        if self.jobs.arena_bytes == 0 {
            return Err(invalid("jobs.arena_bytes", "must be non-zero"));
        }
        if self.render.max_draws_per_frame == 0 {
            return Err(invalid("render.max_draws_per_frame", "must be non-zero"));
        }
        if self.render.uniform_arena_bytes == 0 {
            return Err(invalid("render.uniform_arena_bytes", "must be non-zero"));
        }
        if self.render.command_stream_bytes == 0 {
            return Err(invalid("render.command_stream_bytes", "must be non-zero"));
        }
        if !(self.frame_loop.fixed_step_ms > 0.0 && self.frame_loop.fixed_step_ms.is_finite()) {
            return Err(invalid(
                "frame_loop.fixed_step_ms",
                format!("{} is not a positive duration", self.frame_loop.fixed_step_ms),
            ));
        }
        if self.frame_loop.max_fixed_steps_per_frame == Some(0) {
            return Err(invalid("frame_loop.max_fixed_steps_per_frame", "must be at least 1"));
        }
        Ok(())
    }
}
