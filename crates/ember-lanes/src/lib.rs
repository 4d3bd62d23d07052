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

//! Hot-path execution lanes of the Ember engine.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ember_core::config::RenderConfig;
//! use ember_core::event::EventBus;
//! use ember_core::renderer::{GraphicsBackend, ProgramHandle, RenderLayerHandle};
//! use ember_lanes::render_lane::{FrameChannel, RenderFrontend, Renderer};
//!
//! fn frame(backend: Box<dyn GraphicsBackend>, program: ProgramHandle) {
//!     let config = RenderConfig::default();
//!     let channel = Arc::new(FrameChannel::new(&config));
//!     let mut renderer = Renderer::new(backend, Arc::clone(&channel), &config, EventBus::new());
//!     let mut frontend = RenderFrontend::new(channel);
//!
//!     frontend.recorder().submit(RenderLayerHandle::from_index(0), program, 0, false);
//!     let stats = frontend.end_frame_local(&mut renderer);
//!     println!("{} draws", stats.draw_calls);
//! }
//! ```

#![warn(missing_docs)]

pub mod render_lane;
