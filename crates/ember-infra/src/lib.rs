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

//! Concrete implementations of the services the engine core consumes: an
//! OpenGL backend on `glow`, a recording headless backend, and a headless
//! input source.

#![warn(missing_docs)]

#[cfg(feature = "graphics")]
pub mod graphics;
#[cfg(feature = "platform")]
pub mod platform;

#[cfg(feature = "graphics")]
pub use graphics::glow::GlowBackend;
#[cfg(feature = "graphics")]
pub use graphics::headless::{BackendCall, CallLog, HeadlessBackend};
#[cfg(feature = "platform")]
pub use platform::headless::{HeadlessInput, InputChange, InputFeed};
