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

//! Defines the hierarchy of error types for the rendering subsystem.

use std::fmt;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
    /// Compute stage.
    Compute,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        })
    }
}

/// An error produced while turning shader source into a usable program.
///
/// These errors are not fatal to the engine; they are delivered to the
/// registered error callback with the backend's log text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// A stage failed to compile.
    CompilationFailed {
        /// The stage that failed.
        stage: ShaderStage,
        /// A descriptive label for the program.
        label: String,
        /// The compiler log.
        log: String,
    },
    /// The stages compiled but the program failed to link.
    LinkFailed {
        /// A descriptive label for the program.
        label: String,
        /// The linker log.
        log: String,
    },
    /// The linked program failed validation.
    ValidationFailed {
        /// A descriptive label for the program.
        label: String,
        /// The validation log.
        log: String,
    },
}

impl ShaderError {
    /// The backend log text attached to the error.
    pub fn log(&self) -> &str {
        match self {
            ShaderError::CompilationFailed { log, .. }
            | ShaderError::LinkFailed { log, .. }
            | ShaderError::ValidationFailed { log, .. } => log,
        }
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationFailed { stage, label, log } => {
                write!(f, "Shader compilation failed for '{label}' ({stage} stage): {log}")
            }
            ShaderError::LinkFailed { label, log } => {
                write!(f, "Program link failed for '{label}': {log}")
            }
            ShaderError::ValidationFailed { label, log } => {
                write!(f, "Program validation failed for '{label}': {log}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// The handle used to reference a resource is invalid.
    InvalidHandle,
    /// An update addressed bytes outside the resource.
    OutOfBounds {
        /// Requested byte offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Size of the resource.
        size: usize,
    },
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle."),
            ResourceError::OutOfBounds { offset, len, size } => write!(
                f,
                "Resource access out of bounds: {len} bytes at offset {offset} in a {size}-byte resource."
            ),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

/// A high-level error that can occur within the rendering system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The render thread stopped unexpectedly.
    RenderThreadLost,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::RenderThreadLost => write!(f, "The render thread terminated unexpectedly."),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::ResourceError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationFailed {
            stage: ShaderStage::Fragment,
            label: "sprite".to_string(),
            log: "0:3: syntax error".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for 'sprite' (fragment stage): 0:3: syntax error"
        );
        assert_eq!(err.log(), "0:3: syntax error");
    }

    #[test]
    fn render_error_display_wrapping_shader_error() {
        let shader_err = ShaderError::LinkFailed {
            label: "blit".to_string(),
            log: "missing main".to_string(),
        };
        let render_err: RenderError = shader_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Shader resource error: Program link failed for 'blit': missing main"
        );
        assert!(render_err.source().is_some());
        assert!(render_err.source().unwrap().source().is_some());
    }

    #[test]
    fn out_of_bounds_reports_sizes() {
        let err = ResourceError::OutOfBounds {
            offset: 60,
            len: 8,
            size: 64,
        };
        assert_eq!(
            err.to_string(),
            "Resource access out of bounds: 8 bytes at offset 60 in a 64-byte resource."
        );
    }
}
