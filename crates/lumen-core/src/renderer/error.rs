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

use super::descriptors::PixelFormat;
use super::uniform::UniformError;
use crate::asset::AssetError;
use crate::ecs::EntityId;
use std::fmt;

/// An error raised while compiling or linking a shader program.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// A stage failed to compile.
    CompilationFailed {
        /// A descriptive label for the program.
        label: String,
        /// The compiler log.
        details: String,
    },
    /// The stages compiled but failed to link.
    LinkFailed {
        /// A descriptive label for the program.
        label: String,
        /// The linker log.
        details: String,
    },
    /// The program declares no stage at all.
    MissingStages {
        /// A descriptive label for the program.
        label: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationFailed { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::LinkFailed { label, details } => {
                write!(f, "Program link failed for '{label}': {details}")
            }
            ShaderError::MissingStages { label } => {
                write!(f, "Program '{label}' declares no shader stage")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// The handle does not name a live object of the expected kind.
    InvalidHandle,
    /// A write or read fell outside the resource.
    OutOfBounds {
        /// Start of the access in bytes.
        offset: u64,
        /// Length of the access in bytes.
        len: u64,
        /// Size of the resource in bytes.
        size: u64,
    },
    /// The backend cannot create textures with this format.
    UnsupportedFormat(PixelFormat),
    /// The provided data does not match its description.
    InvalidData(String),
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
                "Access of {len} bytes at offset {offset} exceeds resource size {size}."
            ),
            ResourceError::UnsupportedFormat(format) => {
                write!(f, "Unsupported pixel format: {format:?}")
            }
            ResourceError::InvalidData(msg) => write!(f, "Invalid resource data: {msg}"),
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

/// A high-level error raised by the render thread or a resource manager.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A failure occurred while initializing the graphics backend.
    InitializationFailed(String),
    /// An error occurred while managing a GPU resource.
    Resource(ResourceError),
    /// A uniform block write was rejected.
    Uniform(UniformError),
    /// An asset or reference graph operation failed.
    Asset(AssetError),
    /// A GPU state required by an operation is not loaded.
    NotLoaded(EntityId),
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::Resource(err) => write!(f, "Graphics resource operation failed: {err}"),
            RenderError::Uniform(err) => write!(f, "Uniform block write failed: {err}"),
            RenderError::Asset(err) => write!(f, "Asset operation failed: {err}"),
            RenderError::NotLoaded(entity) => {
                write!(f, "GPU state of entity {entity} is not loaded")
            }
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Resource(err) => Some(err),
            RenderError::Uniform(err) => Some(err),
            RenderError::Asset(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::Resource(ResourceError::Shader(err))
    }
}

impl From<UniformError> for RenderError {
    fn from(err: UniformError) -> Self {
        RenderError::Uniform(err)
    }
}

impl From<AssetError> for RenderError {
    fn from(err: AssetError) -> Self {
        RenderError::Asset(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn resource_error_wraps_shader_error() {
        let shader_err = ShaderError::CompilationFailed {
            label: "Standard".to_string(),
            details: "0:12: syntax error".to_string(),
        };
        let res_err: ResourceError = shader_err.into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Shader compilation failed for 'Standard': 0:12: syntax error"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn render_error_chains_to_the_root_cause() {
        let render_err: RenderError = ShaderError::MissingStages {
            label: "Empty".to_string(),
        }
        .into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Shader resource error: Program 'Empty' declares no shader stage"
        );
        assert!(render_err.source().unwrap().source().is_some());
    }

    #[test]
    fn out_of_bounds_display() {
        let err = ResourceError::OutOfBounds {
            offset: 60,
            len: 8,
            size: 64,
        };
        assert_eq!(
            err.to_string(),
            "Access of 8 bytes at offset 60 exceeds resource size 64."
        );
    }
}
