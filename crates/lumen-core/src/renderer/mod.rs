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

//! The contract between the rendering core and an OpenGL-class backend.
//!
//! Everything in this module is backend-agnostic: typed handles, resource
//! descriptors, the [`GraphicsDevice`] trait, shader parameter types and the
//! uniform block layout rules.

pub mod descriptors;
pub mod device;
pub mod error;
pub mod gpu_types;
pub mod handles;
pub mod shader;
pub mod uniform;

pub use self::descriptors::*;
pub use self::device::GraphicsDevice;
pub use self::error::{RenderError, ResourceError, ShaderError};
pub use self::handles::{BufferHandle, FramebufferHandle, ProgramHandle, TextureHandle};
pub use self::shader::{ShaderParameterType, ShaderStage, ShaderValue};
pub use self::uniform::{UniformBlockLayout, UniformError, UniformParameter};
