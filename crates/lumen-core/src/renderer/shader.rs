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

//! Shader stages, parameter types and tagged parameter values.

use crate::asset::{Cubemap, Texture2D, TextureRef, Tileset2D};
use crate::math::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Geometry stage.
    Geometry,
    /// Fragment stage.
    Fragment,
    /// Compute stage.
    Compute,
}

/// The GLSL type of a declared shader parameter.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderParameterType {
    Bool,
    Int,
    UInt,
    Float,
    Double,
    Vector2,
    Vector3,
    Vector4,
    IntVector2,
    IntVector3,
    IntVector4,
    UIntVector2,
    UIntVector3,
    UIntVector4,
    BoolVector2,
    BoolVector3,
    BoolVector4,
    DoubleVector2,
    DoubleVector3,
    DoubleVector4,
    Matrix2x2,
    Matrix3x3,
    Matrix4x4,
    /// A `sampler2D`. Samplers live outside uniform blocks and are bound to
    /// texture units instead.
    Texture,
}

impl ShaderParameterType {
    /// Returns `true` for sampler types, which take no space in a uniform block.
    #[inline]
    pub const fn is_texture(&self) -> bool {
        matches!(self, ShaderParameterType::Texture)
    }
}

impl fmt::Display for ShaderParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A dynamically typed shader parameter value.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShaderValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    IntVector2([i32; 2]),
    IntVector3([i32; 3]),
    IntVector4([i32; 4]),
    UIntVector2([u32; 2]),
    UIntVector3([u32; 3]),
    UIntVector4([u32; 4]),
    BoolVector2([bool; 2]),
    BoolVector3([bool; 3]),
    BoolVector4([bool; 4]),
    DoubleVector2([f64; 2]),
    DoubleVector3([f64; 3]),
    DoubleVector4([f64; 4]),
    /// Column-major 2x2 matrix.
    Matrix2x2([[f32; 2]; 2]),
    /// Column-major 3x3 matrix.
    Matrix3x3([[f32; 3]; 3]),
    Matrix4x4(Mat4),
    /// A texture asset, or `None` to leave the sampler unbound.
    Texture(Option<TextureRef>),
}

impl ShaderValue {
    /// The parameter type this value can be written to.
    pub fn parameter_type(&self) -> ShaderParameterType {
        use ShaderParameterType as T;
        match self {
            ShaderValue::Bool(_) => T::Bool,
            ShaderValue::Int(_) => T::Int,
            ShaderValue::UInt(_) => T::UInt,
            ShaderValue::Float(_) => T::Float,
            ShaderValue::Double(_) => T::Double,
            ShaderValue::Vector2(_) => T::Vector2,
            ShaderValue::Vector3(_) => T::Vector3,
            ShaderValue::Vector4(_) => T::Vector4,
            ShaderValue::IntVector2(_) => T::IntVector2,
            ShaderValue::IntVector3(_) => T::IntVector3,
            ShaderValue::IntVector4(_) => T::IntVector4,
            ShaderValue::UIntVector2(_) => T::UIntVector2,
            ShaderValue::UIntVector3(_) => T::UIntVector3,
            ShaderValue::UIntVector4(_) => T::UIntVector4,
            ShaderValue::BoolVector2(_) => T::BoolVector2,
            ShaderValue::BoolVector3(_) => T::BoolVector3,
            ShaderValue::BoolVector4(_) => T::BoolVector4,
            ShaderValue::DoubleVector2(_) => T::DoubleVector2,
            ShaderValue::DoubleVector3(_) => T::DoubleVector3,
            ShaderValue::DoubleVector4(_) => T::DoubleVector4,
            ShaderValue::Matrix2x2(_) => T::Matrix2x2,
            ShaderValue::Matrix3x3(_) => T::Matrix3x3,
            ShaderValue::Matrix4x4(_) => T::Matrix4x4,
            ShaderValue::Texture(_) => T::Texture,
        }
    }

    /// Returns the texture asset if this is a bound texture value.
    pub fn as_texture(&self) -> Option<&TextureRef> {
        match self {
            ShaderValue::Texture(Some(texture)) => Some(texture),
            _ => None,
        }
    }
}

impl From<f32> for ShaderValue {
    fn from(v: f32) -> Self {
        ShaderValue::Float(v)
    }
}

impl From<i32> for ShaderValue {
    fn from(v: i32) -> Self {
        ShaderValue::Int(v)
    }
}

impl From<Vec3> for ShaderValue {
    fn from(v: Vec3) -> Self {
        ShaderValue::Vector3(v)
    }
}

impl From<Vec4> for ShaderValue {
    fn from(v: Vec4) -> Self {
        ShaderValue::Vector4(v)
    }
}

impl From<Mat4> for ShaderValue {
    fn from(v: Mat4) -> Self {
        ShaderValue::Matrix4x4(v)
    }
}

impl From<TextureRef> for ShaderValue {
    fn from(v: TextureRef) -> Self {
        ShaderValue::Texture(Some(v))
    }
}

impl From<Arc<Texture2D>> for ShaderValue {
    fn from(v: Arc<Texture2D>) -> Self {
        ShaderValue::Texture(Some(v.into()))
    }
}

impl From<Arc<Cubemap>> for ShaderValue {
    fn from(v: Arc<Cubemap>) -> Self {
        ShaderValue::Texture(Some(v.into()))
    }
}

impl From<Arc<Tileset2D>> for ShaderValue {
    fn from(v: Arc<Tileset2D>) -> Self {
        ShaderValue::Texture(Some(v.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_report_their_type() {
        assert_eq!(ShaderValue::from(1.0f32).parameter_type(), ShaderParameterType::Float);
        assert_eq!(
            ShaderValue::from(Vec3::ONE).parameter_type(),
            ShaderParameterType::Vector3
        );
        assert_eq!(
            ShaderValue::Texture(None).parameter_type(),
            ShaderParameterType::Texture
        );
        assert!(ShaderValue::Texture(None).as_texture().is_none());
    }
}
