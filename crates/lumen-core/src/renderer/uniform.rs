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

//! Uniform block layout engine.
//!
//! Computes `std140` byte offsets for an ordered list of named parameters and
//! writes tagged [`ShaderValue`]s into a raw byte block at those offsets. The
//! rules applied here are the subset of `std140` that non-array members need:
//!
//! | Type | Alignment | Size |
//! |---|---|---|
//! | `bool`, `int`, `uint`, `float` | 4 | 4 |
//! | `double`, two-component vectors | 8 | 8 |
//! | three-component vectors | 16 | 12 |
//! | four-component vectors, `dvec2` | 16 | 16 |
//! | `dvec3`, `dvec4` | 32 | 24, 32 |
//! | `matN` | 16 | `N` columns of 16 bytes |
//!
//! Samplers take no space in the block; they are listed separately so callers
//! can bind them to texture units.

use super::shader::{ShaderParameterType, ShaderValue};
use bytemuck::Pod;
use std::fmt;

/// Errors raised by uniform block writes.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformError {
    /// The value's type does not match the declared parameter type.
    TypeMismatch {
        /// The declared type.
        expected: ShaderParameterType,
        /// The type of the provided value.
        actual: ShaderParameterType,
    },
    /// The slot does not fit inside the block.
    OutOfBounds {
        /// Offset of the slot in bytes.
        offset: usize,
        /// Size of the slot in bytes.
        size: usize,
        /// Size of the block in bytes.
        block_size: usize,
    },
    /// No parameter with this name is declared.
    UnknownParameter(String),
}

impl fmt::Display for UniformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {expected}, got {actual}")
            }
            UniformError::OutOfBounds {
                offset,
                size,
                block_size,
            } => write!(
                f,
                "Slot of {size} bytes at offset {offset} exceeds block size {block_size}"
            ),
            UniformError::UnknownParameter(name) => write!(f, "Unknown parameter '{name}'"),
        }
    }
}

impl std::error::Error for UniformError {}

impl ShaderParameterType {
    /// Base alignment in bytes under `std140`.
    pub const fn std140_alignment(&self) -> usize {
        use ShaderParameterType as T;
        match self {
            T::Bool | T::Int | T::UInt | T::Float => 4,
            T::Double | T::Vector2 | T::IntVector2 | T::UIntVector2 | T::BoolVector2 => 8,
            T::Vector3 | T::IntVector3 | T::UIntVector3 | T::BoolVector3 => 16,
            T::Vector4 | T::IntVector4 | T::UIntVector4 | T::BoolVector4 => 16,
            T::DoubleVector2 => 16,
            T::DoubleVector3 | T::DoubleVector4 => 32,
            T::Matrix2x2 | T::Matrix3x3 | T::Matrix4x4 => 16,
            T::Texture => 1,
        }
    }

    /// Size in bytes occupied under `std140`.
    pub const fn std140_size(&self) -> usize {
        use ShaderParameterType as T;
        match self {
            T::Bool | T::Int | T::UInt | T::Float => 4,
            T::Double | T::Vector2 | T::IntVector2 | T::UIntVector2 | T::BoolVector2 => 8,
            T::Vector3 | T::IntVector3 | T::UIntVector3 | T::BoolVector3 => 12,
            T::Vector4 | T::IntVector4 | T::UIntVector4 | T::BoolVector4 => 16,
            T::DoubleVector2 => 16,
            T::DoubleVector3 => 24,
            T::DoubleVector4 => 32,
            T::Matrix2x2 => 32,
            T::Matrix3x3 => 48,
            T::Matrix4x4 => 64,
            T::Texture => 0,
        }
    }
}

/// A parameter placed inside a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformParameter {
    /// The parameter name as declared in the shader.
    pub name: String,
    /// The declared type.
    pub ty: ShaderParameterType,
    /// Byte offset from the start of the block.
    pub offset: usize,
}

/// The computed `std140` layout of a parameter list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformBlockLayout {
    parameters: Vec<UniformParameter>,
    textures: Vec<String>,
    size: usize,
}

#[inline]
const fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl UniformBlockLayout {
    /// Lays out `declarations` in order.
    ///
    /// The total size is rounded up to 16 bytes, the granularity at which a
    /// block is bound.
    pub fn new<'a>(declarations: impl IntoIterator<Item = (&'a str, ShaderParameterType)>) -> Self {
        let mut layout = Self::default();
        let mut cursor = 0;
        for (name, ty) in declarations {
            if ty.is_texture() {
                layout.textures.push(name.to_owned());
                continue;
            }
            let offset = align_up(cursor, ty.std140_alignment());
            layout.parameters.push(UniformParameter {
                name: name.to_owned(),
                ty,
                offset,
            });
            cursor = offset + ty.std140_size();
        }
        layout.size = align_up(cursor, 16);
        layout
    }

    /// Looks up a block parameter by name.
    pub fn get(&self, name: &str) -> Option<&UniformParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Returns `true` if `name` is a declared sampler.
    pub fn is_texture(&self, name: &str) -> bool {
        self.textures.iter().any(|t| t == name)
    }

    /// The parameters placed in the block, in declaration order.
    pub fn parameters(&self) -> &[UniformParameter] {
        &self.parameters
    }

    /// The declared samplers, in declaration order.
    pub fn textures(&self) -> &[String] {
        &self.textures
    }

    /// Block size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Allocates a zeroed block of [`Self::size`] bytes.
    pub fn allocate(&self) -> Vec<u8> {
        vec![0; self.size]
    }
}

fn slot_mut(block: &mut [u8], offset: usize, ty: ShaderParameterType) -> Result<&mut [u8], UniformError> {
    let size = ty.std140_size();
    let block_size = block.len();
    block
        .get_mut(offset..offset.saturating_add(size))
        .ok_or(UniformError::OutOfBounds {
            offset,
            size,
            block_size,
        })
}

#[inline]
fn put<T: Pod>(slot: &mut [u8], at: usize, value: &T) {
    let bytes = bytemuck::bytes_of(value);
    slot[at..at + bytes.len()].copy_from_slice(bytes);
}

/// Writes `value` into `block` at `offset` as a parameter of type `ty`.
///
/// The value's type must match `ty` exactly. Nothing is written on error.
/// Sampler parameters occupy no bytes, so writing a texture value is a no-op.
///
/// # Errors
/// * [`UniformError::TypeMismatch`] if the value has another type.
/// * [`UniformError::OutOfBounds`] if the slot does not fit in `block`.
pub fn set_parameter(
    block: &mut [u8],
    offset: usize,
    ty: ShaderParameterType,
    value: &ShaderValue,
) -> Result<(), UniformError> {
    let actual = value.parameter_type();
    if actual != ty {
        return Err(UniformError::TypeMismatch {
            expected: ty,
            actual,
        });
    }
    let slot = slot_mut(block, offset, ty)?;
    match value {
        ShaderValue::Bool(v) => put(slot, 0, &u32::from(*v)),
        ShaderValue::Int(v) => put(slot, 0, v),
        ShaderValue::UInt(v) => put(slot, 0, v),
        ShaderValue::Float(v) => put(slot, 0, v),
        ShaderValue::Double(v) => put(slot, 0, v),
        ShaderValue::Vector2(v) => put(slot, 0, v),
        ShaderValue::Vector3(v) => put(slot, 0, v),
        ShaderValue::Vector4(v) => put(slot, 0, v),
        ShaderValue::IntVector2(v) => put(slot, 0, v),
        ShaderValue::IntVector3(v) => put(slot, 0, v),
        ShaderValue::IntVector4(v) => put(slot, 0, v),
        ShaderValue::UIntVector2(v) => put(slot, 0, v),
        ShaderValue::UIntVector3(v) => put(slot, 0, v),
        ShaderValue::UIntVector4(v) => put(slot, 0, v),
        ShaderValue::BoolVector2(v) => put(slot, 0, &v.map(u32::from)),
        ShaderValue::BoolVector3(v) => put(slot, 0, &v.map(u32::from)),
        ShaderValue::BoolVector4(v) => put(slot, 0, &v.map(u32::from)),
        ShaderValue::DoubleVector2(v) => put(slot, 0, v),
        ShaderValue::DoubleVector3(v) => put(slot, 0, v),
        ShaderValue::DoubleVector4(v) => put(slot, 0, v),
        // Matrix columns are padded to a vec4 stride.
        ShaderValue::Matrix2x2(cols) => {
            for (i, col) in cols.iter().enumerate() {
                put(slot, i * 16, col);
            }
        }
        ShaderValue::Matrix3x3(cols) => {
            for (i, col) in cols.iter().enumerate() {
                put(slot, i * 16, col);
            }
        }
        ShaderValue::Matrix4x4(m) => put(slot, 0, m),
        ShaderValue::Texture(_) => {}
    }
    Ok(())
}

/// Zeroes the byte range of a parameter of type `ty` at `offset`.
///
/// # Errors
/// * [`UniformError::OutOfBounds`] if the slot does not fit in `block`.
pub fn clear_parameter(
    block: &mut [u8],
    offset: usize,
    ty: ShaderParameterType,
) -> Result<(), UniformError> {
    slot_mut(block, offset, ty)?.fill(0);
    Ok(())
}

/// A CPU-side uniform block paired with its layout.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    layout: UniformBlockLayout,
    bytes: Vec<u8>,
}

impl UniformBlock {
    /// Allocates a zeroed block for `layout`.
    pub fn new(layout: UniformBlockLayout) -> Self {
        let bytes = layout.allocate();
        Self { layout, bytes }
    }

    /// Writes a named parameter.
    pub fn set(&mut self, name: &str, value: &ShaderValue) -> Result<(), UniformError> {
        let param = self
            .layout
            .get(name)
            .ok_or_else(|| UniformError::UnknownParameter(name.to_owned()))?;
        set_parameter(&mut self.bytes, param.offset, param.ty, value)
    }

    /// Zeroes a named parameter.
    pub fn clear(&mut self, name: &str) -> Result<(), UniformError> {
        let param = self
            .layout
            .get(name)
            .ok_or_else(|| UniformError::UnknownParameter(name.to_owned()))?;
        clear_parameter(&mut self.bytes, param.offset, param.ty)
    }

    /// The block layout.
    pub fn layout(&self) -> &UniformBlockLayout {
        &self.layout
    }

    /// The raw block contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the block, returning its contents.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
