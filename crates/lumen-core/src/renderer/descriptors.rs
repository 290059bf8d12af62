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

//! Plain-data descriptions of the GPU objects a [`GraphicsDevice`] creates.
//!
//! [`GraphicsDevice`]: super::GraphicsDevice

use super::handles::{BufferHandle, ProgramHandle, TextureHandle};
use super::shader::ShaderStage;
use crate::math::LinearRgba;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The binding target a buffer is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex or per-instance attribute data.
    Vertex,
    /// Element indices.
    Index,
    /// A uniform block backing store.
    Uniform,
    /// Storage sampled through a texture buffer.
    Texel,
}

/// How often the contents of a buffer are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    #[default]
    Static,
    /// Rewritten occasionally.
    Dynamic,
    /// Rewritten every frame.
    Stream,
}

/// Describes a buffer to create.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The binding target.
    pub target: BufferTarget,
    /// The expected update frequency.
    pub usage: BufferUsage,
    /// The size in bytes.
    pub size: u64,
}

/// Pixel formats a texture can be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit single channel.
    R8,
    /// 8-bit two channels.
    Rg8,
    /// 8-bit three channels.
    Rgb8,
    /// 8-bit four channels.
    Rgba8,
    /// 32-bit float single channel.
    R32Float,
    /// 32-bit unsigned integer single channel.
    R32Uint,
    /// 16-bit float four channels.
    Rgba16Float,
    /// 32-bit float four channels.
    Rgba32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
}

impl PixelFormat {
    /// Size of a single pixel in bytes.
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rg8 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 | PixelFormat::R32Float | PixelFormat::R32Uint => 4,
            PixelFormat::Depth24Stencil8 => 4,
            PixelFormat::Rgba16Float => 8,
            PixelFormat::Rgba32Float => 16,
        }
    }
}

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureWrap {
    /// Tile the texture.
    #[default]
    Repeat,
    /// Tile the texture, mirroring every other repetition.
    MirroredRepeat,
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Use the border color.
    ClampToBorder,
}

/// Texel filtering as authored on a texture asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFilter {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    #[default]
    Linear,
}

/// Minification filter as understood by the backend, including mip selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinFilter {
    /// Nearest texel, no mipmaps.
    Nearest,
    /// Linear, no mipmaps.
    Linear,
    /// Nearest texel in the nearest mip level.
    NearestMipmapNearest,
    /// Linear interpolation across and between mip levels.
    LinearMipmapLinear,
}

impl MinFilter {
    /// Resolves an authored filter, using mip selection only when the texture
    /// actually has mipmaps.
    pub const fn resolve(filter: TextureFilter, mipmaps: bool) -> Self {
        match (filter, mipmaps) {
            (TextureFilter::Nearest, false) => MinFilter::Nearest,
            (TextureFilter::Linear, false) => MinFilter::Linear,
            (TextureFilter::Nearest, true) => MinFilter::NearestMipmapNearest,
            (TextureFilter::Linear, true) => MinFilter::LinearMipmapLinear,
        }
    }
}

/// Sampler state applied to a texture object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerState {
    /// Wrap mode along U.
    pub wrap_u: TextureWrap,
    /// Wrap mode along V.
    pub wrap_v: TextureWrap,
    /// Wrap mode along W, used by cube maps.
    pub wrap_w: TextureWrap,
    /// Minification filter.
    pub min_filter: MinFilter,
    /// Magnification filter.
    pub mag_filter: TextureFilter,
    /// Color used by [`TextureWrap::ClampToBorder`].
    pub border_color: LinearRgba,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            wrap_u: TextureWrap::Repeat,
            wrap_v: TextureWrap::Repeat,
            wrap_w: TextureWrap::Repeat,
            min_filter: MinFilter::Linear,
            mag_filter: TextureFilter::Linear,
            border_color: LinearRgba::TRANSPARENT,
        }
    }
}

/// The shape of a texture's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// A single 2D image.
    #[default]
    D2,
    /// A stack of equally sized 2D layers.
    D2Array {
        /// Number of layers.
        layers: u32,
    },
    /// Six square faces in `+X, -X, +Y, -Y, +Z, -Z` order.
    Cube,
}

impl TextureDimension {
    /// Number of 2D images making up the storage.
    pub const fn layers(self) -> u32 {
        match self {
            TextureDimension::D2 => 1,
            TextureDimension::D2Array { layers } => layers,
            TextureDimension::Cube => 6,
        }
    }
}

/// Describes a texture to create and upload.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Storage shape.
    pub dimension: TextureDimension,
    /// Width in pixels of one layer.
    pub width: u32,
    /// Height in pixels of one layer.
    pub height: u32,
    /// Pixel format of `data`.
    pub format: PixelFormat,
    /// Initial pixel data: every layer in order, each as tightly packed
    /// rows. `None` allocates storage only.
    pub data: Option<&'a [u8]>,
    /// Whether to generate a full mip chain after upload.
    pub mipmaps: bool,
    /// Initial sampler state.
    pub sampler: SamplerState,
}

/// Describes a shader program to compile and link.
#[derive(Debug, Clone)]
pub struct ProgramDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Final stage sources, already prefixed with version and defines.
    pub stages: &'a [(ShaderStage, String)],
    /// Varyings captured by transform feedback.
    pub feedback_varyings: &'a [String],
}

/// Describes a framebuffer made of existing textures.
#[derive(Debug, Clone, Default)]
pub struct FramebufferDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Color attachments in attachment order.
    pub color_attachments: Vec<TextureHandle>,
    /// Depth(-stencil) attachment.
    pub depth_attachment: Option<TextureHandle>,
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimitiveTopology {
    /// Individual points.
    Points,
    /// Independent line segments.
    Lines,
    /// A connected polyline.
    LineStrip,
    /// Independent triangles.
    #[default]
    Triangles,
    /// A triangle strip.
    TriangleStrip,
}

/// Face culling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Both faces are drawn.
    None,
    /// Back faces are discarded.
    #[default]
    Back,
}

/// The attribute channels a mesh can provide, in attribute-location order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexChannel {
    /// Positions (`vec3`).
    Position = 0,
    /// Normals (`vec3`).
    Normal = 1,
    /// Texture coordinates (`vec2`).
    TexCoord = 2,
    /// Tangents (`vec3`).
    Tangent = 3,
}

impl VertexChannel {
    /// Number of attribute channels.
    pub const COUNT: usize = 4;
}

/// An instanced draw of one mesh with one program.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// The program to draw with.
    pub program: ProgramHandle,
    /// How the vertices are assembled.
    pub topology: PrimitiveTopology,
    /// Attribute buffers indexed by [`VertexChannel`].
    pub vertex_buffers: [Option<BufferHandle>; VertexChannel::COUNT],
    /// Index buffer, for indexed draws.
    pub index_buffer: Option<BufferHandle>,
    /// Number of indices (or vertices when not indexed).
    pub element_count: u32,
    /// Buffer of per-instance world matrices.
    pub instance_buffer: BufferHandle,
    /// Number of instances to draw.
    pub instance_count: u32,
}
