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

//! `#[repr(C)]` structures uploaded verbatim to GPU buffers.
//!
//! Each struct is laid out to match its `std140` block (or texel buffer)
//! declaration in the shaders, so it can be uploaded with
//! [`bytemuck::bytes_of`].

use crate::math::{Aabb, LinearRgba, Mat4, Vec3};
use bytemuck::{Pod, Zeroable};

/// Uniform block binding points shared by every program.
pub mod bindings {
    /// `CameraParameters` block.
    pub const CAMERA: u32 = 0;
    /// `MaterialParameters` block.
    pub const MATERIAL: u32 = 1;
    /// `ClusterParameters` block.
    pub const CLUSTERS: u32 = 2;
    /// `MeshParameters` block.
    pub const MESH: u32 = 3;
}

/// Texture units reserved for engine-wide texel buffers.
pub mod texture_units {
    /// Light parameters texel buffer.
    pub const LIGHTS: u32 = 0;
    /// Per-cluster light counts texel buffer.
    pub const CLUSTER_COUNTS: u32 = 1;
    /// Flat per-cluster light index texel buffer.
    pub const CLUSTER_INDICES: u32 = 2;
    /// First unit available to material textures.
    pub const FIRST_MATERIAL: u32 = 3;
}

/// The camera parameters block.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct CameraUniforms {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub proj: Mat4,
    /// Clip to view.
    pub proj_inv: Mat4,
    /// World to clip.
    pub view_proj: Mat4,
    /// Camera position in world space.
    pub position: Vec3,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Pads the block to a multiple of 16 bytes.
    pub _padding: [f32; 3],
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            proj_inv: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            position: Vec3::ZERO,
            near: 0.1,
            far: 100.0,
            _padding: [0.0; 3],
        }
    }
}

/// The mesh parameters block: object-space bounds of the drawn geometry.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct MeshUniforms {
    /// Smallest corner of the bounding box.
    pub bounds_min: Vec3,
    /// Aligns `bounds_max` to 16 bytes.
    pub _padding: f32,
    /// Largest corner of the bounding box.
    pub bounds_max: Vec3,
    /// Pads the block to 32 bytes.
    pub _padding2: f32,
}

impl From<Aabb> for MeshUniforms {
    fn from(bounds: Aabb) -> Self {
        Self {
            bounds_min: bounds.min,
            _padding: 0.0,
            bounds_max: bounds.max,
            _padding2: 0.0,
        }
    }
}

/// One entry of the light parameters array.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct LightParameters {
    /// Color with intensity folded in.
    pub color: LinearRgba,
    /// World-space position.
    pub position: Vec3,
    /// Influence radius; infinite for ambient and directional lights.
    pub range: f32,
    /// World-space forward direction.
    pub direction: Vec3,
    /// Light type code (see `LightType::gpu_code`).
    pub kind: u32,
    /// Inner cone half-angle in radians.
    pub inner_cone_angle: f32,
    /// Outer cone half-angle in radians.
    pub outer_cone_angle: f32,
    /// Shadow attenuation factor in `[0, 1]`.
    pub shadow_strength: f32,
    /// Pads the entry to 64 bytes.
    pub _padding: f32,
}

/// The cluster parameters block.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ClusterUniforms {
    /// `slice_count / log2(far / near)`.
    pub depth_slice_multiplier: f32,
    /// `log2(near) * depth_slice_multiplier`.
    pub depth_slice_subtractor: f32,
    /// Number of valid entries in `global_light_indices`.
    pub global_light_count: u32,
    /// Keeps the index array 16-byte aligned.
    pub _padding: u32,
    /// Global light indices, one per `ivec4` (only `x` is used).
    pub global_light_indices: [[u32; 4]; ClusterUniforms::MAX_GLOBAL_LIGHTS],
}

impl ClusterUniforms {
    /// Capacity of the global light list.
    pub const MAX_GLOBAL_LIGHTS: usize = 8;
}

impl Default for ClusterUniforms {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}
