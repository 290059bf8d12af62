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

use super::{Asset, AssetKind, Material};
use crate::math::{Aabb, Vec2, Vec3};
use crate::renderer::PrimitiveTopology;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mesh geometry.
///
/// Each attribute channel is an immutable shared array. Two `MeshData` values
/// with equal contents share one GPU data buffer; two values holding the same
/// channel array (the same `Arc`) also share that channel's GPU buffer even if
/// their other channels differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    /// Primitive assembly.
    pub topology: PrimitiveTopology,
    /// Vertex positions.
    pub vertices: Arc<[Vec3]>,
    /// Vertex normals.
    pub normals: Option<Arc<[Vec3]>>,
    /// Texture coordinates.
    pub tex_coords: Option<Arc<[Vec2]>>,
    /// Tangents.
    pub tangents: Option<Arc<[Vec3]>>,
    /// Element indices.
    pub indices: Option<Arc<[u32]>>,
}

impl Asset for MeshData {
    const KIND: AssetKind = AssetKind::MeshData;
}

impl MeshData {
    /// Creates non-indexed geometry from positions.
    pub fn new(topology: PrimitiveTopology, vertices: impl Into<Arc<[Vec3]>>) -> Self {
        Self {
            topology,
            vertices: vertices.into(),
            normals: None,
            tex_coords: None,
            tangents: None,
            indices: None,
        }
    }

    /// Sets the normals channel.
    pub fn with_normals(mut self, normals: impl Into<Arc<[Vec3]>>) -> Self {
        self.normals = Some(normals.into());
        self
    }

    /// Sets the texture coordinates channel.
    pub fn with_tex_coords(mut self, tex_coords: impl Into<Arc<[Vec2]>>) -> Self {
        self.tex_coords = Some(tex_coords.into());
        self
    }

    /// Sets the tangents channel.
    pub fn with_tangents(mut self, tangents: impl Into<Arc<[Vec3]>>) -> Self {
        self.tangents = Some(tangents.into());
        self
    }

    /// Sets the index channel.
    pub fn with_indices(mut self, indices: impl Into<Arc<[u32]>>) -> Self {
        self.indices = Some(indices.into());
        self
    }

    /// Number of elements a draw consumes.
    pub fn element_count(&self) -> u32 {
        let count = match &self.indices {
            Some(indices) => indices.len(),
            None => self.vertices.len(),
        };
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Object-space bounds of the vertices.
    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices)
    }
}

/// A renderable mesh: geometry drawn with a material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh3D {
    /// The geometry.
    pub data: Arc<MeshData>,
    /// The material.
    pub material: Arc<Material>,
}

impl Asset for Mesh3D {
    const KIND: AssetKind = AssetKind::Mesh;
}

impl Mesh3D {
    /// Creates a mesh.
    pub fn new(data: Arc<MeshData>, material: Arc<Material>) -> Self {
        Self { data, material }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_count_prefers_indices() {
        let data = MeshData::new(
            PrimitiveTopology::Triangles,
            vec![Vec3::ZERO, Vec3::ONE, Vec3::Y],
        );
        assert_eq!(data.element_count(), 3);
        let indexed = data.with_indices(vec![0, 1, 2, 2, 1, 0]);
        assert_eq!(indexed.element_count(), 6);
        assert_eq!(indexed.bounding_box().unwrap().max, Vec3::ONE);
    }
}
