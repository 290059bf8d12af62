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

use super::{Asset, AssetKind};
use crate::math::{degrees_to_radians, Aabb, LinearRgba, Mat4, Vec3};
use crate::renderer::gpu_types::CameraUniforms;
use serde::{Deserialize, Serialize};

/// The projection of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Perspective projection with a vertical field of view in degrees.
    Perspective {
        /// Vertical field of view in degrees.
        fov_degrees: f32,
    },
    /// Orthographic projection with a horizontal extent in world units.
    Orthographic {
        /// Width of the view volume.
        width: f32,
    },
}

/// A camera asset. Placement comes from the entity's transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera3D {
    /// The projection.
    pub projection: Projection,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Fixed aspect ratio; `None` follows the viewport.
    pub aspect_ratio: Option<f32>,
    /// Color the target is cleared to.
    pub clear_color: LinearRgba,
}

impl Asset for Camera3D {
    const KIND: AssetKind = AssetKind::Camera;
}

impl Camera3D {
    /// A perspective camera.
    pub fn perspective(fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_degrees },
            near,
            far,
            aspect_ratio: None,
            clear_color: LinearRgba::BLACK,
        }
    }

    /// An orthographic camera `width` units wide.
    pub fn orthographic(width: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic { width },
            near,
            far,
            aspect_ratio: None,
            clear_color: LinearRgba::BLACK,
        }
    }

    /// Fixes the aspect ratio.
    pub fn with_aspect_ratio(mut self, aspect: f32) -> Self {
        self.aspect_ratio = Some(aspect);
        self
    }

    /// The aspect ratio in use given the viewport's.
    pub fn resolve_aspect(&self, viewport_aspect: f32) -> f32 {
        self.aspect_ratio.unwrap_or(viewport_aspect)
    }

    /// The projection matrix for `aspect`.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_degrees } => {
                Mat4::perspective_rh_gl(degrees_to_radians(fov_degrees), aspect, self.near, self.far)
            }
            Projection::Orthographic { width } => {
                let half_w = width * 0.5;
                let half_h = width / aspect * 0.5;
                Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }

    /// Width and height of the view volume cross-section at `distance`.
    pub fn frustum_size_at(&self, distance: f32, aspect: f32) -> (f32, f32) {
        match self.projection {
            Projection::Perspective { fov_degrees } => {
                let height = 2.0 * (degrees_to_radians(fov_degrees) * 0.5).tan() * distance;
                (height * aspect, height)
            }
            Projection::Orthographic { width } => (width, width / aspect),
        }
    }

    /// World-space frustum corners: the four near corners, then the four far
    /// corners, each counter-clockwise from bottom-left.
    pub fn frustum_corners(&self, world: &Mat4, aspect: f32) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        for (plane, distance) in [self.near, self.far].into_iter().enumerate() {
            let (w, h) = self.frustum_size_at(distance, aspect);
            let (hw, hh) = (w * 0.5, h * 0.5);
            let local = [
                Vec3::new(-hw, -hh, -distance),
                Vec3::new(hw, -hh, -distance),
                Vec3::new(hw, hh, -distance),
                Vec3::new(-hw, hh, -distance),
            ];
            for (i, p) in local.into_iter().enumerate() {
                corners[plane * 4 + i] = world.transform_point3(p);
            }
        }
        corners
    }

    /// World-space bounding box of the frustum.
    pub fn bounding_box(&self, world: &Mat4, aspect: f32) -> Aabb {
        let corners = self.frustum_corners(world, aspect);
        Aabb::from_points(&corners).unwrap_or(Aabb::INVALID)
    }

    /// The parameters block for a camera placed by `world`.
    ///
    /// Returns `None` if `world` or the projection is singular.
    pub fn uniforms(&self, world: &Mat4, aspect: f32) -> Option<CameraUniforms> {
        let view = world.inverse()?;
        let proj = self.projection_matrix(aspect);
        let proj_inv = proj.inverse()?;
        Some(CameraUniforms {
            view,
            proj,
            proj_inv,
            view_proj: proj * view,
            position: world.translation(),
            near: self.near,
            far: self.far,
            _padding: [0.0; 3],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perspective_frustum_size_uses_tangent_of_half_fov() {
        let camera = Camera3D::perspective(90.0, 0.1, 100.0);
        let (w, h) = camera.frustum_size_at(10.0, 2.0);
        assert_relative_eq!(h, 20.0, epsilon = 1e-4);
        assert_relative_eq!(w, 40.0, epsilon = 1e-4);
    }

    #[test]
    fn orthographic_height_divides_width_by_aspect() {
        let camera = Camera3D::orthographic(16.0, 0.1, 50.0);
        assert_eq!(camera.frustum_size_at(25.0, 2.0), (16.0, 8.0));
    }

    #[test]
    fn bounding_box_follows_placement() {
        let camera = Camera3D::orthographic(2.0, 1.0, 3.0);
        let world = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let aabb = camera.bounding_box(&world, 1.0);
        assert_relative_eq!(aabb.min, Vec3::new(9.0, -1.0, -3.0));
        assert_relative_eq!(aabb.max, Vec3::new(11.0, 1.0, -1.0));
    }

    #[test]
    fn uniforms_invert_world_and_projection() {
        let camera = Camera3D::perspective(60.0, 0.5, 200.0);
        let world = Mat4::from_translation(Vec3::new(0.0, 2.0, 5.0));
        let uniforms = camera.uniforms(&world, 16.0 / 9.0).unwrap();
        assert_relative_eq!(uniforms.view * world, Mat4::IDENTITY, epsilon = 1e-5);
        assert_relative_eq!(uniforms.proj_inv * uniforms.proj, Mat4::IDENTITY, epsilon = 1e-4);
        assert_eq!(uniforms.position, Vec3::new(0.0, 2.0, 5.0));
    }
}
