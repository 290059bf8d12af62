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

//! Bounding volumes used by frustum and cluster culling.

use super::Vec3;
use serde::{Deserialize, Serialize};

/// An Axis-Aligned Bounding Box.
///
/// Containment and intersection tests are inclusive: a point lying exactly on a
/// face is inside the box.
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Aabb {
    /// The corner with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An empty box that any merge overrides.
    pub const INVALID: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    /// Creates a box from two corners given in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates the tightest box enclosing `points`, or `None` when empty.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(
            rest.iter()
                .fold(Self::from_min_max(*first, *first), |acc, p| {
                    acc.merged_with_point(*p)
                }),
        )
    }

    /// Returns a box grown to include `point`.
    #[inline]
    pub fn merged_with_point(&self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// The center point of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the size of the box on each axis.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Radius of the sphere centered on [`Self::center`] that encloses the box.
    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.half_extents().length()
    }

    /// Checks whether `min <= max` on all axes.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Checks if a point is inside or on the boundary of the box.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Squared distance from `point` to the closest point of the box.
    ///
    /// Returns `0.0` for points inside the box.
    pub fn distance_to_point_squared(&self, point: Vec3) -> f32 {
        let axis = |p: f32, lo: f32, hi: f32| {
            if p < lo {
                lo - p
            } else if p > hi {
                p - hi
            } else {
                0.0
            }
        };
        let dx = axis(point.x, self.min.x, self.max.x);
        let dy = axis(point.y, self.min.y, self.max.y);
        let dz = axis(point.z, self.min.z, self.max.z);
        dx * dx + dy * dy + dz * dz
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_envelope() {
        let aabb = Aabb::from_points(&[
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(-2.0, 3.0, 1.0),
            Vec3::new(0.0, 0.0, -4.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-2.0, -1.0, -4.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 1.0));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn distance_is_zero_inside_and_on_faces() {
        let aabb = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.distance_to_point_squared(Vec3::new(0.5, 0.5, 0.5)), 0.0);
        assert_eq!(aabb.distance_to_point_squared(Vec3::new(1.0, 0.2, 0.0)), 0.0);
        assert_eq!(aabb.distance_to_point_squared(Vec3::new(3.0, 0.5, 0.5)), 4.0);
        assert_eq!(aabb.distance_to_point_squared(Vec3::new(2.0, 2.0, 0.5)), 2.0);
    }

    #[test]
    fn invalid_box_merges_into_point() {
        let p = Vec3::new(4.0, 5.0, 6.0);
        let aabb = Aabb::INVALID.merged_with_point(p);
        assert!(aabb.is_valid());
        assert!(aabb.contains_point(p));
        assert_eq!(aabb.bounding_radius(), 0.0);
    }
}
