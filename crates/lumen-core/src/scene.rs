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

//! Scene inputs consumed by the rendering core.

use crate::math::{Mat4, Vec3};

/// The world matrix of an entity, as produced by transform propagation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform(pub Mat4);

impl Transform {
    /// A transform placing the entity at `position`.
    pub fn from_translation(position: Vec3) -> Self {
        Self(Mat4::from_translation(position))
    }

    /// A transform at `eye` whose forward (`-Z`) axis points at `target`.
    ///
    /// Falls back to a plain translation if the view is degenerate.
    pub fn looking_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        Mat4::look_at_rh(eye, target, up)
            .inverse()
            .map(Self)
            .unwrap_or_else(|| Self::from_translation(eye))
    }

    /// World-space position.
    pub fn position(&self) -> Vec3 {
        self.0.translation()
    }

    /// World-space forward direction.
    pub fn forward(&self) -> Vec3 {
        self.0.transform_vector3(Vec3::NEG_Z).normalize()
    }
}
