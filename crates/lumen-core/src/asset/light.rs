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
use crate::math::{LinearRgba, Mat4, Vec3};
use crate::renderer::gpu_types::LightParameters;
use serde::{Deserialize, Serialize};

/// The kind of a light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    /// Uniform light from every direction.
    Ambient,
    /// Parallel rays, like the sun.
    Directional,
    /// Omnidirectional with a finite range.
    Point,
    /// A cone with a finite range.
    Spot,
}

impl LightType {
    /// The code stored in [`LightParameters::kind`].
    pub const fn gpu_code(&self) -> u32 {
        match self {
            LightType::Ambient => 0,
            LightType::Directional => 1,
            LightType::Point => 2,
            LightType::Spot => 3,
        }
    }

    /// Returns `true` for lights that affect the whole scene regardless of
    /// distance.
    pub const fn is_global(&self) -> bool {
        matches!(self, LightType::Ambient | LightType::Directional)
    }
}

/// A light asset. Position and direction come from the entity's transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light3D {
    /// Light type.
    pub kind: LightType,
    /// Base color.
    pub color: LinearRgba,
    /// Scales the color.
    pub intensity: f32,
    /// Influence radius for point and spot lights.
    pub range: f32,
    /// Inner cone half-angle in radians (spot lights).
    pub inner_cone_angle: f32,
    /// Outer cone half-angle in radians (spot lights).
    pub outer_cone_angle: f32,
    /// Shadow attenuation factor in `[0, 1]`.
    pub shadow_strength: f32,
}

impl Asset for Light3D {
    const KIND: AssetKind = AssetKind::Light;
}

impl Light3D {
    fn with_kind(kind: LightType, color: LinearRgba, intensity: f32) -> Self {
        Self {
            kind,
            color,
            intensity,
            range: f32::INFINITY,
            inner_cone_angle: 0.0,
            outer_cone_angle: 0.0,
            shadow_strength: 1.0,
        }
    }

    /// An ambient light.
    pub fn ambient(color: LinearRgba, intensity: f32) -> Self {
        Self::with_kind(LightType::Ambient, color, intensity)
    }

    /// A directional light.
    pub fn directional(color: LinearRgba, intensity: f32) -> Self {
        Self::with_kind(LightType::Directional, color, intensity)
    }

    /// A point light reaching `range` world units.
    pub fn point(color: LinearRgba, intensity: f32, range: f32) -> Self {
        Self {
            range,
            ..Self::with_kind(LightType::Point, color, intensity)
        }
    }

    /// A spot light reaching `range` world units with the given cone half-angles.
    pub fn spot(color: LinearRgba, intensity: f32, range: f32, inner: f32, outer: f32) -> Self {
        Self {
            range,
            inner_cone_angle: inner,
            outer_cone_angle: outer,
            ..Self::with_kind(LightType::Spot, color, intensity)
        }
    }

    /// Sets the shadow strength.
    pub fn with_shadow_strength(mut self, strength: f32) -> Self {
        self.shadow_strength = strength.clamp(0.0, 1.0);
        self
    }

    /// The range used for culling: infinite for global light types.
    pub fn effective_range(&self) -> f32 {
        if self.kind.is_global() {
            f32::INFINITY
        } else {
            self.range
        }
    }

    /// Packs the light for the GPU, placed by `world`.
    pub fn parameters(&self, world: &Mat4) -> LightParameters {
        LightParameters {
            color: self.color.scaled(self.intensity),
            position: world.translation(),
            range: self.effective_range(),
            direction: world.transform_vector3(Vec3::NEG_Z).normalize(),
            kind: self.kind.gpu_code(),
            inner_cone_angle: self.inner_cone_angle,
            outer_cone_angle: self.outer_cone_angle,
            shadow_strength: self.shadow_strength,
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_lights_have_infinite_range() {
        let mut light = Light3D::directional(LinearRgba::WHITE, 1.0);
        light.range = 5.0;
        assert!(light.effective_range().is_infinite());
        assert_eq!(Light3D::point(LinearRgba::WHITE, 1.0, 5.0).effective_range(), 5.0);
    }

    #[test]
    fn parameters_take_placement_from_transform() {
        let light = Light3D::point(LinearRgba::WHITE, 2.0, 10.0);
        let params = light.parameters(&Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(params.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(params.direction, Vec3::NEG_Z);
        assert_eq!(params.color, LinearRgba::new(2.0, 2.0, 2.0, 1.0));
        assert_eq!(params.kind, 2);
    }
}
