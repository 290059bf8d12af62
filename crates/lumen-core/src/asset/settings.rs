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
use crate::ecs::EntityId;
use serde::{Deserialize, Serialize};

/// Frame-wide rendering options, attached to an entity like any other asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Fixed render target size in pixels; `None` follows the window.
    pub resolution: Option<(u32, u32)>,
    /// Whether occluded geometry may be skipped.
    pub occlusion_culling: bool,
    /// The light entity used as the sun.
    pub sun_light: Option<EntityId>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: None,
            occlusion_culling: true,
            sun_light: None,
        }
    }
}

impl Asset for RenderSettings {
    const KIND: AssetKind = AssetKind::RenderSettings;
}

impl RenderSettings {
    /// Fixes the render target size.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some((width, height));
        self
    }

    /// Uses `light` as the sun.
    pub fn with_sun_light(mut self, light: EntityId) -> Self {
        self.sun_light = Some(light);
        self
    }

    /// Enables or disables occlusion culling.
    pub fn with_occlusion_culling(mut self, enabled: bool) -> Self {
        self.occlusion_culling = enabled;
        self
    }
}
