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

use super::{Asset, AssetKind, ShaderProgram, TextureRef};
use crate::renderer::ShaderValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How a material's fragments are blended with the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Fully opaque.
    #[default]
    Opaque,
    /// Opaque with alpha-tested holes.
    Cutoff,
    /// Alpha blended.
    Transparent,
    /// Added to the framebuffer.
    Additive,
    /// Multiplied with the framebuffer.
    Multiplicative,
}

impl RenderMode {
    /// The shader macro selecting this mode.
    pub const fn macro_name(&self) -> &'static str {
        match self {
            RenderMode::Opaque => "RenderMode_Opaque",
            RenderMode::Cutoff => "RenderMode_Cutoff",
            RenderMode::Transparent => "RenderMode_Transparent",
            RenderMode::Additive => "RenderMode_Additive",
            RenderMode::Multiplicative => "RenderMode_Multiplicative",
        }
    }
}

/// Whether a material reacts to scene lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightingMode {
    /// Shaded with the clustered lights.
    #[default]
    Lit,
    /// Emits its color unshaded.
    Unlit,
}

impl LightingMode {
    /// The shader macro selecting this mode.
    pub const fn macro_name(&self) -> &'static str {
        match self {
            LightingMode::Lit => "LightingMode_Lit",
            LightingMode::Unlit => "LightingMode_Unlit",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A material asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// The base program; `None` selects the registered default program.
    pub shader_program: Option<Arc<ShaderProgram>>,
    /// Blending mode.
    pub render_mode: RenderMode,
    /// Lighting mode.
    pub lighting_mode: LightingMode,
    /// Disables back-face culling.
    pub is_two_sided: bool,
    /// Whether meshes with this material are drawn into shadow maps.
    pub is_shadow_caster: bool,
    /// Whether this material samples shadow maps.
    pub is_shadow_receiver: bool,
    /// Values for the program's declared parameters.
    pub properties: BTreeMap<String, ShaderValue>,
}

impl Asset for Material {
    const KIND: AssetKind = AssetKind::Material;
}

impl Default for Material {
    fn default() -> Self {
        Self {
            shader_program: None,
            render_mode: RenderMode::Opaque,
            lighting_mode: LightingMode::Lit,
            is_two_sided: false,
            is_shadow_caster: true,
            is_shadow_receiver: true,
            properties: BTreeMap::new(),
        }
    }
}

impl Material {
    /// Creates a material using `program`.
    pub fn new(program: Arc<ShaderProgram>) -> Self {
        Self {
            shader_program: Some(program),
            ..Default::default()
        }
    }

    /// Replaces the base program.
    pub fn with_program(mut self, program: Option<Arc<ShaderProgram>>) -> Self {
        self.shader_program = program;
        self
    }

    /// Sets the render mode.
    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    /// Sets the lighting mode.
    pub fn with_lighting_mode(mut self, mode: LightingMode) -> Self {
        self.lighting_mode = mode;
        self
    }

    /// Sets whether both faces are drawn.
    pub fn with_two_sided(mut self, two_sided: bool) -> Self {
        self.is_two_sided = two_sided;
        self
    }

    /// Sets the shadow flags.
    pub fn with_shadows(mut self, caster: bool, receiver: bool) -> Self {
        self.is_shadow_caster = caster;
        self.is_shadow_receiver = receiver;
        self
    }

    /// Sets a property value.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<ShaderValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Removes a property.
    pub fn without_property(mut self, name: &str) -> Self {
        self.properties.remove(name);
        self
    }

    /// Replaces every property at once.
    pub fn with_properties(mut self, properties: BTreeMap<String, ShaderValue>) -> Self {
        self.properties = properties;
        self
    }

    /// Iterates over the bound texture properties.
    pub fn textures(&self) -> impl Iterator<Item = (&str, &TextureRef)> {
        self.properties
            .iter()
            .filter_map(|(name, value)| value.as_texture().map(|t| (name.as_str(), t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Image, Texture2D};

    #[test]
    fn textures_lists_only_bound_samplers() {
        let texture = Arc::new(Texture2D::new(Image::rgba8(1, 1, Arc::from(vec![0u8; 4]))));
        let material = Material::default()
            .with_property("Brightness", 0.5f32)
            .with_property("DiffuseTex", texture.clone())
            .with_property("NormalTex", ShaderValue::Texture(None));
        let textures: Vec<_> = material.textures().collect();
        assert_eq!(textures.len(), 1);
        assert_eq!(textures[0].0, "DiffuseTex");
        assert!(matches!(textures[0].1, TextureRef::Texture2D(t) if Arc::ptr_eq(t, &texture)));
    }

    #[test]
    fn macro_names() {
        assert_eq!(RenderMode::Cutoff.macro_name(), "RenderMode_Cutoff");
        assert_eq!(LightingMode::Unlit.macro_name(), "LightingMode_Unlit");
    }
}
