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

//! Shader program compilation and the default program registry.

use super::ResourceManager;
use crate::context::{AssetContext, RenderContext};
use crate::queue::{CommandKind, CommandStatus, RenderCommand};
use lumen_core::asset::ShaderProgram;
use lumen_core::math::Vec4;
use lumen_core::renderer::{
    GraphicsDevice, ProgramDescriptor, ProgramHandle, RenderError, ShaderParameterType,
    ShaderStage, ShaderValue,
};
use lumen_core::EntityId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A linked program on the GPU.
#[derive(Debug, Clone)]
pub struct ProgramGpuState {
    /// The program object.
    pub handle: ProgramHandle,
    /// The program name, for logs.
    pub label: String,
    locations: HashMap<String, Option<i32>>,
}

impl ProgramGpuState {
    /// Wraps a freshly linked program.
    pub fn new(handle: ProgramHandle, label: impl Into<String>) -> Self {
        Self {
            handle,
            label: label.into(),
            locations: HashMap::new(),
        }
    }

    /// Returns `true` if the program is linked.
    pub fn is_loaded(&self) -> bool {
        self.handle.is_valid()
    }

    /// Location of the uniform `name`, queried once and cached.
    pub fn uniform_location(&mut self, device: &dyn GraphicsDevice, name: &str) -> Option<i32> {
        if let Some(location) = self.locations.get(name) {
            return *location;
        }
        let location = device.uniform_location(self.handle, name);
        if location.is_none() {
            log::debug!("Uniform '{name}' is not active in program '{}'", self.label);
        }
        self.locations.insert(name.to_owned(), location);
        location
    }
}

fn destroy(device: &dyn GraphicsDevice, state: &ProgramGpuState) {
    if let Err(e) = device.destroy_program(state.handle) {
        log::error!("Failed to destroy program '{}' ({}): {e}", state.label, state.handle);
    }
}

/// Compiles [`ShaderProgram`] assets.
#[derive(Debug)]
pub struct ProgramManager;

impl ResourceManager for ProgramManager {
    type Asset = ShaderProgram;
    const NAME: &'static str = "ShaderProgram";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        program: &Arc<ShaderProgram>,
        previous: Option<&Arc<ShaderProgram>>,
    ) -> Result<(), RenderError> {
        ctx.graph.register(entity);
        let stages = program.compose_stages(ctx.glsl_version());
        let label = program.name.clone();
        let varyings = program.feedback_varyings.clone();
        let kind = if previous.is_some() {
            CommandKind::Update
        } else {
            CommandKind::Initialize
        };

        ctx.submit(RenderCommand::new(entity, kind, "compile program", move |ctx: &mut RenderContext| {
            let device = ctx.device.clone();
            let linked = device.create_program(&ProgramDescriptor {
                label: Some(label.as_str().into()),
                stages: &stages,
                feedback_varyings: &varyings,
            });
            let old = ctx.states.remove::<ProgramGpuState>(entity);
            if let Some(old) = &old {
                destroy(&*device, old);
            }
            let handle = linked?;
            log::debug!("Linked program '{label}' ({handle}) for {entity}");
            ctx.states.insert(entity, ProgramGpuState::new(handle, label.clone()));
            Ok(CommandStatus::Done)
        }));
        Ok(())
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _program: &Arc<ShaderProgram>,
    ) -> Result<(), RenderError> {
        ctx.forget(entity);
        ctx.submit(RenderCommand::new(
            entity,
            CommandKind::Uninitialize,
            "destroy program",
            move |ctx: &mut RenderContext| {
                if let Some(state) = ctx.states.remove::<ProgramGpuState>(entity) {
                    destroy(&*ctx.device, &state);
                }
                Ok(CommandStatus::Done)
            },
        ));
        Ok(())
    }
}

pub(super) fn release_all(ctx: &mut RenderContext) {
    for entity in ctx.states.entities::<ProgramGpuState>() {
        if let Some(state) = ctx.states.remove::<ProgramGpuState>(entity) {
            destroy(&*ctx.device, &state);
        }
    }
}

/// Named programs available to materials, with one default.
///
/// Filled at startup and passed to the asset context; materials that name no
/// program use the default one.
#[derive(Debug, Clone, Default)]
pub struct ProgramRegistry {
    programs: BTreeMap<String, Arc<ShaderProgram>>,
    default: Option<String>,
}

impl ProgramRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in `Standard` (default) and
    /// `Unlit` programs.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::standard());
        registry.register(builtin::unlit());
        registry.set_default("Standard");
        registry
    }

    /// Registers a program under its name, returning the one it replaces.
    /// The first program registered becomes the default.
    pub fn register(&mut self, program: impl Into<Arc<ShaderProgram>>) -> Option<Arc<ShaderProgram>> {
        let program = program.into();
        let name = program.name.clone();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        log::debug!("Registered program '{name}'");
        self.programs.insert(name, program)
    }

    /// The program registered as `name`.
    pub fn get(&self, name: &str) -> Option<Arc<ShaderProgram>> {
        self.programs.get(name).cloned()
    }

    /// Makes `name` the default. Returns `false` if it is not registered.
    pub fn set_default(&mut self, name: &str) -> bool {
        if !self.programs.contains_key(name) {
            return false;
        }
        self.default = Some(name.to_owned());
        true
    }

    /// The default program.
    pub fn default_program(&self) -> Option<Arc<ShaderProgram>> {
        self.default.as_deref().and_then(|name| self.get(name))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }
}

mod builtin {
    use super::*;

    const COMMON: &str = r#"
layout(std140) uniform CameraParameters {
    mat4 View;
    mat4 Projection;
    mat4 InverseProjection;
    mat4 ViewProjection;
    vec3 CameraPosition;
    float Near;
    float Far;
};

layout(std140) uniform MeshParameters {
    vec3 BoundingBoxMin;
    vec3 BoundingBoxMax;
};
"#;

    const VERTEX: &str = r#"
layout(location = 0) in vec3 Position;
layout(location = 1) in vec3 Normal;
layout(location = 2) in vec2 TexCoord;
layout(location = 4) in mat4 InstanceWorld;

out vec3 WorldPosition;
out vec3 WorldNormal;
out vec2 UV;

void main() {
    vec4 world = InstanceWorld * vec4(Position, 1.0);
    WorldPosition = world.xyz;
    WorldNormal = mat3(InstanceWorld) * Normal;
    UV = TexCoord;
    gl_Position = ViewProjection * world;
}
"#;

    const STANDARD_FRAGMENT: &str = r#"
layout(std140) uniform MaterialParameters {
    vec4 Color;
    float Cutoff;
};

layout(std140) uniform ClusterParameters {
    float DepthSliceMultiplier;
    float DepthSliceSubtractor;
    uint GlobalLightCount;
    ivec4 GlobalLightIndices[8];
};

uniform sampler2D DiffuseTex;
uniform samplerBuffer Lights;
uniform usamplerBuffer ClusterLightCounts;
uniform usamplerBuffer ClusterLightIndices;

in vec3 WorldPosition;
in vec3 WorldNormal;
in vec2 UV;
out vec4 FragColor;

const uvec3 GRID = uvec3(16u, 9u, 24u);
const uint MAX_LIGHTS_PER_CLUSTER = 1024u;

vec3 shade(int index, vec3 normal) {
    vec4 color = texelFetch(Lights, index * 4);
    vec4 position = texelFetch(Lights, index * 4 + 1);
    vec4 direction = texelFetch(Lights, index * 4 + 2);
    uint kind = floatBitsToUint(direction.w);
    if (kind == 0u) {
        return color.rgb;
    }
    vec3 toLight = kind == 1u ? -direction.xyz : position.xyz - WorldPosition;
    float attenuation = 1.0;
    if (kind >= 2u) {
        float distance = length(toLight);
        attenuation = clamp(1.0 - distance / position.w, 0.0, 1.0);
    }
    return color.rgb * max(dot(normal, normalize(toLight)), 0.0) * attenuation;
}

void main() {
    vec4 albedo = Color;
#ifdef _DiffuseTex
    albedo *= texture(DiffuseTex, UV);
#endif
#ifdef RenderMode_Cutoff
    if (albedo.a < Cutoff) {
        discard;
    }
#endif
#ifdef LightingMode_Unlit
    FragColor = albedo;
#else
    vec3 normal = normalize(WorldNormal);
    vec3 light = vec3(0.0);
    for (uint i = 0u; i < GlobalLightCount; ++i) {
        light += shade(GlobalLightIndices[i].x, normal);
    }
    vec4 view = View * vec4(WorldPosition, 1.0);
    uint slice = uint(max(log2(-view.z) * DepthSliceMultiplier - DepthSliceSubtractor, 0.0));
    vec4 clip = Projection * view;
    vec2 screen = clamp(clip.xy / clip.w * 0.5 + 0.5, 0.0, 0.999);
    uvec2 cell = uvec2(screen * vec2(GRID.xy));
    uint cluster = cell.x + cell.y * GRID.x + min(slice, GRID.z - 1u) * GRID.x * GRID.y;
    uint count = texelFetch(ClusterLightCounts, int(cluster)).r;
    for (uint i = 0u; i < count; ++i) {
        uint index = texelFetch(ClusterLightIndices, int(cluster * MAX_LIGHTS_PER_CLUSTER + i)).r;
        light += shade(int(index), normal);
    }
    FragColor = vec4(albedo.rgb * light, albedo.a);
#endif
}
"#;

    const UNLIT_FRAGMENT: &str = r#"
layout(std140) uniform MaterialParameters {
    vec4 Color;
};

uniform sampler2D DiffuseTex;

in vec2 UV;
out vec4 FragColor;

void main() {
    FragColor = Color;
#ifdef _DiffuseTex
    FragColor *= texture(DiffuseTex, UV);
#endif
}
"#;

    fn stage(body: &str) -> String {
        format!("{COMMON}{body}")
    }

    pub(super) fn standard() -> ShaderProgram {
        ShaderProgram::new("Standard")
            .with_stage(ShaderStage::Vertex, stage(VERTEX))
            .with_stage(ShaderStage::Fragment, stage(STANDARD_FRAGMENT))
            .with_default("Color", ShaderValue::Vector4(Vec4::new(1.0, 1.0, 1.0, 1.0)))
            .with_default("Cutoff", ShaderValue::Float(0.5))
            .with_parameter("DiffuseTex", ShaderParameterType::Texture)
    }

    pub(super) fn unlit() -> ShaderProgram {
        ShaderProgram::new("Unlit")
            .with_stage(ShaderStage::Vertex, stage(VERTEX))
            .with_stage(ShaderStage::Fragment, stage(UNLIT_FRAGMENT))
            .with_default("Color", ShaderValue::Vector4(Vec4::new(1.0, 1.0, 1.0, 1.0)))
            .with_parameter("DiffuseTex", ShaderParameterType::Texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_infra::HeadlessDevice;

    #[test]
    fn builtins_are_registered_with_standard_as_default() {
        let registry = ProgramRegistry::with_builtins();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Standard", "Unlit"]);
        assert_eq!(registry.default_program().unwrap().name, "Standard");
        assert!(!registry.clone().set_default("Missing"));
    }

    #[test]
    fn first_registered_program_becomes_default() {
        let mut registry = ProgramRegistry::new();
        assert!(registry.default_program().is_none());
        registry.register(ShaderProgram::new("Custom"));
        registry.register(ShaderProgram::new("Other"));
        assert_eq!(registry.default_program().unwrap().name, "Custom");
    }

    #[test]
    fn builtin_sources_link_on_the_headless_device() {
        let device = HeadlessDevice::new();
        let program = builtin::standard();
        let stages = program.compose_stages("430 core");
        let handle = device
            .create_program(&ProgramDescriptor {
                label: Some("Standard".into()),
                stages: &stages,
                feedback_varyings: &[],
            })
            .unwrap();

        let mut state = ProgramGpuState::new(handle, "Standard");
        let location = state.uniform_location(&device, "DiffuseTex");
        assert!(location.is_some());
        assert_eq!(state.uniform_location(&device, "DiffuseTex"), location);
        assert_eq!(state.uniform_location(&device, "Missing"), None);
    }
}
