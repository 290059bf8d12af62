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

//! Resource managers: one per asset type, each turning component changes into
//! reference graph edits and render commands.

mod camera;
mod light;
mod material;
mod mesh;
mod program;
mod settings;
mod texture;

pub use camera::CameraManager;
pub use light::{LightManager, LightState};
pub use material::{
    build_uniform_block, derive_color_program, derive_depth_program, MaterialGpuState,
    MaterialManager, MaterialPass, TextureBinding,
};
pub use mesh::{MeshInstanceState, MeshManager};
pub use program::{ProgramGpuState, ProgramManager, ProgramRegistry};
pub use settings::{RenderSettingsManager, RenderSettingsState};
pub use texture::{CubemapManager, TextureGpuState, TextureManager, Tileset2DManager};

use crate::context::{AssetContext, RenderContext};
use lumen_core::asset::Asset;
use lumen_core::renderer::RenderError;
use lumen_core::EntityId;
use std::sync::Arc;

/// Lifecycle hooks of one asset type.
///
/// [`AssetContext::sync`] calls [`Self::initialize`] when an `Arc<Asset>`
/// component is set or replaced and [`Self::uninitialize`] when it is removed.
/// Both run on the simulation thread; GPU work goes through render commands.
pub trait ResourceManager {
    /// The asset type handled.
    type Asset: Asset;

    /// Name used in logs.
    const NAME: &'static str;

    /// Handles a new or replaced asset. `previous` is the replaced value.
    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        asset: &Arc<Self::Asset>,
        previous: Option<&Arc<Self::Asset>>,
    ) -> Result<(), RenderError>;

    /// Handles a removed asset.
    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        asset: &Arc<Self::Asset>,
    ) -> Result<(), RenderError>;
}

/// Destroys every per-entity GPU state left in `ctx`, dependants first.
pub(crate) fn release_gpu_states(ctx: &mut RenderContext) {
    settings::release_all(ctx);
    camera::release_all(ctx);
    mesh::release_all(ctx);
    material::release_all(ctx);
    program::release_all(ctx);
    texture::release_all(ctx);
    light::release_all(ctx);
}
