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

//! Logical asset records.
//!
//! Assets are immutable snapshots owned by the simulation thread. Updating an
//! asset means replacing its snapshot; the rendering core only ever reads them.
//! Assets that can be shared (textures, programs, materials, mesh geometry) are
//! identified by a content key derived from their serialized form, so two
//! structurally equal records resolve to the same GPU resources.

pub mod camera;
pub mod cubemap;
pub mod light;
pub mod material;
pub mod mesh;
pub mod program;
pub mod settings;
pub mod texture;
pub mod tileset;

pub use camera::{Camera3D, Projection};
pub use cubemap::{Cubemap, CubemapFace};
pub use light::{Light3D, LightType};
pub use material::{LightingMode, Material, RenderMode};
pub use mesh::{Mesh3D, MeshData};
pub use program::{ShaderParameter, ShaderProgram};
pub use settings::RenderSettings;
pub use texture::{Image, Texture2D, TextureAsset, TextureContents, TextureRef};
pub use tileset::Tileset2D;

use crate::ecs::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kinds of asset the rendering core manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// [`Texture2D`].
    Texture,
    /// [`Cubemap`].
    Cubemap,
    /// [`Tileset2D`].
    Tileset2D,
    /// [`ShaderProgram`].
    ShaderProgram,
    /// [`Material`].
    Material,
    /// [`MeshData`].
    MeshData,
    /// [`Mesh3D`].
    Mesh,
    /// [`Light3D`].
    Light,
    /// [`Camera3D`].
    Camera,
    /// [`RenderSettings`].
    RenderSettings,
}

/// A logical asset record.
pub trait Asset: Serialize + fmt::Debug + Send + Sync + 'static {
    /// The kind tag of this record type.
    const KIND: AssetKind;
}

/// Errors raised by asset identity and reference tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetError {
    /// The entity is not a live asset.
    InvalidAsset(EntityId),
    /// The record could not be encoded to compute its content key.
    Encoding(String),
    /// The record's contents are inconsistent.
    InvalidData(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::InvalidAsset(entity) => write!(f, "Entity {entity} is not a live asset"),
            AssetError::Encoding(msg) => write!(f, "Failed to encode asset record: {msg}"),
            AssetError::InvalidData(msg) => write!(f, "Invalid asset data: {msg}"),
        }
    }
}

impl std::error::Error for AssetError {}

/// Namespace for content-derived asset keys.
const CONTENT_NAMESPACE: Uuid = Uuid::from_u128(0x4c75_6d65_6e41_7373_6574_4b65_7973_0001);

/// A stable asset key.
///
/// Either random (an asset with its own identity) or derived from the record
/// contents (structurally equal records share a key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(Uuid);

impl AssetId {
    /// Creates a new random key.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives the content key of a record.
    ///
    /// The key is a UUID v5 over the record kind and its `bincode` encoding.
    ///
    /// # Errors
    /// * [`AssetError::Encoding`] if the record cannot be serialized.
    pub fn of<A: Asset>(asset: &A) -> Result<Self, AssetError> {
        let mut bytes = bincode::serde::encode_to_vec(A::KIND, bincode::config::standard())
            .map_err(|e| AssetError::Encoding(e.to_string()))?;
        bincode::serde::encode_into_std_write(asset, &mut bytes, bincode::config::standard())
            .map_err(|e| AssetError::Encoding(e.to_string()))?;
        Ok(Self(Uuid::new_v5(&CONTENT_NAMESPACE, &bytes)))
    }

    /// The underlying UUID.
    pub fn uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::ShaderStage;
    use std::sync::Arc;

    #[test]
    fn equal_records_share_a_content_key() {
        let a = ShaderProgram::new("Unlit").with_stage(ShaderStage::Vertex, "void main() {}");
        let b = ShaderProgram::new("Unlit").with_stage(ShaderStage::Vertex, "void main() {}");
        let c = b.clone().with_macro("RenderMode_Opaque");
        assert_eq!(AssetId::of(&a).unwrap(), AssetId::of(&b).unwrap());
        assert_ne!(AssetId::of(&a).unwrap(), AssetId::of(&c).unwrap());
    }

    #[test]
    fn content_key_ignores_arc_identity() {
        let pixels: Arc<[u8]> = Arc::from(vec![255u8; 4]);
        let a = Texture2D::new(Image::rgba8(1, 1, pixels.clone()));
        let b = Texture2D::new(Image::rgba8(1, 1, Arc::from(vec![255u8; 4])));
        assert_eq!(AssetId::of(&a).unwrap(), AssetId::of(&b).unwrap());
    }

    #[test]
    fn random_keys_differ() {
        assert_ne!(AssetId::new_random(), AssetId::new_random());
    }
}
