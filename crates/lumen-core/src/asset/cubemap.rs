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

use super::texture::{same_image, TextureAsset, TextureContents};
use super::{Asset, AssetError, AssetKind, Image};
use crate::math::LinearRgba;
use crate::renderer::{MinFilter, SamplerState, TextureDimension, TextureFilter, TextureWrap};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// One face of a cube map, named from the inside looking out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CubemapFace {
    /// Towards +X.
    Right,
    /// Towards -X.
    Left,
    /// The sky.
    Top,
    /// The ground.
    Bottom,
    /// Towards +Z.
    Back,
    /// Towards -Z.
    Front,
}

impl CubemapFace {
    /// Every face, in the order [`Cubemap::faces`] stores them.
    pub const ALL: [CubemapFace; 6] = [
        CubemapFace::Right,
        CubemapFace::Left,
        CubemapFace::Top,
        CubemapFace::Bottom,
        CubemapFace::Back,
        CubemapFace::Front,
    ];

    /// Layer of this face in the uploaded cube storage.
    ///
    /// Images are stored bottom row first, which flips the vertical faces.
    pub const fn layer(self) -> usize {
        match self {
            CubemapFace::Right => 0,
            CubemapFace::Left => 1,
            CubemapFace::Bottom => 2,
            CubemapFace::Top => 3,
            CubemapFace::Back => 4,
            CubemapFace::Front => 5,
        }
    }
}

/// A cube map: six square images of equal size and format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cubemap {
    /// The face images, in [`CubemapFace::ALL`] order.
    pub faces: [Arc<Image>; 6],
    /// Wrap mode along U.
    pub wrap_u: TextureWrap,
    /// Wrap mode along V.
    pub wrap_v: TextureWrap,
    /// Wrap mode along W.
    pub wrap_w: TextureWrap,
    /// Minification filter.
    pub min_filter: TextureFilter,
    /// Magnification filter.
    pub mag_filter: TextureFilter,
    /// Border color for [`TextureWrap::ClampToBorder`].
    pub border_color: LinearRgba,
    /// Whether a mip chain is generated.
    pub mipmaps: bool,
}

impl Asset for Cubemap {
    const KIND: AssetKind = AssetKind::Cubemap;
}

impl Cubemap {
    /// Creates an edge-clamped, linearly filtered cube map from faces given
    /// in [`CubemapFace::ALL`] order.
    pub fn new(faces: [Image; 6]) -> Self {
        Self {
            faces: faces.map(Arc::new),
            wrap_u: TextureWrap::ClampToEdge,
            wrap_v: TextureWrap::ClampToEdge,
            wrap_w: TextureWrap::ClampToEdge,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            border_color: LinearRgba::TRANSPARENT,
            mipmaps: false,
        }
    }

    /// The image of one face.
    pub fn face(&self, face: CubemapFace) -> &Arc<Image> {
        &self.faces[face as usize]
    }

    /// Replaces the image of one face.
    pub fn with_face(mut self, face: CubemapFace, image: Image) -> Self {
        self.faces[face as usize] = Arc::new(image);
        self
    }

    /// Sets the three wrap modes.
    pub fn with_wrap(mut self, u: TextureWrap, v: TextureWrap, w: TextureWrap) -> Self {
        self.wrap_u = u;
        self.wrap_v = v;
        self.wrap_w = w;
        self
    }

    /// Sets both filters.
    pub fn with_filters(mut self, min: TextureFilter, mag: TextureFilter) -> Self {
        self.min_filter = min;
        self.mag_filter = mag;
        self
    }

    /// Sets the border color.
    pub fn with_border_color(mut self, color: LinearRgba) -> Self {
        self.border_color = color;
        self
    }

    /// Enables or disables mip generation.
    pub fn with_mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }
}

impl TextureAsset for Cubemap {
    fn contents(&self) -> Result<TextureContents<'_>, AssetError> {
        let first = self.face(CubemapFace::Right);
        for face in CubemapFace::ALL {
            let image = self.face(face);
            image.validate()?;
            if image.width != image.height {
                return Err(AssetError::InvalidData(format!(
                    "cube map face {face:?} is {}x{}, faces must be square",
                    image.width, image.height
                )));
            }
            if image.width != first.width || image.format != first.format {
                return Err(AssetError::InvalidData(format!(
                    "cube map face {face:?} is {}px {:?}, expected {}px {:?}",
                    image.width, image.format, first.width, first.format
                )));
            }
        }

        let face_size = first.pixels.len();
        let mut pixels = vec![0u8; face_size * 6];
        for face in CubemapFace::ALL {
            let offset = face.layer() * face_size;
            pixels[offset..offset + face_size].copy_from_slice(&self.face(face).pixels);
        }
        Ok(TextureContents {
            dimension: TextureDimension::Cube,
            width: first.width,
            height: first.height,
            format: first.format,
            pixels: Cow::Owned(pixels),
        })
    }

    fn sampler_state(&self) -> SamplerState {
        SamplerState {
            wrap_u: self.wrap_u,
            wrap_v: self.wrap_v,
            wrap_w: self.wrap_w,
            min_filter: MinFilter::resolve(self.min_filter, self.mipmaps),
            mag_filter: self.mag_filter,
            border_color: self.border_color,
        }
    }

    fn mipmaps(&self) -> bool {
        self.mipmaps
    }

    fn requires_regeneration(&self, previous: &Cubemap) -> bool {
        let same_faces = self
            .faces
            .iter()
            .zip(&previous.faces)
            .all(|(a, b)| same_image(a, b));
        !same_faces || self.mipmaps != previous.mipmaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(value: u8) -> Image {
        Image::rgba8(1, 1, Arc::from(vec![value; 4]))
    }

    fn numbered() -> Cubemap {
        Cubemap::new([solid(0), solid(1), solid(2), solid(3), solid(4), solid(5)])
    }

    #[test]
    fn faces_are_laid_out_in_storage_order() {
        let cubemap = numbered();
        let contents = cubemap.contents().unwrap();
        assert_eq!(contents.dimension, TextureDimension::Cube);
        let layers: Vec<u8> = contents.pixels.chunks(4).map(|texel| texel[0]).collect();
        // Right, Left, Bottom, Top, Back, Front.
        assert_eq!(layers, vec![0, 1, 3, 2, 4, 5]);
    }

    #[test]
    fn mismatched_faces_are_rejected() {
        let big = Image::rgba8(2, 2, Arc::from(vec![0u8; 16]));
        let bigger = numbered().with_face(CubemapFace::Top, big);
        assert!(matches!(bigger.contents(), Err(AssetError::InvalidData(_))));
        let oblong = Cubemap::new(std::array::from_fn(|_| {
            Image::rgba8(2, 1, Arc::from(vec![0u8; 8]))
        }));
        assert!(oblong.contents().is_err());
    }

    #[test]
    fn wrap_changes_keep_the_storage() {
        let base = numbered();
        let repeated = base
            .clone()
            .with_wrap(TextureWrap::Repeat, TextureWrap::Repeat, TextureWrap::MirroredRepeat);
        assert!(!repeated.requires_regeneration(&base));
        assert_eq!(repeated.sampler_state().wrap_w, TextureWrap::MirroredRepeat);
        let recolored = base.clone().with_face(CubemapFace::Front, solid(9));
        assert!(recolored.requires_regeneration(&base));
    }
}
