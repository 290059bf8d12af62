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

use super::{Asset, AssetError, AssetKind, Cubemap, Tileset2D};
use crate::math::LinearRgba;
use crate::renderer::{
    MinFilter, PixelFormat, SamplerState, TextureDimension, TextureFilter, TextureWrap,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// Decoded pixel data as supplied by an asset loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format of `pixels`.
    pub format: PixelFormat,
    /// Tightly packed rows, bottom row first.
    pub pixels: Arc<[u8]>,
}

impl Image {
    /// Creates an image description.
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Arc<[u8]>) -> Self {
        Self {
            width,
            height,
            format,
            pixels,
        }
    }

    /// Creates an 8-bit RGBA image.
    pub fn rgba8(width: u32, height: u32, pixels: Arc<[u8]>) -> Self {
        Self::new(width, height, PixelFormat::Rgba8, pixels)
    }

    /// Checks that the pixel buffer matches the declared size and format.
    pub fn validate(&self) -> Result<(), AssetError> {
        let expected =
            self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        if self.width == 0 || self.height == 0 {
            return Err(AssetError::InvalidData(format!(
                "image has a zero dimension ({}x{})",
                self.width, self.height
            )));
        }
        if self.pixels.len() != expected {
            return Err(AssetError::InvalidData(format!(
                "{}x{} {:?} image needs {expected} bytes, got {}",
                self.width,
                self.height,
                self.format,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}

/// The storage of a texture asset, laid out for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureContents<'a> {
    /// Storage shape.
    pub dimension: TextureDimension,
    /// Width in pixels of one layer.
    pub width: u32,
    /// Height in pixels of one layer.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Every layer in order, each as tightly packed rows.
    pub pixels: Cow<'a, [u8]>,
}

/// Behavior shared by every texture asset.
///
/// Changes that only touch [`Self::sampler_state`] are applied to the live
/// texture; anything [`Self::requires_regeneration`] reports re-creates it.
pub trait TextureAsset: Asset {
    /// Validates the record and lays out its pixels.
    ///
    /// # Errors
    /// * [`AssetError::InvalidData`] if images or layout parameters are
    ///   inconsistent.
    fn contents(&self) -> Result<TextureContents<'_>, AssetError>;

    /// The sampler state this texture is created with.
    fn sampler_state(&self) -> SamplerState;

    /// Whether a mip chain is generated.
    fn mipmaps(&self) -> bool;

    /// Returns `true` if going from `previous` to `self` requires re-uploading
    /// the storage rather than just updating sampler state.
    fn requires_regeneration(&self, previous: &Self) -> bool;
}

pub(crate) fn same_image(a: &Arc<Image>, b: &Arc<Image>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

/// Any texture asset, as bound to a material parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextureRef {
    /// A plain 2D texture.
    Texture2D(Arc<Texture2D>),
    /// A cube map.
    Cubemap(Arc<Cubemap>),
    /// A tile set uploaded as a texture array.
    Tileset2D(Arc<Tileset2D>),
}

impl From<Arc<Texture2D>> for TextureRef {
    fn from(texture: Arc<Texture2D>) -> Self {
        TextureRef::Texture2D(texture)
    }
}

impl From<Arc<Cubemap>> for TextureRef {
    fn from(texture: Arc<Cubemap>) -> Self {
        TextureRef::Cubemap(texture)
    }
}

impl From<Arc<Tileset2D>> for TextureRef {
    fn from(texture: Arc<Tileset2D>) -> Self {
        TextureRef::Tileset2D(texture)
    }
}

/// A 2D texture asset: an image plus how it is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture2D {
    /// The pixel data.
    pub image: Arc<Image>,
    /// Wrap mode along U.
    pub wrap_u: TextureWrap,
    /// Wrap mode along V.
    pub wrap_v: TextureWrap,
    /// Minification filter.
    pub min_filter: TextureFilter,
    /// Magnification filter.
    pub mag_filter: TextureFilter,
    /// Border color for [`TextureWrap::ClampToBorder`].
    pub border_color: LinearRgba,
    /// Whether a mip chain is generated.
    pub mipmaps: bool,
}

impl Asset for Texture2D {
    const KIND: AssetKind = AssetKind::Texture;
}

impl Texture2D {
    /// Creates a repeating, linearly filtered, mipmapped texture.
    pub fn new(image: Image) -> Self {
        Self {
            image: Arc::new(image),
            wrap_u: TextureWrap::Repeat,
            wrap_v: TextureWrap::Repeat,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            border_color: LinearRgba::TRANSPARENT,
            mipmaps: true,
        }
    }

    /// Sets both wrap modes.
    pub fn with_wrap(mut self, u: TextureWrap, v: TextureWrap) -> Self {
        self.wrap_u = u;
        self.wrap_v = v;
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

impl TextureAsset for Texture2D {
    fn contents(&self) -> Result<TextureContents<'_>, AssetError> {
        self.image.validate()?;
        Ok(TextureContents {
            dimension: TextureDimension::D2,
            width: self.image.width,
            height: self.image.height,
            format: self.image.format,
            pixels: Cow::Borrowed(&self.image.pixels[..]),
        })
    }

    fn sampler_state(&self) -> SamplerState {
        SamplerState {
            wrap_u: self.wrap_u,
            wrap_v: self.wrap_v,
            wrap_w: TextureWrap::Repeat,
            min_filter: MinFilter::resolve(self.min_filter, self.mipmaps),
            mag_filter: self.mag_filter,
            border_color: self.border_color,
        }
    }

    fn mipmaps(&self) -> bool {
        self.mipmaps
    }

    fn requires_regeneration(&self, previous: &Texture2D) -> bool {
        !same_image(&self.image, &previous.image) || self.mipmaps != previous.mipmaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Image {
        Image::rgba8(2, 2, Arc::from(vec![0u8; 16]))
    }

    #[test]
    fn validate_checks_byte_length() {
        assert!(checker().validate().is_ok());
        let short = Image::rgba8(2, 2, Arc::from(vec![0u8; 15]));
        assert!(matches!(short.validate(), Err(AssetError::InvalidData(_))));
        let empty = Image::rgba8(0, 2, Arc::from(Vec::new()));
        assert!(empty.validate().is_err());
    }

    #[test]
    fn sampler_only_changes_do_not_regenerate() {
        let base = Texture2D::new(checker());
        let clamped = base
            .clone()
            .with_wrap(TextureWrap::ClampToEdge, TextureWrap::ClampToBorder);
        assert!(!clamped.requires_regeneration(&base));
        assert!(base.clone().with_mipmaps(false).requires_regeneration(&base));
        let other = Texture2D::new(Image::rgba8(1, 1, Arc::from(vec![1u8; 4])));
        assert!(other.requires_regeneration(&base));
    }

    #[test]
    fn contents_borrow_the_image() {
        let texture = Texture2D::new(checker());
        let contents = texture.contents().unwrap();
        assert_eq!(contents.dimension, TextureDimension::D2);
        assert!(matches!(contents.pixels, Cow::Borrowed(_)));
        let broken = Texture2D::new(Image::rgba8(2, 2, Arc::from(vec![0u8; 3])));
        assert!(broken.contents().is_err());
    }

    #[test]
    fn min_filter_follows_mipmap_flag() {
        let texture = Texture2D::new(checker()).with_mipmaps(false);
        assert_eq!(texture.sampler_state().min_filter, MinFilter::Linear);
    }
}
