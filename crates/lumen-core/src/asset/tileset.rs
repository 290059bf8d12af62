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

/// An atlas image cut into equally sized tiles, uploaded as a texture array
/// with one tile per layer.
///
/// Layers are numbered row by row from the top-left tile of the atlas.
/// Pixels right of or above the last whole tile are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tileset2D {
    /// The atlas.
    pub image: Arc<Image>,
    /// Width of one tile in pixels.
    pub tile_width: u32,
    /// Height of one tile in pixels.
    pub tile_height: u32,
    /// Number of layers; every whole tile when `None`.
    pub count: Option<u32>,
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

impl Asset for Tileset2D {
    const KIND: AssetKind = AssetKind::Tileset2D;
}

impl Tileset2D {
    /// Creates a tile set over every whole `tile_width` x `tile_height` tile
    /// of `image`, clamped and without mipmaps so tiles do not bleed.
    pub fn new(image: Image, tile_width: u32, tile_height: u32) -> Self {
        Self {
            image: Arc::new(image),
            tile_width,
            tile_height,
            count: None,
            wrap_u: TextureWrap::ClampToEdge,
            wrap_v: TextureWrap::ClampToEdge,
            min_filter: TextureFilter::Nearest,
            mag_filter: TextureFilter::Nearest,
            border_color: LinearRgba::TRANSPARENT,
            mipmaps: false,
        }
    }

    /// Limits or extends the number of layers.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
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

    /// Enables or disables mip generation.
    pub fn with_mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    /// Whole tiles per atlas row and column.
    pub fn grid(&self) -> (u32, u32) {
        if self.tile_width == 0 || self.tile_height == 0 {
            return (0, 0);
        }
        (self.image.width / self.tile_width, self.image.height / self.tile_height)
    }

    /// Number of layers of the uploaded array.
    pub fn layer_count(&self) -> u32 {
        let (columns, rows) = self.grid();
        self.count.unwrap_or(columns * rows)
    }
}

impl TextureAsset for Tileset2D {
    fn contents(&self) -> Result<TextureContents<'_>, AssetError> {
        self.image.validate()?;
        let (columns, rows) = self.grid();
        let layers = self.layer_count();
        if layers == 0 {
            return Err(AssetError::InvalidData(format!(
                "{}x{} tiles do not fit a {}x{} atlas",
                self.tile_width, self.tile_height, self.image.width, self.image.height
            )));
        }

        let bpp = self.image.format.bytes_per_pixel();
        let (tile_w, tile_h) = (self.tile_width as usize, self.tile_height as usize);
        let (atlas_w, row_bytes) = (self.image.width as usize, tile_w * bpp);
        let layer_bytes = row_bytes * tile_h;
        // Layers past the last tile stay zeroed.
        let mut pixels = vec![0u8; layer_bytes * layers as usize];
        for y in 0..rows {
            for x in 0..columns {
                // Rows are stored bottom first, so the top tile row comes first.
                let layer = (rows - y - 1) * columns + x;
                if layer >= layers {
                    continue;
                }
                let origin = (y as usize * tile_h * atlas_w + x as usize * tile_w) * bpp;
                for line in 0..tile_h {
                    let src = origin + line * atlas_w * bpp;
                    let dst = layer as usize * layer_bytes + line * row_bytes;
                    pixels[dst..dst + row_bytes]
                        .copy_from_slice(&self.image.pixels[src..src + row_bytes]);
                }
            }
        }
        Ok(TextureContents {
            dimension: TextureDimension::D2Array { layers },
            width: self.tile_width,
            height: self.tile_height,
            format: self.image.format,
            pixels: Cow::Owned(pixels),
        })
    }

    fn sampler_state(&self) -> SamplerState {
        SamplerState {
            wrap_u: self.wrap_u,
            wrap_v: self.wrap_v,
            wrap_w: TextureWrap::ClampToEdge,
            min_filter: MinFilter::resolve(self.min_filter, self.mipmaps),
            mag_filter: self.mag_filter,
            border_color: self.border_color,
        }
    }

    fn mipmaps(&self) -> bool {
        self.mipmaps
    }

    fn requires_regeneration(&self, previous: &Tileset2D) -> bool {
        !same_image(&self.image, &previous.image)
            || self.tile_width != previous.tile_width
            || self.tile_height != previous.tile_height
            || self.count != previous.count
            || self.mipmaps != previous.mipmaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 4x2 atlas of 2x1 tiles whose red channel holds the tile number
    /// counted from the top-left.
    fn atlas() -> Image {
        #[rustfmt::skip]
        let rows: [u8; 8] = [
            2, 2, 3, 3, // bottom row
            0, 0, 1, 1, // top row
        ];
        let pixels: Vec<u8> = rows.iter().flat_map(|v| [*v, 0, 0, 255]).collect();
        Image::rgba8(4, 2, Arc::from(pixels))
    }

    fn layer_ids(contents: &TextureContents<'_>) -> Vec<u8> {
        contents.pixels.chunks(4).map(|texel| texel[0]).collect()
    }

    #[test]
    fn tiles_are_numbered_from_the_top_left() {
        let tileset = Tileset2D::new(atlas(), 2, 1);
        assert_eq!(tileset.grid(), (2, 2));
        let contents = tileset.contents().unwrap();
        assert_eq!(contents.dimension, TextureDimension::D2Array { layers: 4 });
        assert_eq!((contents.width, contents.height), (2, 1));
        assert_eq!(layer_ids(&contents), vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn count_limits_or_pads_the_layers() {
        let first_two_set = Tileset2D::new(atlas(), 2, 1).with_count(2);
        let first_two = first_two_set.contents().unwrap();
        assert_eq!(layer_ids(&first_two), vec![0, 0, 1, 1]);

        let padded_set = Tileset2D::new(atlas(), 2, 1).with_count(5);
        let padded = padded_set.contents().unwrap();
        assert_eq!(padded.dimension, TextureDimension::D2Array { layers: 5 });
        assert_eq!(&layer_ids(&padded)[8..], &[0, 0]);
    }

    #[test]
    fn oversized_or_empty_tiles_are_rejected() {
        assert!(Tileset2D::new(atlas(), 8, 1).contents().is_err());
        assert!(Tileset2D::new(atlas(), 0, 1).contents().is_err());
    }

    #[test]
    fn layout_changes_regenerate() {
        let base = Tileset2D::new(atlas(), 2, 1);
        let wrapped = base.clone().with_wrap(TextureWrap::Repeat, TextureWrap::Repeat);
        assert!(!wrapped.requires_regeneration(&base));
        assert!(base.clone().with_count(1).requires_regeneration(&base));
        assert!(Tileset2D::new(atlas(), 1, 1).requires_regeneration(&base));
    }
}
