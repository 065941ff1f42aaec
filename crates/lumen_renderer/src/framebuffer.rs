//! Tile-major pixel storage.
//!
//! Pixels are stored tile by tile, each tile's pixels row-major within the
//! tile. That makes every tile one contiguous slice, so the whole buffer
//! can be split into disjoint mutable regions and handed to different
//! workers with no locking.

use lumen_math::Color;

use crate::tile::{generate_tiles, Tile};

/// A `width` x `height` grid of `T`, zero-initialized (`T::default()`).
#[derive(Debug, Clone)]
pub struct Framebuffer<T = Color> {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles: Vec<Tile>,
    /// Start of each tile in `data`
    offsets: Vec<usize>,
    data: Vec<T>,
}

impl<T: Default + Clone> Framebuffer<T> {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        let tiles = generate_tiles(width, height, tile_size);
        let mut offsets = Vec::with_capacity(tiles.len());
        let mut total = 0;
        for tile in &tiles {
            offsets.push(total);
            total += tile.pixel_count();
        }
        Self {
            width,
            height,
            tile_size,
            tiles,
            offsets,
            data: vec![T::default(); total],
        }
    }
}

impl<T> Framebuffer<T> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Tiles in grid order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    fn index_of(&self, x: u32, y: u32) -> usize {
        let tiles_x = self.width.div_ceil(self.tile_size);
        let tile_index = (y / self.tile_size) * tiles_x + x / self.tile_size;
        let tile = &self.tiles[tile_index as usize];
        self.offsets[tile_index as usize]
            + ((y - tile.y) * tile.width + (x - tile.x)) as usize
    }

    /// Pixel at image coordinates `(x, y)`, row 0 at the top.
    pub fn get(&self, x: u32, y: u32) -> Option<&T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(&self.data[self.index_of(x, y)])
    }

    /// Split the buffer into one exclusive region per tile, in grid order.
    pub fn regions_mut(&mut self) -> Vec<TileRegion<'_, T>> {
        let mut regions = Vec::with_capacity(self.tiles.len());
        let mut rest: &mut [T] = &mut self.data;
        for tile in &self.tiles {
            let (pixels, tail) = rest.split_at_mut(tile.pixel_count());
            regions.push(TileRegion {
                tile: *tile,
                pixels,
            });
            rest = tail;
        }
        regions
    }
}

impl<T: Clone> Framebuffer<T> {
    /// Copy the pixels out in row-major image order.
    pub fn to_row_major(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.data.len());
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.data[self.index_of(x, y)].clone());
            }
        }
        out
    }
}

impl Framebuffer<Color> {
    /// Linear RGB as interleaved `f32`, row-major.
    pub fn to_rgb_f32(&self) -> Vec<f32> {
        let pixels = self.to_row_major();
        bytemuck::cast_slice::<Color, f32>(&pixels).to_vec()
    }

    /// Gamma-corrected 8-bit RGBA, row-major.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.to_row_major()
            .into_iter()
            .flat_map(color_to_rgba)
            .collect()
    }
}

/// The pixels of one tile, owned exclusively for writing.
#[derive(Debug)]
pub struct TileRegion<'a, T = Color> {
    pub tile: Tile,
    pixels: &'a mut [T],
}

impl<'a, T> TileRegion<'a, T> {
    /// Pixels with their image coordinates, row-major within the tile.
    pub fn pixels_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut T)> + '_ {
        let tile = self.tile;
        self.pixels.iter_mut().enumerate().map(move |(i, pixel)| {
            let i = i as u32;
            (tile.x + i % tile.width, tile.y + i / tile.width, pixel)
        })
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

impl<T> AsRef<Tile> for TileRegion<'_, T> {
    fn as_ref(&self) -> &Tile {
        &self.tile
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to gamma-corrected 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let to_byte = |c: f32| (255.0 * linear_to_gamma(c).clamp(0.0, 1.0)) as u8;
    [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
}
