//! Image tiles.
//!
//! The image is cut into tiles that are rendered independently, one worker
//! per tile. Tiles are numbered in grid order; dispatch order is decided
//! separately so that it never influences pixel values.

/// A rectangular region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X coordinate of the tile's top-left corner
    pub x: u32,
    /// Y coordinate of the tile's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position of this tile in grid (row-major) order
    pub index: usize,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    /// Get the total number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Tile-grid coordinates, independent of the tile's position in any
    /// queue.
    pub fn grid_coords(&self, tile_size: u32) -> (u32, u32) {
        (self.x / tile_size, self.y / tile_size)
    }
}

impl AsRef<Tile> for Tile {
    fn as_ref(&self) -> &Tile {
        self
    }
}

/// Cover a `width` x `height` image with tiles of at most `tile_size`
/// pixels per side, in row-major grid order. Tiles on the right and bottom
/// edges are clipped to the image.
pub fn generate_tiles(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();
    let mut index = 0;

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let tw = tile_size.min(width - x);
            let th = tile_size.min(height - y);
            tiles.push(Tile::new(x, y, tw, th, index));
            index += 1;
            x += tile_size;
        }
        y += tile_size;
    }

    tiles
}

/// Sort tiles by distance from the image center so the middle of the image
/// finishes first. Ties keep their grid order.
pub fn sort_spiral<T: AsRef<Tile>>(tiles: &mut [T], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;

    let distance = |tile: &Tile| {
        let cx = tile.x as f32 + tile.width as f32 / 2.0;
        let cy = tile.y as f32 + tile.height as f32 / 2.0;
        (cx - center_x).powi(2) + (cy - center_y).powi(2)
    };

    tiles.sort_by(|a, b| {
        distance(a.as_ref())
            .partial_cmp(&distance(b.as_ref()))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_tiles_exact_fit() {
        let tiles = generate_tiles(128, 128, 64);
        assert_eq!(tiles.len(), 4); // 2x2 grid

        let total_pixels: usize = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total_pixels, 128 * 128);
    }

    #[test]
    fn test_generate_tiles_partial_fit() {
        let tiles = generate_tiles(100, 37, 16);
        assert_eq!(tiles.len(), 7 * 3);

        let total_pixels: usize = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total_pixels, 100 * 37);

        let last = tiles.last().unwrap();
        assert_eq!((last.x, last.y, last.width, last.height), (96, 32, 4, 5));
        assert!(tiles.iter().enumerate().all(|(i, t)| t.index == i));
    }

    #[test]
    fn test_tiles_do_not_overlap() {
        let (w, h) = (45, 23);
        let tiles = generate_tiles(w, h, 8);
        let mut covered = vec![0u8; (w * h) as usize];
        for t in &tiles {
            for y in t.y..t.y + t.height {
                for x in t.x..t.x + t.width {
                    covered[(y * w + x) as usize] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_spiral_order() {
        let mut tiles = generate_tiles(192, 192, 64);
        assert_eq!(tiles.len(), 9); // 3x3 grid

        sort_spiral(&mut tiles, 192, 192);

        // Center tile first, grid index retained
        assert_eq!((tiles[0].x, tiles[0].y), (64, 64));
        assert_eq!(tiles[0].index, 4);
        assert_eq!(tiles[0].grid_coords(64), (1, 1));
    }

    #[test]
    fn test_empty_image_has_no_tiles() {
        assert!(generate_tiles(0, 10, 16).is_empty());
        assert!(generate_tiles(10, 0, 16).is_empty());
    }
}
