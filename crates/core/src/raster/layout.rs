//! Regular tiling of a raster

use crate::error::{Error, Result};
use crate::raster::{Rect, TileIndex};

/// Regular grid of tiles over a `width x height` raster.
///
/// Tiles in the last column and row are clipped to the raster bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    width: usize,
    height: usize,
    tile_width: usize,
    tile_height: usize,
}

impl TileLayout {
    pub fn new(width: usize, height: usize, tile_width: usize, tile_height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(Error::InvalidDimensions {
                width: tile_width,
                height: tile_height,
            });
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    pub fn tile_height(&self) -> usize {
        self.tile_height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn num_tiles_x(&self) -> usize {
        self.width.div_ceil(self.tile_width)
    }

    pub fn num_tiles_y(&self) -> usize {
        self.height.div_ceil(self.tile_height)
    }

    pub fn num_tiles(&self) -> usize {
        self.num_tiles_x() * self.num_tiles_y()
    }

    /// Whether the index addresses a tile of this layout
    pub fn contains(&self, index: TileIndex) -> bool {
        index.tile_x < self.num_tiles_x() && index.tile_y < self.num_tiles_y()
    }

    /// Pixel rectangle of a tile, clipped to the raster
    pub fn tile_rect(&self, index: TileIndex) -> Result<Rect> {
        if !self.contains(index) {
            return Err(Error::InvalidRegion {
                region: Rect::new(
                    index.tile_x * self.tile_width,
                    index.tile_y * self.tile_height,
                    self.tile_width,
                    self.tile_height,
                ),
                reason: format!(
                    "{} outside layout of {}x{} tiles",
                    index,
                    self.num_tiles_x(),
                    self.num_tiles_y()
                ),
            });
        }
        let x = index.tile_x * self.tile_width;
        let y = index.tile_y * self.tile_height;
        Ok(Rect::new(
            x,
            y,
            self.tile_width.min(self.width - x),
            self.tile_height.min(self.height - y),
        ))
    }

    /// Tile containing pixel (row, col)
    pub fn tile_at(&self, row: usize, col: usize) -> TileIndex {
        TileIndex::new(col / self.tile_width, row / self.tile_height)
    }

    /// All tiles overlapping `region`, row by row.
    ///
    /// The region must be non-empty and inside the raster.
    pub fn tiles_covering(&self, region: Rect) -> Result<TileIterator> {
        if region.is_empty() || !self.bounds().contains_rect(&region) {
            return Err(Error::InvalidRegion {
                region,
                reason: format!("not inside raster of {}x{}", self.width, self.height),
            });
        }
        let first = self.tile_at(region.y, region.x);
        let last = self.tile_at(region.bottom() - 1, region.right() - 1);
        Ok(TileIterator {
            x0: first.tile_x,
            x1: last.tile_x,
            y1: last.tile_y,
            current: Some(first),
        })
    }

    /// Every tile of the layout
    pub fn tiles(&self) -> TileIterator {
        TileIterator {
            x0: 0,
            x1: self.num_tiles_x() - 1,
            y1: self.num_tiles_y() - 1,
            current: Some(TileIndex::new(0, 0)),
        }
    }
}

/// Iterator over a rectangular block of tile indices
#[derive(Debug, Clone)]
pub struct TileIterator {
    x0: usize,
    x1: usize,
    y1: usize,
    current: Option<TileIndex>,
}

impl Iterator for TileIterator {
    type Item = TileIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let tile = self.current?;

        // Move to next tile
        self.current = if tile.tile_x < self.x1 {
            Some(TileIndex::new(tile.tile_x + 1, tile.tile_y))
        } else if tile.tile_y < self.y1 {
            Some(TileIndex::new(self.x0, tile.tile_y + 1))
        } else {
            None
        };

        Some(tile)
    }
}
