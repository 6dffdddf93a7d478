//! Pixel rectangles and tile addresses

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned pixel rectangle `(x, y, width, height)`.
///
/// `x` is the column offset, `y` the row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Whether the pixel at (row, col) lies inside
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.y && row < self.bottom() && col >= self.x && col < self.right()
    }

    /// Whether `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Overlap of two rectangles, `None` if they do not intersect
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 > x0 && y1 > y0 {
            Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
    }
}

/// Address of a tile within a [`TileLayout`](super::TileLayout) grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    pub tile_x: usize,
    pub tile_y: usize,
}

impl TileIndex {
    pub const fn new(tile_x: usize, tile_y: usize) -> Self {
        Self { tile_x, tile_y }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile[{}, {}]", self.tile_x, self.tile_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_overlapping_rects() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 8, 10, 10);
        assert_eq!(a.intersection(&b), Some(Rect::new(5, 8, 5, 2)));
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(4, 0, 4, 4);
        assert_eq!(a.intersection(&b), None);
    }

    #[test]
    fn containment() {
        let outer = Rect::new(2, 2, 6, 6);
        assert!(outer.contains(2, 7));
        assert!(!outer.contains(8, 2));
        assert!(outer.contains_rect(&Rect::new(3, 3, 5, 5)));
        assert!(!outer.contains_rect(&Rect::new(3, 3, 6, 5)));
    }
}
