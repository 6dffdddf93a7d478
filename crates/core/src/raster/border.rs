//! Windows reaching past the raster edge

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::{Rect, Tile};

/// Pixel window in raster coordinates that may start before the origin or
/// end past the far edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Window {
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub const fn new(x: i64, y: i64, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Part of the window inside a `width x height` raster
    pub fn clip(&self, width: usize, height: usize) -> Option<Rect> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.width as i64).min(width as i64);
        let y1 = (self.y + self.height as i64).min(height as i64);
        (x1 > x0 && y1 > y0).then(|| {
            Rect::new(x0 as usize, y0 as usize, (x1 - x0) as usize, (y1 - y0) as usize)
        })
    }
}

impl From<Rect> for Window {
    fn from(rect: Rect) -> Self {
        Self::new(rect.x as i64, rect.y as i64, rect.width, rect.height)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
    }
}

/// Fill of the samples beyond the raster edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BorderMode {
    /// Repeat the nearest edge sample
    #[default]
    Copy,
    Zero,
    Nan,
}

/// Samples of one band over a [`Window`], with the border filled.
#[derive(Debug, Clone)]
pub struct BorderedTile {
    window: Window,
    samples: Vec<f64>,
}

impl BorderedTile {
    /// Extend `inner`, the part of `window` inside a `width x height`
    /// raster, to the whole window.
    pub fn extend(
        inner: &Tile,
        window: Window,
        (width, height): (usize, usize),
        mode: BorderMode,
    ) -> Result<Self> {
        if window.clip(width, height) != Some(inner.rect()) {
            return Err(Error::InvalidRegion {
                region: inner.rect(),
                reason: format!("is not the part of {window} inside {width}x{height}"),
            });
        }
        let mut samples = Vec::with_capacity(window.width * window.height);
        for r in 0..window.height as i64 {
            let row = window.y + r;
            for c in 0..window.width as i64 {
                let col = window.x + c;
                let inside = (0..height as i64).contains(&row) && (0..width as i64).contains(&col);
                let value = match mode {
                    _ if inside => inner.get_sample_at(row as usize, col as usize)?,
                    BorderMode::Copy => inner.get_sample_at(
                        row.clamp(0, height as i64 - 1) as usize,
                        col.clamp(0, width as i64 - 1) as usize,
                    )?,
                    BorderMode::Zero => 0.0,
                    BorderMode::Nan => f64::NAN,
                };
                samples.push(value);
            }
        }
        Ok(Self { window, samples })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Sample at raster (row, col), `None` outside the window
    pub fn get(&self, row: i64, col: i64) -> Option<f64> {
        let (r, c) = (row - self.window.y, col - self.window.x);
        if r < 0 || c < 0 || r >= self.window.height as i64 || c >= self.window.width as i64 {
            return None;
        }
        self.samples
            .get(r as usize * self.window.width + c as usize)
            .copied()
    }
}

/// Fail unless `window` overlaps a `width x height` raster
pub fn visible_part(window: Window, width: usize, height: usize) -> Result<Rect> {
    window.clip(width, height).ok_or_else(|| {
        Error::Other(format!("window {window} lies outside the {width}x{height} raster"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{DataType, Raster};

    fn positional(rows: usize, cols: usize) -> Raster<f64> {
        let samples = (0..rows * cols).map(|i| ((i / cols) * 10 + i % cols) as f64);
        Raster::from_vec(samples.collect(), rows, cols).unwrap()
    }

    #[test]
    fn clip_keeps_the_inside() {
        assert_eq!(Window::new(-2, -1, 5, 4).clip(10, 10), Some(Rect::new(0, 0, 3, 3)));
        assert_eq!(Window::new(8, 8, 5, 5).clip(10, 10), Some(Rect::new(8, 8, 2, 2)));
        assert_eq!(Window::new(-5, 0, 5, 5).clip(10, 10), None);
        assert!(visible_part(Window::new(10, 0, 2, 2), 10, 10).is_err());
    }

    #[test]
    fn border_modes_fill_outside_samples() {
        let raster = positional(3, 3);
        let window = Window::new(-1, -1, 5, 5);
        let inner = Tile::from_raster(&raster, Rect::new(0, 0, 3, 3)).unwrap();

        let copy = BorderedTile::extend(&inner, window, (3, 3), BorderMode::Copy).unwrap();
        assert_eq!(copy.get(-1, -1), Some(0.0));
        assert_eq!(copy.get(-1, 2), Some(2.0));
        assert_eq!(copy.get(3, 1), Some(21.0));
        assert_eq!(copy.get(1, 1), Some(11.0));
        assert_eq!(copy.get(4, 0), None);

        let zero = BorderedTile::extend(&inner, window, (3, 3), BorderMode::Zero).unwrap();
        assert_eq!(zero.get(3, 3), Some(0.0));
        assert_eq!(zero.get(2, 2), Some(22.0));

        let nan = BorderedTile::extend(&inner, window, (3, 3), BorderMode::Nan).unwrap();
        assert!(nan.get(-1, 0).is_some_and(f64::is_nan));
    }

    #[test]
    fn inner_tile_must_match_the_clipped_window() {
        let inner = Tile::new(Rect::new(0, 0, 2, 2), DataType::F32).unwrap();
        let err = BorderedTile::extend(&inner, Window::new(-1, -1, 5, 5), (3, 3), BorderMode::Zero);
        assert!(err.is_err());
    }
}
