//! Tile: one materialized block of a band's samples

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::raster::{DataType, Raster, RasterElement, Rect, SampleStats, TileData};

/// A rectangular block of one band's samples, the unit of lazy computation
/// and caching.
///
/// Samples are stored row-major: local `(row, col)` maps to
/// `row * width + col`. Once a tile has been published into a cache it is
/// frozen and every mutating call fails with [`Error::TilePublished`];
/// changing cached data means building a new tile and replacing the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    rect: Rect,
    data: TileData,
    published: bool,
}

impl Tile {
    /// Create a zero-filled tile covering `rect`
    pub fn new(rect: Rect, data_type: DataType) -> Result<Self> {
        if rect.is_empty() {
            return Err(Error::InvalidDimensions {
                width: rect.width,
                height: rect.height,
            });
        }
        Ok(Self {
            rect,
            data: TileData::zeros(data_type, rect.area()),
            published: false,
        })
    }

    /// Create a tile from an existing buffer
    pub fn from_data(rect: Rect, data: TileData) -> Result<Self> {
        if rect.is_empty() || data.len() != rect.area() {
            return Err(Error::InvalidDimensions {
                width: rect.width,
                height: rect.height,
            });
        }
        Ok(Self {
            rect,
            data,
            published: false,
        })
    }

    /// Create a tile filled with a single value
    pub fn filled(rect: Rect, data_type: DataType, value: f64) -> Result<Self> {
        let mut tile = Self::new(rect, data_type)?;
        tile.data.fill(value);
        Ok(tile)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn x(&self) -> usize {
        self.rect.x
    }

    pub fn y(&self) -> usize {
        self.rect.y
    }

    pub fn width(&self) -> usize {
        self.rect.width
    }

    pub fn height(&self) -> usize {
        self.rect.height
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn data(&self) -> &TileData {
        &self.data
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Freeze the tile. Called by the cache when the tile becomes shared.
    pub fn publish(&mut self) {
        self.published = true;
    }

    /// Typed view of the samples, `None` if `T` is not the element type
    pub fn samples<T: RasterElement>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Typed mutable view of the samples
    pub fn samples_mut<T: RasterElement>(&mut self) -> Result<Option<&mut [T]>> {
        self.ensure_writable()?;
        Ok(T::slice_mut(&mut self.data))
    }

    /// Sample at tile-local (row, col)
    pub fn get_sample(&self, row: usize, col: usize) -> Result<f64> {
        self.check_local(row, col)?;
        self.data
            .get_f64(row * self.rect.width + col)
            .ok_or(self.out_of_bounds(row, col))
    }

    /// Statistics over the samples that are neither NaN nor `nodata`
    pub fn statistics(&self, nodata: Option<f64>) -> SampleStats {
        let samples = (0..self.rect.area()).map(|i| self.data.get_f64(i).unwrap_or(f64::NAN));
        SampleStats::from_samples(samples, nodata)
    }

    /// Sample at raster (row, col); the position must lie inside the tile
    pub fn get_sample_at(&self, row: usize, col: usize) -> Result<f64> {
        if !self.rect.contains(row, col) {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rect.bottom(),
                cols: self.rect.right(),
            });
        }
        self.get_sample(row - self.rect.y, col - self.rect.x)
    }

    /// Store a sample at tile-local (row, col)
    pub fn set_sample(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.ensure_writable()?;
        self.check_local(row, col)?;
        let index = row * self.rect.width + col;
        if self.data.set_f64(index, value) {
            Ok(())
        } else {
            Err(self.out_of_bounds(row, col))
        }
    }

    /// Fill every sample with `value`
    pub fn fill(&mut self, value: f64) -> Result<()> {
        self.ensure_writable()?;
        self.data.fill(value);
        Ok(())
    }

    /// Copy the overlapping part of `source` into this tile.
    ///
    /// Both tiles are positioned in raster coordinates; samples outside the
    /// intersection are left untouched. Returns the copied rectangle.
    pub fn copy_from(&mut self, source: &Tile) -> Result<Option<Rect>> {
        self.ensure_writable()?;
        let Some(overlap) = self.rect.intersection(&source.rect) else {
            return Ok(None);
        };
        for row in overlap.y..overlap.bottom() {
            for col in overlap.x..overlap.right() {
                let src = (row - source.rect.y) * source.rect.width + (col - source.rect.x);
                let dst = (row - self.rect.y) * self.rect.width + (col - self.rect.x);
                let value = source.data.get_f64(src).unwrap_or(f64::NAN);
                self.data.set_f64(dst, value);
            }
        }
        Ok(Some(overlap))
    }

    /// Transfer the samples into a consumer-visible raster of `T`.
    pub fn to_raster<T: RasterElement>(&self) -> Raster<T> {
        let (rows, cols) = (self.rect.height, self.rect.width);
        let array = Array2::from_shape_fn((rows, cols), |(r, c)| {
            T::from_f64(self.data.get_f64(r * cols + c).unwrap_or(f64::NAN))
        });
        Raster::from_array(array)
    }

    /// Build a tile from the `rect` window of a raster.
    pub fn from_raster<T: RasterElement>(raster: &Raster<T>, rect: Rect) -> Result<Self> {
        let (rows, cols) = raster.shape();
        if rect.is_empty() || rect.bottom() > rows || rect.right() > cols {
            return Err(Error::InvalidRegion {
                region: rect,
                reason: format!("outside raster of {}x{}", cols, rows),
            });
        }
        let mut samples = Vec::with_capacity(rect.area());
        for row in rect.y..rect.bottom() {
            for col in rect.x..rect.right() {
                samples.push(raster.get(row, col)?);
            }
        }
        Self::from_data(rect, T::wrap(samples))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.published {
            Err(Error::TilePublished(self.rect))
        } else {
            Ok(())
        }
    }

    fn check_local(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rect.height || col >= self.rect.width {
            Err(self.out_of_bounds(row, col))
        } else {
            Ok(())
        }
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rect.height,
            cols: self.rect.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rect_is_rejected() {
        assert!(Tile::new(Rect::new(0, 0, 0, 4), DataType::F32).is_err());
    }

    #[test]
    fn sample_access_is_row_major() {
        let mut tile = Tile::new(Rect::new(8, 4, 3, 2), DataType::I32).unwrap();
        tile.set_sample(1, 2, 7.0).unwrap();
        assert_eq!(tile.samples::<i32>().unwrap()[5], 7);
        assert_eq!(tile.get_sample_at(5, 10).unwrap(), 7.0);
        assert!(tile.get_sample(2, 0).is_err());
    }

    #[test]
    fn published_tile_is_frozen() {
        let mut tile = Tile::filled(Rect::new(0, 0, 2, 2), DataType::F64, 1.0).unwrap();
        tile.publish();
        assert!(matches!(
            tile.set_sample(0, 0, 2.0),
            Err(Error::TilePublished(_))
        ));
        assert!(tile.fill(3.0).is_err());
        assert_eq!(tile.get_sample(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn copy_from_overlapping_tile() {
        let src = Tile::filled(Rect::new(2, 2, 4, 4), DataType::F32, 5.0).unwrap();
        let mut dst = Tile::new(Rect::new(0, 0, 4, 4), DataType::F64).unwrap();
        let copied = dst.copy_from(&src).unwrap();
        assert_eq!(copied, Some(Rect::new(2, 2, 2, 2)));
        assert_eq!(dst.get_sample(3, 3).unwrap(), 5.0);
        assert_eq!(dst.get_sample(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn raster_transfer() {
        let mut raster: Raster<u8> = Raster::new(4, 4);
        raster.set(2, 3, 9).unwrap();
        let tile = Tile::from_raster(&raster, Rect::new(2, 1, 2, 3)).unwrap();
        assert_eq!(tile.get_sample(1, 1).unwrap(), 9.0);
        let back: Raster<f64> = tile.to_raster();
        assert_eq!(back.shape(), (3, 2));
        assert_eq!(back.get(1, 1).unwrap(), 9.0);
    }
}
