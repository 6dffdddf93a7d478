//! Raster: the image handed to clients of a region request

use ndarray::Array2;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{RasterElement, SampleStats};

/// Dense band of samples in (row, col) order, with the band's CRS and
/// no-data value.
///
/// ```ignore
/// let raster = ctx.read_band("ndvi", 0, &RegionRequest::new())?;
/// let stats = raster.statistics();
/// println!("{} valid, mean {}", stats.valid, stats.mean);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Raster over row-major samples
    pub fn from_vec(samples: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        let data = Array2::from_shape_vec((rows, cols), samples).map_err(|_| {
            Error::InvalidDimensions {
                width: cols,
                height: rows,
            }
        })?;
        Ok(Self::from_array(data))
    }

    pub(crate) fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            crs: None,
            nodata: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or_else(|| self.out_of_bounds(row, col))
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let err = self.out_of_bounds(row, col);
        let cell = self.data.get_mut((row, col)).ok_or(err)?;
        *cell = value;
        Ok(())
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Statistics over the samples that are neither NaN nor no-data
    pub fn statistics(&self) -> SampleStats {
        let nodata = self.nodata.and_then(RasterElement::to_f64);
        let samples = self.data.iter().map(|&v| {
            if self.is_nodata(v) {
                f64::NAN
            } else {
                v.to_f64().unwrap_or(f64::NAN)
            }
        });
        SampleStats::from_samples(samples, nodata)
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_is_bounds_checked() {
        let mut raster: Raster<i16> = Raster::new(3, 5);
        assert_eq!(raster.shape(), (3, 5));
        raster.set(2, 4, 7).unwrap();
        assert_eq!(raster.get(2, 4).unwrap(), 7);
        assert!(raster.set(3, 0, 1).is_err());
        assert!(raster.get(0, 5).is_err());
    }

    #[test]
    fn from_vec_checks_the_sample_count() {
        assert!(Raster::from_vec(vec![1.0f32; 6], 2, 3).is_ok());
        assert!(Raster::from_vec(vec![1.0f32; 5], 2, 3).is_err());
    }

    #[test]
    fn statistics_skip_nan_and_nodata() {
        let mut raster = Raster::from_vec(vec![f64::NAN, 4.0, -9999.0, 2.0, 9.0, 0.0], 2, 3).unwrap();
        raster.set_nodata(Some(-9999.0));
        let stats = raster.statistics();
        assert_eq!((stats.min, stats.max, stats.mean), (0.0, 9.0, 3.75));
        assert_eq!((stats.valid, stats.missing), (4, 2));
    }

    #[test]
    fn integer_nodata_is_exact() {
        let mut raster = Raster::from_vec(vec![0u8, 255, 10, 255], 2, 2).unwrap();
        raster.set_nodata(Some(255));
        let stats = raster.statistics();
        assert_eq!(stats.valid, 2);
        assert_eq!(stats.max, 10.0);
    }
}
