//! In-memory rasters as graph inputs

use std::sync::atomic::{AtomicBool, Ordering};

use rasterflow_core::{Error, Raster, RasterElement, Rect, Result, Tile};
use rasterflow_engine::{BandDescriptor, OutputDescriptor, SourceProvider};
use tracing::debug;

/// Serves tiles cut from rasters held in memory, one raster per band.
#[derive(Debug)]
pub struct RasterSource<T: RasterElement> {
    bands: Vec<(String, Raster<T>)>,
    tile_size: Option<usize>,
    closed: AtomicBool,
}

impl<T: RasterElement> RasterSource<T> {
    /// Single-band source named `band_1`
    pub fn new(raster: Raster<T>) -> Self {
        Self {
            bands: vec![("band_1".to_string(), raster)],
            tile_size: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Add a band; it must match the size of the first one
    pub fn with_band(mut self, name: impl Into<String>, raster: Raster<T>) -> Result<Self> {
        let (rows, cols) = self.bands[0].1.shape();
        if raster.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: raster.rows(),
                ac: raster.cols(),
            });
        }
        self.bands.push((name.into(), raster));
        Ok(self)
    }

    pub fn with_tile_size(mut self, size: usize) -> Self {
        self.tile_size = Some(size);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<T: RasterElement> SourceProvider for RasterSource<T> {
    fn descriptor(&self) -> Result<OutputDescriptor> {
        let first = &self.bands[0].1;
        let mut out = OutputDescriptor::new(first.cols(), first.rows()).with_crs(first.crs().cloned());
        for (name, raster) in &self.bands {
            let mut band = BandDescriptor::new(name.clone(), T::DATA_TYPE);
            band.nodata = raster.nodata().and_then(|v| v.to_f64());
            out = out.with_band(band);
        }
        if let Some(size) = self.tile_size {
            out = out.with_tile_size(size, size);
        }
        Ok(out)
    }

    fn read_tile(&self, band: usize, rect: Rect) -> Result<Tile> {
        if self.is_closed() {
            return Err(Error::Other("raster source is closed".into()));
        }
        let (_, raster) = self.bands.get(band).ok_or_else(|| {
            Error::invalid_parameter("band", band, format!("source has {} band(s)", self.bands.len()))
        })?;
        Tile::from_raster(raster, rect)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("closed in-memory source of {} band(s)", self.bands.len());
        }
    }
}
