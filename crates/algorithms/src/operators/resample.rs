//! Change of raster size through a resampling kernel

use rasterflow_core::{
    BorderMode, DataType, Error, ParamDef, ParamSchema, Parameters, Rect, Result, Tile, Window,
};
use rasterflow_engine::{
    BandDescriptor, Operator, OperatorSpi, OutputDescriptor, Sources, TileContext,
};
use tracing::debug;

use crate::resampling::{NodataMasked, ResamplingMethod};

pub const RESAMPLE: &str = "Resample";

/// Resamples every band of its source to `target_width x target_height`.
///
/// Pixel areas are aligned: target pixel `(row, col)` samples the source at
/// `((col + 0.5) * sx - 0.5, (row + 0.5) * sy - 0.5)` where `sx`, `sy` are
/// the source-to-target size ratios. Each target tile pulls only the source
/// window its kernel touches, extended past the source edge by copying.
///
/// Source no-data reads as missing, so kernels fall back instead of
/// blending it; missing results are written as the band's no-data value.
#[derive(Debug, Clone)]
pub struct Resample {
    pub target_width: usize,
    pub target_height: usize,
    pub method: ResamplingMethod,
    source_size: (usize, usize),
    nodata: Vec<Option<f64>>,
}

impl Resample {
    pub fn new(target_width: usize, target_height: usize, method: ResamplingMethod) -> Self {
        Self {
            target_width,
            target_height,
            method,
            source_size: (0, 0),
            nodata: Vec::new(),
        }
    }

    pub fn spi() -> OperatorSpi {
        OperatorSpi::new(
            RESAMPLE,
            "Resample to a new raster size",
            ParamSchema::new(vec![
                ParamDef::int("targetWidth", "Output width in pixels", 1, 1 << 20).required(),
                ParamDef::int("targetHeight", "Output height in pixels", 1, 1 << 20).required(),
                ParamDef::choice(
                    "method",
                    "Resampling method",
                    ResamplingMethod::NAMES,
                    "NEAREST_NEIGHBOUR",
                ),
            ]),
            |params: &Parameters| {
                Ok(Box::new(Self::new(
                    params.require_usize("targetWidth")?,
                    params.require_usize("targetHeight")?,
                    params.require_str("method")?.parse()?,
                )) as Box<dyn Operator>)
            },
        )
    }

    fn ratios(&self) -> (f64, f64) {
        let (sw, sh) = self.source_size;
        (
            sw as f64 / self.target_width as f64,
            sh as f64 / self.target_height as f64,
        )
    }

    /// Source window the kernel reads for the target rectangle `rect`
    fn source_window(&self, rect: Rect) -> Window {
        let (sx, sy) = self.ratios();
        let taps = self.method.kernel().kernel_size() as i64;
        let (before, after) = ((taps - 1) / 2, taps / 2);

        let span = |first: usize, last: usize, scale: f64| {
            let lo = ((first as f64 + 0.5) * scale - 0.5).floor() as i64 - before;
            let hi = ((last as f64 + 0.5) * scale - 0.5).floor() as i64 + after;
            (lo, (hi - lo + 1) as usize)
        };
        let (x, width) = span(rect.x, rect.right() - 1, sx);
        let (y, height) = span(rect.y, rect.bottom() - 1, sy);
        Window::new(x, y, width, height)
    }
}

impl Operator for Resample {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        sources.expect_count(RESAMPLE, 1)?;
        let source = &sources.require(RESAMPLE, 0)?.descriptor;
        self.source_size = (source.width, source.height);
        self.nodata = source.bands.iter().map(|b| b.nodata).collect();
        if self.target_width == 0 || self.target_height == 0 {
            return Err(Error::configuration(RESAMPLE, "target size is empty"));
        }
        debug!(
            "resampling {}x{} to {}x{} with {}",
            source.width, source.height, self.target_width, self.target_height, self.method
        );

        let mut out = OutputDescriptor::new(self.target_width, self.target_height)
            .with_crs(source.crs.clone());
        for band in &source.bands {
            let data_type = match self.method {
                ResamplingMethod::Nearest => band.data_type,
                _ => DataType::F64,
            };
            let mut desc = BandDescriptor::new(band.name.clone(), data_type);
            desc.nodata = band.nodata;
            out = out.with_band(desc);
        }
        Ok(out)
    }

    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        let rect = tile.rect();
        let window = ctx.source_rect_extended(0, band, self.source_window(rect), BorderMode::Copy)?;
        let nodata = self.nodata.get(band).copied().flatten();
        let source = NodataMasked::new(&window, nodata);
        let kernel = self.method.kernel();
        let (sw, sh) = self.source_size;
        let (sx, sy) = self.ratios();

        for row in 0..rect.height {
            let y = ((rect.y + row) as f64 + 0.5) * sy - 0.5;
            for col in 0..rect.width {
                let x = ((rect.x + col) as f64 + 0.5) * sx - 0.5;
                let v = match kernel.interpolate(&source, x, y, sw, sh) {
                    v if v.is_nan() => nodata.unwrap_or(f64::NAN),
                    v => v,
                };
                tile.set_sample(row, col, v)?;
            }
            ctx.check_cancelled()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_covers_the_kernel_footprint() {
        let mut op = Resample::new(5, 5, ResamplingMethod::Sinc);
        op.source_size = (10, 10);
        // target pixel 0 maps to x = 0.5; 2 taps either side
        assert_eq!(op.source_window(Rect::new(0, 0, 1, 1)), Window::new(-2, -2, 5, 5));
        // target pixel 4 maps to 8.5, reaching 10
        assert_eq!(op.source_window(Rect::new(0, 0, 5, 5)), Window::new(-2, -2, 13, 13));

        let mut op = Resample::new(20, 20, ResamplingMethod::Bilinear);
        op.source_size = (10, 10);
        // target 4..8 maps to 1.75..3.25
        assert_eq!(op.source_window(Rect::new(4, 4, 4, 4)), Window::new(1, 1, 4, 4));
    }
}
