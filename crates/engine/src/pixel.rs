//! Per-pixel operators
//!
//! Many operators derive each output pixel from the source samples at the
//! same position. A [`PixelOperator`] states only that mapping;
//! [`PixelAdapter`] turns it into an [`Operator`] that pulls each source
//! rectangle once per tile and fills every output band in one pass.

use rasterflow_core::{Error, ParamValue, Result, Tile};

use crate::descriptor::{OutputDescriptor, Sources};
use crate::operator::{ComputeMode, Operator, TileContext};

/// One source band read at every pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRef {
    /// Index of the wired source
    pub source: usize,
    pub band: usize,
}

impl SampleRef {
    pub const fn new(source: usize, band: usize) -> Self {
        Self { source, band }
    }
}

/// Operator computing all output bands of a pixel from co-located source
/// samples.
pub trait PixelOperator: Send + Sync {
    /// Output structure. Every referenced source must share its geometry.
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor>;

    /// Samples passed to [`PixelOperator::compute_pixel`], in order.
    /// Queried once, after `initialize`.
    fn source_samples(&self) -> Vec<SampleRef>;

    /// Fill `targets`, one slot per output band and preset to NaN, for the
    /// pixel at raster `(x, y)`.
    fn compute_pixel(&self, x: usize, y: usize, samples: &[f64], targets: &mut [f64]);

    fn target_property(&self, _name: &str) -> Option<ParamValue> {
        None
    }
}

/// [`Operator`] over a [`PixelOperator`], computing band stacks
pub struct PixelAdapter<P> {
    inner: P,
    samples: Vec<SampleRef>,
}

impl<P: PixelOperator> PixelAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            samples: Vec::new(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: PixelOperator> Operator for PixelAdapter<P> {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        let out = self.inner.initialize(sources)?;
        self.samples = self.inner.source_samples();
        for sample in &self.samples {
            let info = sources.get(sample.source).ok_or_else(|| {
                Error::Other(format!("pixel sample reads unwired source #{}", sample.source))
            })?;
            if info.descriptor.band(sample.band).is_none() {
                return Err(Error::Other(format!(
                    "source '{}' has no band {}",
                    info.name, sample.band
                )));
            }
            if !info.descriptor.same_geometry(&out) {
                return Err(Error::Other(format!(
                    "source '{}' is {}x{} but the output is {}x{}",
                    info.name, info.descriptor.width, info.descriptor.height, out.width, out.height
                )));
            }
        }
        Ok(out)
    }

    fn compute_mode(&self) -> ComputeMode {
        ComputeMode::Stack
    }

    fn compute_tile_stack(&self, ctx: &TileContext<'_>, tiles: &mut [Tile]) -> Result<()> {
        let rect = ctx.rect();
        let inputs = self
            .samples
            .iter()
            .map(|s| ctx.source_rect(s.source, s.band, rect))
            .collect::<Result<Vec<_>>>()?;

        let mut samples = vec![f64::NAN; inputs.len()];
        let mut targets = vec![f64::NAN; tiles.len()];
        for row in 0..rect.height {
            for col in 0..rect.width {
                for (slot, input) in samples.iter_mut().zip(&inputs) {
                    *slot = input.get_sample(row, col)?;
                }
                targets.fill(f64::NAN);
                self.inner
                    .compute_pixel(rect.x + col, rect.y + row, &samples, &mut targets);
                for (tile, &v) in tiles.iter_mut().zip(&targets) {
                    tile.set_sample(row, col, v)?;
                }
            }
            ctx.check_cancelled()?;
        }
        Ok(())
    }

    fn target_property(&self, name: &str) -> Option<ParamValue> {
        self.inner.target_property(name)
    }
}
