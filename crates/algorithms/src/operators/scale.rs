//! Linear rescaling of every band

use rasterflow_core::{is_missing, DataType, ParamDef, ParamSchema, Parameters, Result};
use rasterflow_engine::{
    BandDescriptor, Operator, OperatorSpi, OutputDescriptor, PixelAdapter, PixelOperator,
    SampleRef, Sources,
};

pub const SCALE: &str = "Scale";

/// `value * factor + offset`, band by band, keeping the source shape.
///
/// No-data and NaN samples of the source become the band's no-data value,
/// or NaN when it has none.
#[derive(Debug, Clone)]
pub struct Scale {
    pub factor: f64,
    pub offset: f64,
    nodata: Vec<Option<f64>>,
}

impl Scale {
    pub fn new(factor: f64, offset: f64) -> Self {
        Self {
            factor,
            offset,
            nodata: Vec::new(),
        }
    }

    pub fn spi() -> OperatorSpi {
        OperatorSpi::new(
            SCALE,
            "Multiply by a factor and add an offset",
            ParamSchema::new(vec![
                ParamDef::float("factor", "Multiplier", 1.0),
                ParamDef::float("offset", "Added after scaling", 0.0),
            ]),
            |params: &Parameters| {
                Ok(Box::new(PixelAdapter::new(Self::new(
                    params.require_f64("factor")?,
                    params.require_f64("offset")?,
                ))) as Box<dyn Operator>)
            },
        )
    }
}

impl PixelOperator for Scale {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        sources.expect_count(SCALE, 1)?;
        let source = &sources.require(SCALE, 0)?.descriptor;
        self.nodata = source.bands.iter().map(|b| b.nodata).collect();

        let mut out = OutputDescriptor::like(source);
        for band in &source.bands {
            let mut desc = BandDescriptor::new(band.name.clone(), DataType::F64);
            desc.nodata = band.nodata;
            out = out.with_band(desc);
        }
        Ok(out)
    }

    fn source_samples(&self) -> Vec<SampleRef> {
        (0..self.nodata.len()).map(|band| SampleRef::new(0, band)).collect()
    }

    fn compute_pixel(&self, _x: usize, _y: usize, samples: &[f64], targets: &mut [f64]) {
        for ((target, &v), &nodata) in targets.iter_mut().zip(samples).zip(&self.nodata) {
            *target = if is_missing(v, nodata) {
                nodata.unwrap_or(f64::NAN)
            } else {
                v * self.factor + self.offset
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_samples_keep_their_band_nodata() {
        let mut op = Scale::new(2.0, 1.0);
        op.nodata = vec![Some(0.3), None];
        let mut out = [0.0; 2];
        op.compute_pixel(0, 0, &[0.1 + 0.2, f64::NAN], &mut out);
        assert_eq!(out[0], 0.3);
        assert!(out[1].is_nan());
        op.compute_pixel(0, 0, &[3.0, 4.0], &mut out);
        assert_eq!(out, [7.0, 9.0]);
    }
}
