//! Difference and normalized difference of two co-registered bands

use rasterflow_core::{is_missing, DataType, Error, ParamDef, ParamSchema, Parameters, Result};
use rasterflow_engine::{
    BandDescriptor, Operator, OperatorSpi, OutputDescriptor, PixelAdapter, PixelOperator,
    SampleRef, Sources,
};

pub const NORMALIZED_DIFFERENCE: &str = "NormalizedDifference";

/// Sums closer to zero than this give a NaN ratio
const EPSILON: f64 = 1e-10;

/// Computes `a - b` and `(a - b) / (a + b)` in a single pass.
///
/// Both bands are produced by one computation per tile. Samples that are
/// NaN or no-data in either input give NaN in both outputs.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDifference {
    pub band_a: usize,
    pub band_b: usize,
    slots: (usize, usize),
    nodata: (Option<f64>, Option<f64>),
}

impl NormalizedDifference {
    pub fn new(band_a: usize, band_b: usize) -> Self {
        Self {
            band_a,
            band_b,
            ..Self::default()
        }
    }

    pub fn spi() -> OperatorSpi {
        OperatorSpi::new(
            NORMALIZED_DIFFERENCE,
            "Difference and normalized difference of sources 'a' and 'b'",
            ParamSchema::new(vec![
                ParamDef::int("bandA", "Band of source 'a'", 0, 1 << 10).default_int(0),
                ParamDef::int("bandB", "Band of source 'b'", 0, 1 << 10).default_int(0),
            ]),
            |params: &Parameters| {
                Ok(Box::new(PixelAdapter::new(Self::new(
                    params.require_usize("bandA")?,
                    params.require_usize("bandB")?,
                ))) as Box<dyn Operator>)
            },
        )
    }
}

impl PixelOperator for NormalizedDifference {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        let op = NORMALIZED_DIFFERENCE;
        sources.expect_count(op, 2)?;
        let a = sources.require_named(op, "a")?;
        let b = sources.require_named(op, "b")?;
        let (da, db) = (&sources.require(op, a)?.descriptor, &sources.require(op, b)?.descriptor);

        if !da.same_geometry(db) {
            return Err(Error::configuration(
                op,
                format!(
                    "sources differ in geometry: {}x{} vs {}x{}",
                    da.width, da.height, db.width, db.height
                ),
            ));
        }
        let band_a = da.band(self.band_a).ok_or_else(|| {
            Error::configuration(op, format!("source 'a' has no band {}", self.band_a))
        })?;
        let band_b = db.band(self.band_b).ok_or_else(|| {
            Error::configuration(op, format!("source 'b' has no band {}", self.band_b))
        })?;
        self.slots = (a, b);
        self.nodata = (band_a.nodata, band_b.nodata);

        Ok(OutputDescriptor::like(da)
            .with_band(BandDescriptor::new("difference", DataType::F64))
            .with_band(BandDescriptor::new("ratio", DataType::F32)))
    }

    fn source_samples(&self) -> Vec<SampleRef> {
        vec![
            SampleRef::new(self.slots.0, self.band_a),
            SampleRef::new(self.slots.1, self.band_b),
        ]
    }

    fn compute_pixel(&self, _x: usize, _y: usize, samples: &[f64], targets: &mut [f64]) {
        let (va, vb) = (samples[0], samples[1]);
        if is_missing(va, self.nodata.0) || is_missing(vb, self.nodata.1) {
            return;
        }
        let (sum, d) = (va + vb, va - vb);
        targets[0] = d;
        targets[1] = if sum.abs() < EPSILON { f64::NAN } else { d / sum };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_balanced_inputs_give_nan() {
        let mut op = NormalizedDifference::new(0, 0);
        op.nodata = (Some(0.0), None);
        let mut out = [f64::NAN; 2];
        op.compute_pixel(0, 0, &[3.0, 1.0], &mut out);
        assert_eq!(out, [2.0, 0.5]);

        let mut out = [f64::NAN; 2];
        op.compute_pixel(0, 0, &[0.0, 1.0], &mut out);
        assert!(out.iter().all(|v| v.is_nan()));

        op.compute_pixel(0, 0, &[2.0, -2.0], &mut out);
        assert_eq!(out[0], 4.0);
        assert!(out[1].is_nan());
    }
}
