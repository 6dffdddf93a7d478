//! Bilinear interpolation over a 2x2 window

use super::{Resampling, ResamplingIndex, SampleSource};

/// Linear in x, then in y. Any NaN in the window returns the floor sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bilinear;

impl Resampling for Bilinear {
    fn name(&self) -> &'static str {
        "BILINEAR_INTERPOLATION"
    }

    fn kernel_size(&self) -> usize {
        2
    }

    fn resample(&self, source: &dyn SampleSource, index: &ResamplingIndex) -> f64 {
        let w = index.gather(source);
        let (v00, v01, v10, v11) = (w[0], w[1], w[2], w[3]);
        if v00.is_nan() || v01.is_nan() || v10.is_nan() || v11.is_nan() {
            return v00;
        }
        let (u, t) = (index.ki, index.kj);
        let top = v00 + u * (v01 - v00);
        let bottom = v10 + u * (v11 - v10);
        top + t * (bottom - top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rasterflow_core::Raster;

    #[test]
    fn blends_the_four_neighbours() {
        let r = Raster::from_vec(vec![0.0, 10.0, 20.0, 30.0], 2, 2).unwrap();
        let v = Bilinear.interpolate(&r, 0.5, 0.5, 2, 2);
        assert!((v - 15.0).abs() < 1e-12);
        let v = Bilinear.interpolate(&r, 0.25, 1.0, 2, 2);
        assert!((v - 22.5).abs() < 1e-12);
    }

    #[test]
    fn nan_neighbour_returns_floor_sample() {
        let r = Raster::from_vec(vec![5.0, f64::NAN, 20.0, 30.0], 2, 2).unwrap();
        assert_eq!(Bilinear.interpolate(&r, 0.5, 0.5, 2, 2), 5.0);
    }
}
