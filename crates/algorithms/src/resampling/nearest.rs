//! Nearest-neighbour selection

use super::{Resampling, ResamplingIndex, SampleSource};

/// Picks the sample whose centre is closest to the coordinate.
///
/// Exact ties (fraction 0.5) go to the lower index. Any NaN in the 2x2
/// window returns the floor sample, as for [`super::Bilinear`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighbour;

impl Resampling for NearestNeighbour {
    fn name(&self) -> &'static str {
        "NEAREST_NEIGHBOUR"
    }

    fn kernel_size(&self) -> usize {
        2
    }

    fn resample(&self, source: &dyn SampleSource, index: &ResamplingIndex) -> f64 {
        let w = index.gather(source);
        if w[..4].iter().any(|v| v.is_nan()) {
            return w[0];
        }
        let col = usize::from(index.ki > 0.5);
        let row = usize::from(index.kj > 0.5);
        w[row * 2 + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rasterflow_core::Raster;

    #[test]
    fn ties_go_to_the_lower_index() {
        let r = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let k = NearestNeighbour;
        assert_eq!(k.interpolate(&r, 0.5, 0.5, 2, 2), 1.0);
        assert_eq!(k.interpolate(&r, 0.51, 0.5, 2, 2), 2.0);
        assert_eq!(k.interpolate(&r, 0.5, 0.51, 2, 2), 3.0);
        assert_eq!(k.interpolate(&r, 0.9, 0.9, 2, 2), 4.0);
    }

    #[test]
    fn any_nan_in_window_falls_back_to_floor() {
        let r = Raster::from_vec(vec![1.0, 2.0, 3.0, f64::NAN], 2, 2).unwrap();
        assert_eq!(NearestNeighbour.interpolate(&r, 0.9, 0.9, 2, 2), 1.0);
        // the nearest sample is valid but the window is not
        assert_eq!(NearestNeighbour.interpolate(&r, 0.9, 0.2, 2, 2), 1.0);

        let r = Raster::from_vec(vec![f64::NAN, 2.0, 3.0, 4.0], 2, 2).unwrap();
        assert!(NearestNeighbour.interpolate(&r, 0.9, 0.9, 2, 2).is_nan());
    }
}
