//! Cubic convolution (Keys, 1981)

use super::{Resampling, ResamplingIndex, SampleSource};

const A: f64 = -0.5;

/// Separable 4x4 cubic convolution with `a = -0.5`.
///
/// Any NaN in the window returns the centre (floor) sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubicConvolution;

fn keys(d: f64) -> f64 {
    let d = d.abs();
    if d <= 1.0 {
        ((A + 2.0) * d - (A + 3.0)) * d * d + 1.0
    } else if d < 2.0 {
        ((A * d - 5.0 * A) * d + 8.0 * A) * d - 4.0 * A
    } else {
        0.0
    }
}

fn weights(frac: f64) -> [f64; 4] {
    [keys(1.0 + frac), keys(frac), keys(1.0 - frac), keys(2.0 - frac)]
}

impl Resampling for CubicConvolution {
    fn name(&self) -> &'static str {
        "CUBIC_CONVOLUTION"
    }

    fn kernel_size(&self) -> usize {
        4
    }

    fn resample(&self, source: &dyn SampleSource, index: &ResamplingIndex) -> f64 {
        let w = index.gather(source);
        if w[..16].iter().any(|v| v.is_nan()) {
            return w[5];
        }
        let wx = weights(index.ki);
        let wy = weights(index.kj);
        let mut acc = 0.0;
        for (r, wr) in wy.iter().enumerate() {
            let row: f64 = (0..4).map(|c| wx[c] * w[r * 4 + c]).sum();
            acc += wr * row;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_form_a_partition_of_unity() {
        for frac in [0.0, 0.1, 0.25, 0.5, 0.8, 0.99] {
            let sum: f64 = weights(frac).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "{frac}: {sum}");
        }
        assert_eq!(weights(0.0), [0.0, 1.0, 0.0, 0.0]);
    }
}
