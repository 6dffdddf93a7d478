//! Windowed sinc over a 5x5 window

use std::f64::consts::PI;

use super::{Resampling, ResamplingIndex, SampleSource};

const TAPS: usize = 5;
const HALF: f64 = 2.0;

/// Separable sinc interpolation with a Hann window.
///
/// Each row of the window is first reduced along x, then the five row
/// results are reduced along y. Any NaN in the window returns the sample at
/// the truncated coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiSinc;

fn sinc(d: f64) -> f64 {
    if d == 0.0 {
        1.0
    } else {
        let a = PI * d;
        a.sin() / a
    }
}

fn hann(d: f64) -> f64 {
    0.5 * (1.0 + (PI * d / (HALF + 1.0)).cos())
}

/// Normalised weights for samples at offsets -2..=2 from the floor sample
fn weights(frac: f64) -> [f64; TAPS] {
    let mut w = [0.0; TAPS];
    for (k, wk) in w.iter_mut().enumerate() {
        let d = frac - (k as f64 - HALF);
        *wk = sinc(d) * hann(d);
    }
    let sum: f64 = w.iter().sum();
    w.iter_mut().for_each(|v| *v /= sum);
    w
}

impl Resampling for BiSinc {
    fn name(&self) -> &'static str {
        "BISINC_5_POINT_INTERPOLATION"
    }

    fn kernel_size(&self) -> usize {
        TAPS
    }

    fn resample(&self, source: &dyn SampleSource, index: &ResamplingIndex) -> f64 {
        let w = index.gather(source);
        if w.iter().any(|v| v.is_nan()) {
            return w[2 * TAPS + 2];
        }

        let wx = weights(index.ki);
        let wy = weights(index.kj);
        let mut rows = [0.0; TAPS];
        for (r, out) in rows.iter_mut().enumerate() {
            *out = (0..TAPS).map(|c| wx[c] * w[r * TAPS + c]).sum();
        }
        rows.iter().zip(&wy).map(|(v, wr)| v * wr).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_are_normalised_and_centred() {
        let w = weights(0.0);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert!(w.iter().enumerate().all(|(k, v)| k == 2 || v.abs() < 1e-12));

        let w = weights(0.5);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((w[2] - w[3]).abs() < 1e-12);
        assert!((w[1] - w[4]).abs() < 1e-12);
    }
}
