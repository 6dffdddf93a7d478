//! Bicubic interpolation from corner values and derivatives
//!
//! The four samples around the coordinate, their first derivatives along
//! rows and columns and their cross derivative (all by central differences
//! over the 4x4 window) determine the 16 coefficients of a bicubic patch.
//! See Press et al., *Numerical Recipes*, section 3.6.

use super::{Resampling, ResamplingIndex, SampleSource};

/// Maps the 16 corner terms `[f, f_t, f_u, f_tu]` (four corners each,
/// counter-clockwise from `(t, u) = (0, 0)`) to the coefficients `c[i][j]`
/// of `t^i u^j`, stored row-major.
#[rustfmt::skip]
const WT: [[i8; 16]; 16] = [
    [ 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [ 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0],
    [-3, 0, 0, 3, 0, 0, 0, 0,-2, 0, 0,-1, 0, 0, 0, 0],
    [ 2, 0, 0,-2, 0, 0, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0],
    [ 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0],
    [ 0, 0, 0, 0,-3, 0, 0, 3, 0, 0, 0, 0,-2, 0, 0,-1],
    [ 0, 0, 0, 0, 2, 0, 0,-2, 0, 0, 0, 0, 1, 0, 0, 1],
    [-3, 3, 0, 0,-2,-1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [ 0, 0, 0, 0, 0, 0, 0, 0,-3, 3, 0, 0,-2,-1, 0, 0],
    [ 9,-9, 9,-9, 6, 3,-3,-6, 6,-6,-3, 3, 4, 2, 1, 2],
    [-6, 6,-6, 6,-4,-2, 2, 4,-3, 3, 3,-3,-2,-1,-1,-2],
    [ 2,-2, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [ 0, 0, 0, 0, 0, 0, 0, 0, 2,-2, 0, 0, 1, 1, 0, 0],
    [-6, 6,-6, 6,-3,-3, 3, 3,-4, 4, 2,-2,-2,-2,-1,-1],
    [ 4,-4, 4,-4, 2, 2,-2,-2, 2,-2,-2, 2, 1, 1, 1, 1],
];

/// Corners of the patch as `(row, col)` offsets into the 4x4 window
const CORNERS: [(usize, usize); 4] = [(1, 1), (2, 1), (2, 2), (1, 2)];

/// Bicubic patch over a 4x4 window.
///
/// `t` runs along rows and `u` along columns. Any NaN in the window returns
/// the centre (floor) sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bicubic;

/// Coefficients `c[i][j]` of the patch through the window `w` (4x4,
/// row-major).
fn coefficients(w: &[f64]) -> [[f64; 4]; 4] {
    let at = |r: usize, c: usize| w[r * 4 + c];

    let mut x = [0.0; 16];
    for (k, &(r, c)) in CORNERS.iter().enumerate() {
        x[k] = at(r, c);
        x[4 + k] = (at(r + 1, c) - at(r - 1, c)) / 2.0;
        x[8 + k] = (at(r, c + 1) - at(r, c - 1)) / 2.0;
        x[12 + k] =
            (at(r + 1, c + 1) - at(r + 1, c - 1) - at(r - 1, c + 1) + at(r - 1, c - 1)) / 4.0;
    }

    let mut c = [[0.0; 4]; 4];
    for (l, row) in WT.iter().enumerate() {
        let v: f64 = row.iter().zip(&x).map(|(&wt, &xk)| f64::from(wt) * xk).sum();
        c[l / 4][l % 4] = v;
    }
    c
}

impl Resampling for Bicubic {
    fn name(&self) -> &'static str {
        "BICUBIC_INTERPOLATION"
    }

    fn kernel_size(&self) -> usize {
        4
    }

    fn resample(&self, source: &dyn SampleSource, index: &ResamplingIndex) -> f64 {
        let w = index.gather(source);
        let w = &w[..16];
        if w.iter().any(|v| v.is_nan()) {
            return w[5];
        }

        let c = coefficients(w);
        let (t, u) = (index.kj, index.ki);
        let mut ans = 0.0;
        for i in (0..4).rev() {
            ans = t * ans + ((c[i][3] * u + c[i][2]) * u + c[i][1]) * u + c[i][0];
        }
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rasterflow_core::Raster;

    #[test]
    fn reproduces_low_order_surfaces() {
        // exact for polynomials whose derivatives central differences recover
        let f = |r: f64, c: f64| 1.0 + 2.0 * r + 3.0 * c + r * c + 0.5 * r * r - 0.25 * c * c;
        let mut raster = Raster::new(8, 8);
        for row in 0..8 {
            for col in 0..8 {
                raster.set(row, col, f(row as f64, col as f64)).unwrap();
            }
        }
        for (x, y) in [(3.3, 2.7), (4.5, 4.5), (2.05, 3.95)] {
            let v = Bicubic.interpolate(&raster, x, y, 8, 8);
            assert!((v - f(y, x)).abs() < 1e-9, "({x}, {y}): {v}");
        }
    }
}
