//! Resampling kernels
//!
//! A kernel turns a continuous raster coordinate into a sample value. The
//! centre of sample `(row, col)` lies at continuous `(y, x) = (row, col)`.
//!
//! Resampling happens in two steps:
//! - [`Resampling::compute_index`] gathers the integer neighbourhood the
//!   kernel needs, clamped to `[0, dim - 1]`, plus the fractional offsets
//!   `ki`, `kj` in `[0, 1)` measured from the floor sample
//! - [`Resampling::resample`] applies the kernel weights to those samples
//!
//! Samples are read through [`SampleSource`], which reports missing data as
//! NaN. Every kernel has a documented fallback sample that is returned
//! instead of a weighted blend when its window contains NaN.

mod bicubic;
mod bilinear;
mod cubic_convolution;
mod nearest;
mod sinc;

pub use bicubic::Bicubic;
pub use bilinear::Bilinear;
pub use cubic_convolution::CubicConvolution;
pub use nearest::NearestNeighbour;
pub use sinc::BiSinc;

use std::fmt;
use std::str::FromStr;

use rasterflow_core::{is_missing, BorderedTile, Error, Raster, RasterElement, Tile};

/// Largest neighbourhood edge of any kernel
pub const MAX_TAPS: usize = 5;

// ---------------------------------------------------------------------------
// Sample access
// ---------------------------------------------------------------------------

/// Read access to the samples of a raster band.
///
/// `row` and `col` are raster coordinates. Missing or no-data samples are
/// returned as NaN.
pub trait SampleSource {
    fn sample(&self, row: usize, col: usize) -> f64;

    /// Read the `rows x cols` window into `out`, row-major.
    fn samples(&self, rows: &[usize], cols: &[usize], out: &mut [f64]) {
        for (r, &row) in rows.iter().enumerate() {
            for (c, &col) in cols.iter().enumerate() {
                out[r * cols.len() + c] = self.sample(row, col);
            }
        }
    }
}

impl<T: RasterElement> SampleSource for Raster<T> {
    fn sample(&self, row: usize, col: usize) -> f64 {
        match self.get(row, col) {
            Ok(v) if !self.is_nodata(v) => v.to_f64().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }
}

/// A tile answers in raster coordinates; positions outside it are NaN.
/// Values are raw: wrap it in [`NodataMasked`] when the band has a no-data
/// value.
impl SampleSource for Tile {
    fn sample(&self, row: usize, col: usize) -> f64 {
        self.get_sample_at(row, col).unwrap_or(f64::NAN)
    }
}

/// Raster coordinates, raw values; positions outside the window are NaN.
impl SampleSource for BorderedTile {
    fn sample(&self, row: usize, col: usize) -> f64 {
        self.get(row as i64, col as i64).unwrap_or(f64::NAN)
    }
}

/// Reads the band's no-data value as NaN
#[derive(Debug, Clone, Copy)]
pub struct NodataMasked<S> {
    source: S,
    nodata: Option<f64>,
}

impl<S: SampleSource> NodataMasked<S> {
    pub fn new(source: S, nodata: Option<f64>) -> Self {
        Self { source, nodata }
    }
}

impl<S: SampleSource> SampleSource for NodataMasked<S> {
    fn sample(&self, row: usize, col: usize) -> f64 {
        let v = self.source.sample(row, col);
        if is_missing(v, self.nodata) {
            f64::NAN
        } else {
            v
        }
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &S {
    fn sample(&self, row: usize, col: usize) -> f64 {
        (**self).sample(row, col)
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Neighbourhood of a continuous coordinate, gathered for one kernel.
///
/// `i` holds source columns and `j` source rows; only the first `taps`
/// entries of each are meaningful. Entry `k` addresses
/// `floor(x) - (taps - 1) / 2 + k`, clamped to the raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResamplingIndex {
    pub x: f64,
    pub y: f64,
    pub width: usize,
    pub height: usize,
    /// `floor(x)`, unclamped
    pub i0: i64,
    /// `floor(y)`, unclamped
    pub j0: i64,
    /// `x - floor(x)`
    pub ki: f64,
    /// `y - floor(y)`
    pub kj: f64,
    pub taps: usize,
    pub i: [usize; MAX_TAPS],
    pub j: [usize; MAX_TAPS],
}

impl ResamplingIndex {
    /// Gather a `taps x taps` neighbourhood around `(x, y)`.
    ///
    /// # Arguments
    /// * `x`, `y` - Continuous column and row coordinate
    /// * `width`, `height` - Source raster dimensions, both at least 1
    /// * `taps` - Neighbourhood edge, at most [`MAX_TAPS`]
    pub fn new(x: f64, y: f64, width: usize, height: usize, taps: usize) -> Self {
        let taps = taps.clamp(1, MAX_TAPS);
        let (x, y) = (finite_or_zero(x), finite_or_zero(y));
        let (fx, fy) = (x.floor(), y.floor());
        let (i0, j0) = (fx as i64, fy as i64);
        let offset = (taps as i64 - 1) / 2;

        let mut i = [0; MAX_TAPS];
        let mut j = [0; MAX_TAPS];
        for k in 0..taps {
            i[k] = clamp(i0 - offset + k as i64, width);
            j[k] = clamp(j0 - offset + k as i64, height);
        }

        Self {
            x,
            y,
            width,
            height,
            i0,
            j0,
            ki: x - fx,
            kj: y - fy,
            taps,
            i,
            j,
        }
    }

    /// Source columns of the neighbourhood
    pub fn cols(&self) -> &[usize] {
        &self.i[..self.taps]
    }

    /// Source rows of the neighbourhood
    pub fn rows(&self) -> &[usize] {
        &self.j[..self.taps]
    }

    /// Read the whole window, row-major
    pub(crate) fn gather(&self, source: &dyn SampleSource) -> [f64; MAX_TAPS * MAX_TAPS] {
        let mut out = [f64::NAN; MAX_TAPS * MAX_TAPS];
        source.samples(self.rows(), self.cols(), &mut out[..self.taps * self.taps]);
        out
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn clamp(v: i64, dim: usize) -> usize {
    let max = dim.saturating_sub(1) as i64;
    v.clamp(0, max) as usize
}

// ---------------------------------------------------------------------------
// Kernel contract
// ---------------------------------------------------------------------------

/// An interpolation strategy.
pub trait Resampling: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Neighbourhood edge length
    fn kernel_size(&self) -> usize;

    /// Gather the clamped neighbourhood of `(x, y)` in a `width x height`
    /// raster.
    fn compute_index(&self, x: f64, y: f64, width: usize, height: usize) -> ResamplingIndex {
        ResamplingIndex::new(x, y, width, height, self.kernel_size())
    }

    /// Apply the kernel to the samples addressed by `index`.
    fn resample(&self, source: &dyn SampleSource, index: &ResamplingIndex) -> f64;

    /// [`compute_index`](Self::compute_index) followed by
    /// [`resample`](Self::resample)
    fn interpolate(
        &self,
        source: &dyn SampleSource,
        x: f64,
        y: f64,
        width: usize,
        height: usize,
    ) -> f64 {
        let index = self.compute_index(x, y, width, height);
        self.resample(source, &index)
    }
}

// ---------------------------------------------------------------------------
// Method selection
// ---------------------------------------------------------------------------

/// Named resampling methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResamplingMethod {
    #[default]
    Nearest,
    Bilinear,
    CubicConvolution,
    Bicubic,
    Sinc,
}

impl ResamplingMethod {
    pub const ALL: [ResamplingMethod; 5] = [
        ResamplingMethod::Nearest,
        ResamplingMethod::Bilinear,
        ResamplingMethod::CubicConvolution,
        ResamplingMethod::Bicubic,
        ResamplingMethod::Sinc,
    ];

    /// Every accepted spelling, canonical names first
    pub const NAMES: &'static [&'static str] = &[
        "NEAREST_NEIGHBOUR",
        "BILINEAR_INTERPOLATION",
        "CUBIC_CONVOLUTION",
        "BICUBIC_INTERPOLATION",
        "BISINC_5_POINT_INTERPOLATION",
        "nearest",
        "bilinear",
        "cubic",
        "bicubic",
        "sinc",
    ];

    /// Look a method up by its canonical identifier or short alias,
    /// ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NEAREST_NEIGHBOUR" | "NEAREST_NEIGHBOR" | "NEAREST" => Some(Self::Nearest),
            "BILINEAR_INTERPOLATION" | "BILINEAR" => Some(Self::Bilinear),
            "CUBIC_CONVOLUTION" | "CUBIC" => Some(Self::CubicConvolution),
            "BICUBIC_INTERPOLATION" | "BICUBIC" => Some(Self::Bicubic),
            "BISINC_5_POINT_INTERPOLATION" | "BISINC" | "SINC" => Some(Self::Sinc),
            _ => None,
        }
    }

    /// Canonical identifier
    pub fn name(self) -> &'static str {
        match self {
            Self::Nearest => "NEAREST_NEIGHBOUR",
            Self::Bilinear => "BILINEAR_INTERPOLATION",
            Self::CubicConvolution => "CUBIC_CONVOLUTION",
            Self::Bicubic => "BICUBIC_INTERPOLATION",
            Self::Sinc => "BISINC_5_POINT_INTERPOLATION",
        }
    }

    pub fn kernel(self) -> &'static dyn Resampling {
        match self {
            Self::Nearest => &NearestNeighbour,
            Self::Bilinear => &Bilinear,
            Self::CubicConvolution => &CubicConvolution,
            Self::Bicubic => &Bicubic,
            Self::Sinc => &BiSinc,
        }
    }
}

impl fmt::Display for ResamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResamplingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            Error::invalid_parameter("method", s, "unknown resampling method")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Smooth test surface with no symmetry along either axis
    fn surface(rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::new(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                let (y, x) = (row as f64, col as f64);
                r.set(row, col, 10.0 + 0.7 * x - 0.3 * y + (0.4 * x).sin() * (0.3 * y).cos())
                    .unwrap();
            }
        }
        r
    }

    /// Remembers every position it was asked for
    struct Recording<S> {
        inner: S,
        seen: RefCell<Vec<(usize, usize)>>,
    }

    impl<S: SampleSource> SampleSource for Recording<S> {
        fn sample(&self, row: usize, col: usize) -> f64 {
            self.seen.borrow_mut().push((row, col));
            self.inner.sample(row, col)
        }
    }

    #[test]
    fn index_clamps_at_the_edges() {
        let idx = ResamplingIndex::new(-0.5, 9.5, 10, 10, 2);
        assert_eq!(idx.i0, -1);
        assert_eq!(idx.cols(), &[0, 0]);
        assert_eq!(idx.rows(), &[9, 9]);
        assert!((idx.ki - 0.5).abs() < 1e-12);

        let idx = ResamplingIndex::new(3.25, 4.0, 10, 10, 5);
        assert_eq!(idx.cols(), &[1, 2, 3, 4, 5]);
        assert_eq!(idx.rows(), &[2, 3, 4, 5, 6]);
        assert_eq!(idx.kj, 0.0);
    }

    #[test]
    fn grid_points_reproduce_raw_samples() {
        let raster = surface(12, 12);
        for method in [
            ResamplingMethod::Bilinear,
            ResamplingMethod::CubicConvolution,
            ResamplingMethod::Bicubic,
            ResamplingMethod::Sinc,
            ResamplingMethod::Nearest,
        ] {
            let kernel = method.kernel();
            for row in 2..10 {
                for col in 2..10 {
                    let v = kernel.interpolate(&raster, col as f64, row as f64, 12, 12);
                    let raw = raster.get(row, col).unwrap();
                    assert!((v - raw).abs() < 1e-6, "{method} at ({row}, {col}): {v} vs {raw}");
                }
            }
        }
    }

    #[test]
    fn out_of_range_coordinates_never_leave_the_raster() {
        let raster = surface(10, 10);
        for method in ResamplingMethod::ALL {
            let rec = Recording {
                inner: &raster,
                seen: RefCell::new(Vec::new()),
            };
            for x in [-0.5, 9.5, -3.0, 42.0] {
                let v = method.kernel().interpolate(&rec, x, 4.5, 10, 10);
                assert!(v.is_finite(), "{method} at x = {x}");
            }
            let seen = rec.seen.borrow();
            assert!(!seen.is_empty());
            assert!(seen.iter().all(|&(r, c)| r < 10 && c < 10), "{method}");
        }
    }

    #[test]
    fn single_nan_only_leaks_through_the_fallback() {
        let (x, y) = (4.3, 5.6);
        for method in ResamplingMethod::ALL {
            let kernel = method.kernel();
            let idx = kernel.compute_index(x, y, 12, 12);
            for &row in idx.rows() {
                for &col in idx.cols() {
                    let mut raster = Raster::filled(12, 12, 7.0);
                    raster.set(row, col, f64::NAN).unwrap();
                    let v = kernel.resample(&raster, &idx);
                    if v.is_nan() {
                        let fallback = match method {
                            ResamplingMethod::Nearest | ResamplingMethod::Bilinear => {
                                (idx.j[0], idx.i[0])
                            }
                            ResamplingMethod::CubicConvolution | ResamplingMethod::Bicubic => {
                                (idx.j[1], idx.i[1])
                            }
                            ResamplingMethod::Sinc => (idx.j[2], idx.i[2]),
                        };
                        assert_eq!((row, col), fallback, "{method}");
                    } else {
                        assert!((v - 7.0).abs() < 1e-9, "{method}: {v}");
                    }
                }
            }
        }
    }

    #[test]
    fn methods_resolve_by_name() {
        assert_eq!(
            ResamplingMethod::from_name("BISINC_5_POINT_INTERPOLATION"),
            Some(ResamplingMethod::Sinc)
        );
        assert_eq!(
            "bilinear".parse::<ResamplingMethod>().unwrap(),
            ResamplingMethod::Bilinear
        );
        assert!("LANCZOS".parse::<ResamplingMethod>().is_err());
        for method in ResamplingMethod::ALL {
            assert_eq!(ResamplingMethod::from_name(method.name()), Some(method));
        }
    }

    #[test]
    fn tiles_answer_in_raster_coordinates() {
        let raster = surface(8, 8);
        let tile = Tile::from_raster(&raster, rasterflow_core::Rect::new(2, 3, 4, 4)).unwrap();
        assert_eq!(tile.sample(3, 2), raster.get(3, 2).unwrap());
        assert!(tile.sample(0, 0).is_nan());
    }

    #[test]
    fn masked_tiles_hide_nodata_from_the_kernels() {
        let mut raster = Raster::filled(4, 4, 10.0);
        raster.set(1, 1, -9999.0).unwrap();
        let tile = Tile::from_raster(&raster, rasterflow_core::Rect::new(0, 0, 4, 4)).unwrap();
        let masked = NodataMasked::new(&tile, Some(-9999.0));
        assert!(masked.sample(1, 1).is_nan());
        assert_eq!(masked.sample(1, 2), 10.0);

        let blended = Bilinear.interpolate(&masked, 1.5, 1.5, 4, 4);
        assert!(blended.is_nan(), "{blended}");
        assert_eq!(Bilinear.interpolate(&masked, 2.5, 2.5, 4, 4), 10.0);
    }
}
