//! # Rasterflow Algorithms
//!
//! Resampling kernels and the standard operators of the rasterflow engine.
//!
//! ## Contents
//!
//! - **resampling**: nearest, bilinear, cubic convolution, bicubic and
//!   windowed-sinc kernels over a [`SampleSource`](resampling::SampleSource)
//! - **operators**: Constant, Scale, Resample, NormalizedDifference,
//!   TileSummary, Subset and [`standard_registry`]
//! - **source**: [`RasterSource`], in-memory rasters as graph inputs

pub mod operators;
pub mod resampling;
pub mod source;

pub use operators::{register_standard, standard_registry};
pub use source::RasterSource;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::operators::{
        standard_registry, Constant, NormalizedDifference, Resample, Scale, Subset, TileRecord,
        TileSummary,
    };
    pub use crate::resampling::{Resampling, ResamplingIndex, ResamplingMethod, SampleSource};
    pub use crate::source::RasterSource;
    pub use rasterflow_core::prelude::*;
}
