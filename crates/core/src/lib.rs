//! # Rasterflow Core
//!
//! Core types shared by the rasterflow processing engine.
//!
//! This crate provides:
//! - `Tile`: a rectangular block of one band's samples, the unit of caching
//! - `TileLayout`: the regular tiling of a raster
//! - `Raster<T>`: the dense image handed to clients of a region request
//! - `ParamValue` / `ParamSchema`: typed operator parameters
//! - `CRS`: coordinate reference identifiers
//! - `Error`: the engine-wide error taxonomy

pub mod crs;
pub mod error;
pub mod params;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use params::{ParamDef, ParamKind, ParamSchema, ParamValue, Parameters, ValueKind};
pub use raster::{
    is_missing, BorderMode, BorderedTile, DataType, Raster, RasterElement, Rect, SampleStats,
    Tile, TileData, TileIndex, TileLayout, Window,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::params::{ParamDef, ParamSchema, ParamValue, Parameters};
    pub use crate::raster::{DataType, Raster, RasterElement, Rect, Tile, TileIndex, TileLayout};
}
