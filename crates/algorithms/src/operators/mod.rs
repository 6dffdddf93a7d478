//! Standard operator set
//!
//! - **Constant**: terminal raster of one value
//! - **Scale**: `value * factor + offset`
//! - **Resample**: new raster size through a resampling kernel
//! - **NormalizedDifference**: difference and ratio of two sources in one pass
//! - **TileSummary**: pass-through with per-tile statistics
//! - **Subset**: rectangular window of a source

mod constant;
mod normalized_difference;
mod resample;
mod scale;
mod subset;
mod tile_summary;

pub use constant::{Constant, CONSTANT};
pub use normalized_difference::{NormalizedDifference, NORMALIZED_DIFFERENCE};
pub use resample::{Resample, RESAMPLE};
pub use scale::{Scale, SCALE};
pub use subset::{Subset, SUBSET};
pub use tile_summary::{TileRecord, TileSummary, TILE_SUMMARY};

use rasterflow_engine::OperatorRegistry;

/// Registry holding every standard operator
pub fn standard_registry() -> OperatorRegistry {
    let mut registry = OperatorRegistry::new();
    register_standard(&mut registry);
    registry
}

/// Add the standard operators to an existing registry
pub fn register_standard(registry: &mut OperatorRegistry) {
    registry.register(Constant::spi());
    registry.register(Scale::spi());
    registry.register(Resample::spi());
    registry.register(NormalizedDifference::spi());
    registry.register(TileSummary::spi());
    registry.register(Subset::spi());
}
