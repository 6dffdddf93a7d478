//! Raster data structures: element types, rectangles, tiles and tilings

mod border;
mod element;
mod grid;
mod layout;
mod rect;
mod stats;
mod tile;

pub use border::{visible_part, BorderMode, BorderedTile, Window};
pub use element::{DataType, RasterElement, TileData};
pub use grid::Raster;
pub use layout::{TileIterator, TileLayout};
pub use rect::{Rect, TileIndex};
pub use stats::{is_missing, SampleStats};
pub use tile::Tile;
