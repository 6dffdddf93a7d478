//! External raster inputs for terminal graph nodes

use std::sync::Arc;

use rasterflow_core::{Rect, Result, Tile};

use crate::descriptor::{OutputDescriptor, Sources};
use crate::operator::{Operator, TileContext};

/// Supplies raw raster tiles from files, streams or memory.
pub trait SourceProvider: Send + Sync {
    fn descriptor(&self) -> Result<OutputDescriptor>;

    /// Read `rect` of `band`. The returned tile must cover `rect`.
    fn read_tile(&self, band: usize, rect: Rect) -> Result<Tile>;

    /// Release file handles or streams; called when the context is disposed
    fn close(&self) {}
}

/// Type id given to nodes synthesized for external inputs
pub const PRODUCT_SOURCE: &str = "ProductSource";

/// Operator adapter that exposes a provider as a graph node
pub(crate) struct ProductSource {
    provider: Arc<dyn SourceProvider>,
}

impl ProductSource {
    pub(crate) fn new(provider: Arc<dyn SourceProvider>) -> Self {
        Self { provider }
    }
}

impl Operator for ProductSource {
    fn initialize(&mut self, _sources: &Sources) -> Result<OutputDescriptor> {
        self.provider.descriptor()
    }

    fn compute_tile(&self, _ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        let read = self.provider.read_tile(band, tile.rect())?;
        tile.copy_from(&read)?;
        Ok(())
    }

    fn dispose(&self) {
        self.provider.close();
    }
}
