//! The operator contract
//!
//! An operator declares its output structure once in [`Operator::initialize`]
//! and then produces tiles lazily. Tile computation may pull any number of
//! upstream tiles through the [`TileContext`]; those calls block until the
//! upstream tile is available and may recurse through the whole graph.

use std::sync::Arc;

use rasterflow_core::raster::visible_part;
use rasterflow_core::{
    BorderMode, BorderedTile, Error, ParamValue, Rect, Result, Tile, TileIndex, TileLayout, Window,
};

use crate::descriptor::{OutputDescriptor, Sources};
use crate::node::OperatorNode;
use crate::progress::CancellationToken;
use crate::scheduler::TileScheduler;

/// Granularity of one `compute` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeMode {
    /// One band of one tile per call
    #[default]
    Band,
    /// All bands of one tile per call, for algorithms with cross-band
    /// context or shared work
    Stack,
}

/// Runtime behavior of a graph node.
///
/// Only the tile scheduler calls the compute methods, and it guarantees
/// that each (band, tile) is computed at most once for the lifetime of the
/// node. Operators may therefore accumulate order-independent side results
/// (see [`Operator::target_property`]).
pub trait Operator: Send + Sync {
    /// Derive the output structure from the source descriptors and the
    /// operator's parameters. Must not read pixel data.
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor>;

    fn compute_mode(&self) -> ComputeMode {
        ComputeMode::Band
    }

    /// Fill `tile` (already sized to the requested rectangle) with `band`.
    ///
    /// The tile must keep its rectangle. A tile that comes back with a
    /// different one is rejected and not cached, so a later request calls
    /// this again; side results recorded before returning must tolerate
    /// that, e.g. by keying them on the tile.
    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        let _ = (ctx, band, tile);
        Err(Error::Other(
            "operator computes band stacks only".to_string(),
        ))
    }

    /// Fill one tile per output band, all covering the same rectangle.
    fn compute_tile_stack(&self, ctx: &TileContext<'_>, tiles: &mut [Tile]) -> Result<()> {
        for (band, tile) in tiles.iter_mut().enumerate() {
            self.compute_tile(ctx, band, tile)?;
        }
        Ok(())
    }

    /// Named auxiliary result, e.g. records collected while computing tiles
    fn target_property(&self, _name: &str) -> Option<ParamValue> {
        None
    }

    /// Release held resources. Called at most once, after the node's tile
    /// cache has been cleared.
    fn dispose(&self) {}
}

/// What an operator may do while computing one tile
pub struct TileContext<'a> {
    pub(crate) scheduler: &'a TileScheduler,
    pub(crate) node: &'a OperatorNode,
    pub(crate) tile: TileIndex,
    pub(crate) rect: Rect,
    pub(crate) cancel: &'a CancellationToken,
}

impl<'a> TileContext<'a> {
    /// Id of the node being computed
    pub fn node_id(&self) -> &str {
        self.node.id()
    }

    pub fn tile_index(&self) -> TileIndex {
        self.tile
    }

    /// Rectangle being computed, in raster coordinates
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn layout(&self) -> &TileLayout {
        self.node.layout()
    }

    pub fn source_count(&self) -> usize {
        self.node.sources().len()
    }

    pub fn source_descriptor(&self, source: usize) -> Result<&OutputDescriptor> {
        Ok(self.source(source)?.descriptor())
    }

    pub fn source_layout(&self, source: usize) -> Result<&TileLayout> {
        Ok(self.source(source)?.layout())
    }

    /// One tile of a source, blocking until it is available
    pub fn source_tile(&self, source: usize, band: usize, tile: TileIndex) -> Result<Arc<Tile>> {
        let node = self.source(source)?;
        self.scheduler.request_tile(node, band, tile, self.cancel)
    }

    /// An arbitrary rectangle of a source, assembled from its tiles.
    ///
    /// A rectangle matching one source tile exactly returns the cached tile.
    pub fn source_rect(&self, source: usize, band: usize, rect: Rect) -> Result<Arc<Tile>> {
        let node = self.source(source)?;
        self.scheduler.assemble(node, band, rect, self.cancel)
    }

    /// A window of a source that may reach past its edges, the outside
    /// filled according to `border`. Only the part inside the source is
    /// pulled; the window must overlap the source.
    pub fn source_rect_extended(
        &self,
        source: usize,
        band: usize,
        window: Window,
        border: BorderMode,
    ) -> Result<BorderedTile> {
        let node = self.source(source)?;
        let size = (node.descriptor().width, node.descriptor().height);
        let inner = visible_part(window, size.0, size.1)?;
        let inner = self.scheduler.assemble(node, band, inner, self.cancel)?;
        BorderedTile::extend(&inner, window, size, border)
    }

    /// Another tile of this operator's own output.
    ///
    /// Depending on a different tile is legal; requesting the tile being
    /// computed fails with [`Error::Reentrancy`].
    pub fn own_tile(&self, band: usize, tile: TileIndex) -> Result<Arc<Tile>> {
        self.scheduler.request_tile(self.node, band, tile, self.cancel)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    fn source(&self, source: usize) -> Result<&Arc<OperatorNode>> {
        self.node.sources().get(source).ok_or_else(|| {
            Error::configuration(
                self.node.id(),
                format!(
                    "source #{source} requested but only {} wired",
                    self.node.sources().len()
                ),
            )
        })
    }
}
