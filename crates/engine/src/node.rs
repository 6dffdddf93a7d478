//! An instantiated graph node

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rasterflow_core::{Error, Result, TileLayout};
use tracing::debug;

use crate::cache::TileCache;
use crate::descriptor::OutputDescriptor;
use crate::operator::Operator;

/// An initialized operator together with its wiring, tiling and private
/// tile cache.
pub struct OperatorNode {
    id: String,
    type_id: String,
    operator: Box<dyn Operator>,
    descriptor: OutputDescriptor,
    layout: TileLayout,
    sources: Vec<Arc<OperatorNode>>,
    cache: TileCache,
    disposed: AtomicBool,
}

impl OperatorNode {
    pub(crate) fn new(
        id: String,
        type_id: String,
        operator: Box<dyn Operator>,
        descriptor: OutputDescriptor,
        layout: TileLayout,
        sources: Vec<Arc<OperatorNode>>,
    ) -> Self {
        Self {
            id,
            type_id,
            operator,
            descriptor,
            layout,
            sources,
            cache: TileCache::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn operator(&self) -> &dyn Operator {
        self.operator.as_ref()
    }

    pub fn descriptor(&self) -> &OutputDescriptor {
        &self.descriptor
    }

    pub fn layout(&self) -> &TileLayout {
        &self.layout
    }

    pub fn sources(&self) -> &[Arc<OperatorNode>] {
        &self.sources
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::Disposed(self.id.clone()))
        } else {
            Ok(())
        }
    }

    /// Clear the cache and release the operator. Returns `false` if the
    /// node was already disposed.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let released = self.cache.clear();
        self.operator.dispose();
        debug!("Disposed '{}' ({} cached tiles released)", self.id, released);
        true
    }
}

impl fmt::Debug for OperatorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorNode")
            .field("id", &self.id)
            .field("type_id", &self.type_id)
            .field("width", &self.descriptor.width)
            .field("height", &self.descriptor.height)
            .field("bands", &self.descriptor.num_bands())
            .field("sources", &self.sources.iter().map(|s| s.id()).collect::<Vec<_>>())
            .finish()
    }
}
