//! Progress reporting and cancellation for region requests

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rasterflow_core::{Error, Result};

/// Shared cancellation flag, checked before each uncached tile.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Receives progress of a region request, counted in tiles
pub trait ProgressListener: Send + Sync {
    fn begin(&self, _total: usize) {}
    fn worked(&self, _tiles: usize) {}
    fn done(&self) {}
}

/// Options passed through a region request by its caller
#[derive(Clone, Default)]
pub struct RegionRequest {
    pub cancel: CancellationToken,
    pub progress: Option<Arc<dyn ProgressListener>>,
}

impl RegionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressListener>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub(crate) fn begin(&self, total: usize) {
        if let Some(p) = &self.progress {
            p.begin(total);
        }
    }

    pub(crate) fn worked(&self, tiles: usize) {
        if let Some(p) = &self.progress {
            p.worked(tiles);
        }
    }

    pub(crate) fn done(&self) {
        if let Some(p) = &self.progress {
            p.done();
        }
    }
}

impl fmt::Debug for RegionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionRequest")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
