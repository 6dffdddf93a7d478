//! Tile scheduler: the only caller of `Operator::compute_tile`
//!
//! A request is answered from the node's cache when possible. Otherwise the
//! requester takes the gate of the compute unit, re-checks the cache and
//! computes the tile on its own thread. Upstream requests made by an
//! operator run inline on the same thread, so a chain of blocking pulls
//! walks the graph depth-first.
//!
//! The scheduler tracks which thread holds each gate and which gate each
//! blocked thread waits for. A request whose wait would close a cycle in
//! that graph, on one thread or across several, fails with
//! [`Error::Reentrancy`] instead of blocking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Instant;

use rasterflow_core::{Error, Rect, Result, Tile, TileIndex};
use tracing::{debug, warn};

use crate::cache::{TileKey, Unit};
use crate::config::ProcessingMode;
use crate::lock;
use crate::node::OperatorNode;
use crate::observer::{ServedEvent, TileEvent, TileObserver};
use crate::operator::{ComputeMode, TileContext};
use crate::progress::{CancellationToken, RegionRequest};

/// Dispatches tile and region requests for the nodes of one graph context.
pub struct TileScheduler {
    mode: ProcessingMode,
    observer: Arc<dyn TileObserver>,
    waits: WaitGraph,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl TileScheduler {
    /// A dedicated worker pool is built once here for
    /// `ProcessingMode::ParallelWith`.
    pub fn new(mode: ProcessingMode, observer: Arc<dyn TileObserver>) -> Result<Self> {
        #[cfg(feature = "parallel")]
        let pool = match mode {
            ProcessingMode::ParallelWith(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("rasterflow-{i}"))
                    .build()
                    .map_err(|e| Error::configuration("engine", e))?,
            ),
            _ => None,
        };
        Ok(Self {
            mode,
            observer,
            waits: WaitGraph::default(),
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn observer(&self) -> &Arc<dyn TileObserver> {
        &self.observer
    }

    /// One tile of one band, computed at most once per node.
    pub fn request_tile(
        &self,
        node: &OperatorNode,
        band: usize,
        tile: TileIndex,
        cancel: &CancellationToken,
    ) -> Result<Arc<Tile>> {
        let started = Instant::now();
        let result = self.fetch(node, band, tile, cancel);
        frames::charge_parent(started.elapsed());
        result
    }

    /// A region of one band, decomposed into its covering tiles which are
    /// dispatched according to the processing mode.
    ///
    /// If any tile fails the request fails; tiles completed meanwhile stay
    /// cached.
    pub fn request_region(
        &self,
        node: &OperatorNode,
        band: usize,
        region: Rect,
        request: &RegionRequest,
    ) -> Result<Arc<Tile>> {
        node.ensure_live()?;
        check_band(node, band)?;
        let tiles: Vec<TileIndex> = node.layout().tiles_covering(region)?.collect();
        request.begin(tiles.len());
        let fetched = self.dispatch(tiles, |index| {
            let tile = self.request_tile(node, band, index, &request.cancel)?;
            request.worked(1);
            Ok(tile)
        });
        request.done();
        merge(node, band, region, fetched?)
    }

    /// Region assembly for nested requests; runs on the calling thread.
    pub(crate) fn assemble(
        &self,
        node: &OperatorNode,
        band: usize,
        region: Rect,
        cancel: &CancellationToken,
    ) -> Result<Arc<Tile>> {
        node.ensure_live()?;
        check_band(node, band)?;
        let fetched = node
            .layout()
            .tiles_covering(region)?
            .map(|index| self.request_tile(node, band, index, cancel))
            .collect::<Result<Vec<_>>>()?;
        merge(node, band, region, fetched)
    }

    fn dispatch<F>(&self, tiles: Vec<TileIndex>, f: F) -> Result<Vec<Arc<Tile>>>
    where
        F: Fn(TileIndex) -> Result<Arc<Tile>> + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            match (self.mode, &self.pool) {
                (ProcessingMode::Sequential, _) => {}
                (ProcessingMode::ParallelWith(_), Some(pool)) => {
                    return pool.install(|| tiles.into_par_iter().map(f).collect());
                }
                _ => return tiles.into_par_iter().map(f).collect(),
            }
        }
        tiles.into_iter().map(f).collect()
    }

    fn fetch(
        &self,
        node: &OperatorNode,
        band: usize,
        tile: TileIndex,
        cancel: &CancellationToken,
    ) -> Result<Arc<Tile>> {
        node.ensure_live()?;
        check_band(node, band)?;
        let rect = node.layout().tile_rect(tile)?;
        let key = TileKey::new(band, tile);

        if let Some(hit) = node.cache().get(&key) {
            self.served(node, key);
            return Ok(hit);
        }

        let unit = match node.operator().compute_mode() {
            ComputeMode::Band => Unit::Band(band, tile),
            ComputeMode::Stack => Unit::Stack(tile),
        };
        let identity = node as *const OperatorNode as usize;
        let gate = node.cache().gate(unit);
        let waiting = self
            .waits
            .wait_for(identity, unit)
            .ok_or_else(|| Error::Reentrancy {
                operator: node.id().to_string(),
                band,
                tile,
            })?;
        let mut failure = lock(&gate);
        drop(waiting);
        // Declared after the guard so ownership is cleared before the gate opens.
        let _owner = self.waits.own(identity, unit);
        if let Some(err) = failure.as_ref() {
            return Err(err.clone());
        }
        if let Some(hit) = node.cache().get(&key) {
            drop(failure);
            self.served(node, key);
            return Ok(hit);
        }
        cancel.check()?;

        match self.compute(node, unit, band, tile, rect, cancel) {
            Ok(computed) => {
                node.cache().release_gate(unit, &gate);
                Ok(computed)
            }
            // Waiters on this gate compute the tile themselves.
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => {
                let err = Error::computation(node.id(), tile, err);
                debug!("{} of '{}' failed: {}", tile, node.id(), err);
                *failure = Some(err.clone());
                node.cache().release_gate(unit, &gate);
                Err(err)
            }
        }
    }

    fn compute(
        &self,
        node: &OperatorNode,
        unit: Unit,
        band: usize,
        tile: TileIndex,
        rect: Rect,
        cancel: &CancellationToken,
    ) -> Result<Arc<Tile>> {
        let ctx = TileContext {
            scheduler: self,
            node,
            tile,
            rect,
            cancel,
        };
        let bands = &node.descriptor().bands;
        let (thread, thread_name) = TileEvent::current_thread();

        let frame = frames::ActiveFrame::enter();
        let start = Instant::now();
        let computed = match unit {
            Unit::Band(b, _) => {
                let mut out = Tile::new(rect, bands[b].data_type)?;
                node.operator()
                    .compute_tile(&ctx, b, &mut out)
                    .map(|()| vec![(b, out)])
            }
            Unit::Stack(_) => {
                let mut out = bands
                    .iter()
                    .map(|d| Tile::new(rect, d.data_type))
                    .collect::<Result<Vec<_>>>()?;
                node.operator()
                    .compute_tile_stack(&ctx, &mut out)
                    .map(|()| out.into_iter().enumerate().collect())
            }
        };
        let end = Instant::now();
        let nested = frame.finish();
        let computed = computed?;

        if let Some((_, bad)) = computed.iter().find(|(_, t)| t.rect() != rect) {
            return Err(Error::Other(format!(
                "operator produced {} instead of {}",
                bad.rect(),
                rect
            )));
        }

        let mut requested = None;
        for (b, out) in computed {
            let (stored, previous) = node.cache().publish(TileKey::new(b, tile), out);
            if previous.is_some() {
                warn!("{} band {} of '{}' replaced without invalidation", tile, b, node.id());
            }
            if b == band {
                requested = Some(stored);
            }
        }

        self.observer.tile_computed(&TileEvent {
            node: node.id().to_string(),
            operator: node.type_id().to_string(),
            band: match unit {
                Unit::Band(b, _) => Some(b),
                Unit::Stack(_) => None,
            },
            tile,
            rect,
            start,
            end,
            net: end.saturating_duration_since(start).saturating_sub(nested),
            thread,
            thread_name,
        });

        requested.ok_or_else(|| Error::Other(format!("band {band} missing from computed stack")))
    }

    fn served(&self, node: &OperatorNode, key: TileKey) {
        self.observer.tile_served(&ServedEvent {
            node: node.id().to_string(),
            band: key.band,
            tile: key.tile,
        });
    }
}

fn check_band(node: &OperatorNode, band: usize) -> Result<()> {
    let bands = node.descriptor().num_bands();
    if band < bands {
        Ok(())
    } else {
        Err(Error::invalid_parameter(
            "band",
            band,
            format!("'{}' has {} band(s)", node.id(), bands),
        ))
    }
}

fn merge(node: &OperatorNode, band: usize, region: Rect, tiles: Vec<Arc<Tile>>) -> Result<Arc<Tile>> {
    if let [single] = tiles.as_slice() {
        if single.rect() == region {
            return Ok(Arc::clone(single));
        }
    }
    let mut out = Tile::new(region, node.descriptor().bands[band].data_type)?;
    for tile in &tiles {
        out.copy_from(tile)?;
    }
    Ok(Arc::new(out))
}

/// Compute unit of one node, keyed by node address
type UnitKey = (usize, Unit);

/// Which thread holds each gate, and which gate each blocked thread waits for
#[derive(Default)]
struct WaitGraph {
    state: Mutex<WaitState>,
}

#[derive(Default)]
struct WaitState {
    owners: HashMap<UnitKey, ThreadId>,
    waiting: HashMap<ThreadId, UnitKey>,
}

impl WaitGraph {
    /// Register the current thread as waiting for `unit` of `node`.
    ///
    /// Returns `None` when the owner chain starting at that unit leads back
    /// to the current thread; blocking would then never end.
    fn wait_for(&self, node: usize, unit: Unit) -> Option<Waiting<'_>> {
        let me = thread::current().id();
        let mut state = lock(&self.state);
        let mut next = (node, unit);
        for _ in 0..=state.waiting.len() {
            let Some(&owner) = state.owners.get(&next) else {
                break;
            };
            if owner == me {
                return None;
            }
            match state.waiting.get(&owner) {
                Some(&key) => next = key,
                None => break,
            }
        }
        state.waiting.insert(me, (node, unit));
        Some(Waiting { graph: self, thread: me })
    }

    /// Record the current thread as holder of the gate of `unit`
    fn own(&self, node: usize, unit: Unit) -> Owning<'_> {
        let thread = thread::current().id();
        lock(&self.state).owners.insert((node, unit), thread);
        Owning {
            graph: self,
            key: (node, unit),
            thread,
        }
    }
}

struct Waiting<'a> {
    graph: &'a WaitGraph,
    thread: ThreadId,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        lock(&self.graph.state).waiting.remove(&self.thread);
    }
}

struct Owning<'a> {
    graph: &'a WaitGraph,
    key: UnitKey,
    thread: ThreadId,
}

impl Drop for Owning<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.graph.state);
        if state.owners.get(&self.key) == Some(&self.thread) {
            state.owners.remove(&self.key);
        }
    }
}

/// Per-thread stack of compute units in progress, for net time
mod frames {
    use std::cell::RefCell;
    use std::time::Duration;

    struct Frame {
        /// Time spent inside nested tile requests
        nested: Duration,
    }

    thread_local! {
        static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    }

    #[cfg(test)]
    fn depth() -> usize {
        STACK.with(|s| s.borrow().len())
    }

    /// Attribute `elapsed` to the enclosing computation, if any
    pub(super) fn charge_parent(elapsed: Duration) {
        STACK.with(|s| {
            if let Some(top) = s.borrow_mut().last_mut() {
                top.nested += elapsed;
            }
        });
    }

    fn pop() -> Duration {
        STACK.with(|s| s.borrow_mut().pop().map(|f| f.nested).unwrap_or_default())
    }

    /// Frame pushed for the duration of one compute call
    pub(super) struct ActiveFrame {
        popped: bool,
    }

    impl ActiveFrame {
        pub(super) fn enter() -> Self {
            STACK.with(|s| {
                s.borrow_mut().push(Frame {
                    nested: Duration::ZERO,
                })
            });
            Self { popped: false }
        }

        /// Pop the frame, returning the nested request time
        pub(super) fn finish(mut self) -> Duration {
            self.popped = true;
            pop()
        }
    }

    impl Drop for ActiveFrame {
        fn drop(&mut self) {
            if !self.popped {
                pop();
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn nested_time_is_charged_to_the_innermost_frame() {
            let outer = ActiveFrame::enter();
            assert_eq!(depth(), 1);
            {
                let inner = ActiveFrame::enter();
                charge_parent(Duration::from_millis(5));
                assert_eq!(inner.finish(), Duration::from_millis(5));
            }
            charge_parent(Duration::from_millis(3));
            assert_eq!(outer.finish(), Duration::from_millis(3));
            assert_eq!(depth(), 0);
        }

        #[test]
        fn dropped_frame_is_popped() {
            {
                let _frame = ActiveFrame::enter();
                assert_eq!(depth(), 1);
            }
            assert_eq!(depth(), 0);
        }
    }
}
