//! Tile computation observers
//!
//! Observers are passive telemetry sinks. The scheduler reports every fresh
//! computation and every cache hit; observers must accept concurrent calls
//! from worker threads.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use rasterflow_core::{Rect, TileIndex};
use tracing::{debug, info, warn};

use crate::config::ObserverKind;
use crate::lock;

/// A fresh (non-cached) tile computation
#[derive(Debug, Clone)]
pub struct TileEvent {
    /// Graph node id
    pub node: String,
    /// Operator type id
    pub operator: String,
    /// Computed band, `None` when all bands were computed in one call
    pub band: Option<usize>,
    pub tile: TileIndex,
    pub rect: Rect,
    pub start: Instant,
    pub end: Instant,
    /// Wall time minus time spent waiting on upstream tiles
    pub net: Duration,
    pub thread: ThreadId,
    pub thread_name: Option<String>,
}

impl TileEvent {
    pub fn wall(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }

    pub(crate) fn current_thread() -> (ThreadId, Option<String>) {
        let current = thread::current();
        (current.id(), current.name().map(str::to_string))
    }
}

/// A request answered from the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedEvent {
    pub node: String,
    pub band: usize,
    pub tile: TileIndex,
}

/// Telemetry sink for tile computations.
pub trait TileObserver: Send + Sync {
    /// Called once before any tile event
    fn start(&self) {}

    fn tile_computed(&self, event: &TileEvent);

    fn tile_served(&self, _event: &ServedEvent) {}

    /// A tile already reported as computed was computed again
    fn tile_recomputed(&self, event: &TileEvent) {
        warn!(
            "{} of '{}' (band {:?}) was computed more than once",
            event.tile, event.node, event.band
        );
    }

    /// Called once after the owning context is disposed
    fn stop(&self) {}
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoopObserver;

impl TileObserver for NoopObserver {
    fn tile_computed(&self, _event: &TileEvent) {}
}

/// Build the observer selected by configuration
pub fn observer_for(kind: ObserverKind) -> Arc<dyn TileObserver> {
    match kind {
        ObserverKind::None => Arc::new(NoopObserver),
        ObserverKind::Log => Arc::new(LoggingObserver::new()),
        ObserverKind::Record => Arc::new(RecordingObserver::new()),
    }
}

type SeenKey = (String, Option<usize>, TileIndex);

/// Remembers which tiles have been reported as computed
#[derive(Debug, Default)]
struct SeenTiles(Mutex<HashSet<SeenKey>>);

impl SeenTiles {
    /// `true` the first time an event's tile is seen
    fn first_time(&self, event: &TileEvent) -> bool {
        lock(&self.0).insert((event.node.clone(), event.band, event.tile))
    }

    fn clear(&self) {
        lock(&self.0).clear();
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Default)]
pub struct LoggingObserver {
    seen: SeenTiles,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TileObserver for LoggingObserver {
    fn start(&self) {
        info!("Tile computation observer started");
    }

    fn tile_computed(&self, event: &TileEvent) {
        if !self.seen.first_time(event) {
            self.tile_recomputed(event);
            return;
        }
        debug!(
            "{} {} of '{}' ({}) band {:?}: {:.3} ms wall, {:.3} ms net on {}",
            event.tile,
            event.rect,
            event.node,
            event.operator,
            event.band,
            event.wall().as_secs_f64() * 1e3,
            event.net.as_secs_f64() * 1e3,
            event.thread_name.as_deref().unwrap_or("unnamed"),
        );
    }

    fn tile_served(&self, event: &ServedEvent) {
        debug!("{} of '{}' band {} served from cache", event.tile, event.node, event.band);
    }

    fn stop(&self) {
        self.seen.clear();
        info!("Tile computation observer stopped");
    }
}

/// Keeps every event in memory for later inspection
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: SeenTiles,
    computed: Mutex<Vec<TileEvent>>,
    served: Mutex<Vec<ServedEvent>>,
    recomputed: Mutex<Vec<TileEvent>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn computed(&self) -> Vec<TileEvent> {
        lock(&self.computed).clone()
    }

    pub fn served(&self) -> Vec<ServedEvent> {
        lock(&self.served).clone()
    }

    pub fn recomputed(&self) -> Vec<TileEvent> {
        lock(&self.recomputed).clone()
    }

    /// Computed events of one node
    pub fn computed_for(&self, node: &str) -> Vec<TileEvent> {
        lock(&self.computed)
            .iter()
            .filter(|e| e.node == node)
            .cloned()
            .collect()
    }

    /// Served events of one node
    pub fn served_for(&self, node: &str) -> Vec<ServedEvent> {
        lock(&self.served)
            .iter()
            .filter(|e| e.node == node)
            .cloned()
            .collect()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl TileObserver for RecordingObserver {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn tile_computed(&self, event: &TileEvent) {
        if self.seen.first_time(event) {
            lock(&self.computed).push(event.clone());
        } else {
            self.tile_recomputed(event);
        }
    }

    fn tile_served(&self, event: &ServedEvent) {
        lock(&self.served).push(event.clone());
    }

    fn tile_recomputed(&self, event: &TileEvent) {
        warn!("{} of '{}' recomputed", event.tile, event.node);
        lock(&self.recomputed).push(event.clone());
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observer events forwarded over a channel
#[derive(Debug, Clone)]
pub enum ObserverMessage {
    Started,
    Computed(TileEvent),
    Served(ServedEvent),
    Recomputed(TileEvent),
    Stopped,
}

/// Forwards events to another thread, e.g. a UI or a summary collector.
///
/// Send failures (receiver dropped) are ignored.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: Sender<ObserverMessage>,
    seen: SeenTiles,
}

impl ChannelObserver {
    pub fn new(tx: Sender<ObserverMessage>) -> Self {
        Self {
            tx,
            seen: SeenTiles::default(),
        }
    }
}

impl TileObserver for ChannelObserver {
    fn start(&self) {
        let _ = self.tx.send(ObserverMessage::Started);
    }

    fn tile_computed(&self, event: &TileEvent) {
        if self.seen.first_time(event) {
            let _ = self.tx.send(ObserverMessage::Computed(event.clone()));
        } else {
            self.tile_recomputed(event);
        }
    }

    fn tile_served(&self, event: &ServedEvent) {
        let _ = self.tx.send(ObserverMessage::Served(event.clone()));
    }

    fn tile_recomputed(&self, event: &TileEvent) {
        let _ = self.tx.send(ObserverMessage::Recomputed(event.clone()));
    }

    fn stop(&self) {
        let _ = self.tx.send(ObserverMessage::Stopped);
    }
}
