//! # Rasterflow Engine
//!
//! Graph-based, tile-lazy execution of raster operators.
//!
//! A [`Graph`] names operators and wires their sources. Building a
//! [`GraphContext`] validates the graph, instantiates the operators through
//! an [`OperatorRegistry`] and hands them a shared [`TileScheduler`]. Tiles
//! are then computed on demand: a request for one output tile pulls exactly
//! the upstream tiles it needs, each computed at most once and cached by
//! its operator.
//!
//! ```ignore
//! use rasterflow_engine::{EngineConfig, GraphContext, RegionRequest};
//!
//! let ctx = GraphContext::new(&graph, &registry, EngineConfig::default())?;
//! for output in ctx.execute(&RegionRequest::new())? {
//!     println!("{}/{}: {:?}", output.node, output.band, output.raster.statistics().mean);
//! }
//! ctx.dispose();
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod cache;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod graph;
pub mod node;
pub mod observer;
pub mod operator;
pub mod pixel;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod source;

pub use cache::{TileCache, TileKey};
pub use config::{EngineConfig, ObserverKind, ProcessingMode};
pub use context::{GraphContext, GraphContextBuilder, OutputBand};
pub use descriptor::{BandDescriptor, OutputDescriptor, SourceInfo, Sources};
pub use graph::{Graph, GraphNode, NodeSource};
pub use node::OperatorNode;
pub use observer::{
    ChannelObserver, LoggingObserver, NoopObserver, ObserverMessage, RecordingObserver,
    ServedEvent, TileEvent, TileObserver,
};
pub use operator::{ComputeMode, Operator, TileContext};
pub use pixel::{PixelAdapter, PixelOperator, SampleRef};
pub use progress::{CancellationToken, ProgressListener, RegionRequest};
pub use registry::{OperatorFactory, OperatorRegistry, OperatorSpi};
pub use scheduler::TileScheduler;
pub use source::{SourceProvider, PRODUCT_SOURCE};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
