//! Graph context: a validated, instantiated graph ready for tile requests
//!
//! Building a context resolves every source reference, rejects cycles,
//! instantiates operators in topological order and wires them to a shared
//! tile scheduler. Failures abort the build before any tile is computed and
//! dispose whatever was already created.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rasterflow_core::{
    Error, ParamValue, Raster, Rect, Result, Tile, TileIndex, TileLayout,
};
use tracing::debug;

use crate::config::EngineConfig;
use crate::descriptor::{OutputDescriptor, SourceInfo, Sources};
use crate::graph::Graph;
use crate::node::OperatorNode;
use crate::observer::{observer_for, TileObserver};
use crate::operator::Operator;
use crate::progress::{CancellationToken, ProgressListener, RegionRequest};
use crate::registry::OperatorRegistry;
use crate::scheduler::TileScheduler;
use crate::source::{ProductSource, SourceProvider, PRODUCT_SOURCE};

/// One band of an output node, materialized by [`GraphContext::execute`]
#[derive(Debug, Clone)]
pub struct OutputBand {
    pub node: String,
    pub band: String,
    pub raster: Raster<f64>,
}

/// Resolved target of a source reference
#[derive(Debug, Clone)]
enum Target {
    Node(usize),
    Input(String),
}

/// Options for building a [`GraphContext`]
pub struct GraphContextBuilder<'a> {
    graph: &'a Graph,
    registry: &'a OperatorRegistry,
    config: EngineConfig,
    inputs: BTreeMap<String, Arc<dyn SourceProvider>>,
    observer: Option<Arc<dyn TileObserver>>,
}

impl<'a> GraphContextBuilder<'a> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Externally supplied product, referenced by `name` in source lists.
    /// A node with the same id takes precedence.
    pub fn input(mut self, name: impl Into<String>, provider: Arc<dyn SourceProvider>) -> Self {
        self.inputs.insert(name.into(), provider);
        self
    }

    /// Observer used instead of the one selected by the configuration
    pub fn observer(mut self, observer: Arc<dyn TileObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<GraphContext> {
        let graph = self.graph;

        let mut ids: HashMap<&str, usize> = HashMap::new();
        for (i, node) in graph.nodes.iter().enumerate() {
            if node.id.trim().is_empty() {
                return Err(Error::GraphValidation {
                    node: format!("#{i}"),
                    reason: "empty node id".to_string(),
                });
            }
            if ids.insert(node.id.as_str(), i).is_some() {
                return Err(Error::DuplicateNode(node.id.clone()));
            }
        }

        let targets = self.resolve(&ids)?;
        let edges: Vec<Vec<usize>> = targets
            .iter()
            .map(|refs| {
                refs.iter()
                    .filter_map(|t| match t {
                        Target::Node(i) => Some(*i),
                        Target::Input(_) => None,
                    })
                    .collect()
            })
            .collect();
        let order = topological_order(graph, &edges)?;
        let outputs = resolve_outputs(graph, &ids, &edges)?;

        let observer = self
            .observer
            .clone()
            .unwrap_or_else(|| observer_for(self.config.observer));
        let scheduler = TileScheduler::new(self.config.mode, Arc::clone(&observer))?;

        let mut created: Vec<Arc<OperatorNode>> = Vec::new();
        if let Err(err) = self.instantiate(&order, &targets, &mut created) {
            debug!("Graph context build failed: {}", err);
            for node in created.iter().rev() {
                node.dispose();
            }
            return Err(err);
        }

        let index = created
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id().to_string(), i))
            .collect();
        observer.start();
        debug!(
            "Graph context ready: {} nodes, outputs [{}]",
            created.len(),
            outputs.join(", ")
        );
        Ok(GraphContext {
            nodes: created,
            index,
            outputs,
            scheduler,
            disposed: AtomicBool::new(false),
        })
    }

    fn resolve(&self, ids: &HashMap<&str, usize>) -> Result<Vec<Vec<Target>>> {
        self.graph
            .nodes
            .iter()
            .map(|node| {
                let mut names = HashSet::new();
                node.sources
                    .iter()
                    .map(|source| {
                        if !names.insert(source.name.as_str()) {
                            return Err(Error::GraphValidation {
                                node: node.id.clone(),
                                reason: format!("source name '{}' used twice", source.name),
                            });
                        }
                        if let Some(&i) = ids.get(source.node.as_str()) {
                            Ok(Target::Node(i))
                        } else if self.inputs.contains_key(&source.node) {
                            Ok(Target::Input(source.node.clone()))
                        } else {
                            Err(Error::UnresolvedReference {
                                node: node.id.clone(),
                                reference: source.node.clone(),
                            })
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn instantiate(
        &self,
        order: &[usize],
        targets: &[Vec<Target>],
        created: &mut Vec<Arc<OperatorNode>>,
    ) -> Result<()> {
        let mut by_node: HashMap<usize, Arc<OperatorNode>> = HashMap::new();
        let mut by_input: HashMap<String, Arc<OperatorNode>> = HashMap::new();

        for &i in order {
            let spec = &self.graph.nodes[i];
            let mut wired = Vec::with_capacity(spec.sources.len());
            for (source, target) in spec.sources.iter().zip(&targets[i]) {
                let upstream = match target {
                    Target::Node(j) => by_node.get(j).cloned().ok_or_else(|| {
                        Error::Other(format!("'{}' instantiated before its sources", spec.id))
                    })?,
                    Target::Input(name) => match by_input.get(name) {
                        Some(node) => Arc::clone(node),
                        None => {
                            let provider = self.inputs.get(name).cloned().ok_or_else(|| {
                                Error::UnresolvedReference {
                                    node: spec.id.clone(),
                                    reference: name.clone(),
                                }
                            })?;
                            let node = Arc::new(self.initialize(
                                name,
                                PRODUCT_SOURCE,
                                Box::new(ProductSource::new(provider)),
                                Vec::new(),
                            )?);
                            created.push(Arc::clone(&node));
                            by_input.insert(name.clone(), Arc::clone(&node));
                            node
                        }
                    },
                };
                wired.push((source.name.clone(), upstream));
            }

            let operator = self
                .registry
                .create(&spec.operator, &spec.parameters)
                .map_err(|e| match e {
                    Error::InvalidParameter { .. } => Error::configuration(&spec.id, e),
                    other => other,
                })?;
            let node = Arc::new(self.initialize(&spec.id, &spec.operator, operator, wired)?);
            created.push(Arc::clone(&node));
            by_node.insert(i, node);
        }
        Ok(())
    }

    /// Run `initialize`, settle the tile size and wrap the operator.
    fn initialize(
        &self,
        id: &str,
        type_id: &str,
        mut operator: Box<dyn Operator>,
        wired: Vec<(String, Arc<OperatorNode>)>,
    ) -> Result<OperatorNode> {
        let sources = Sources::new(
            wired
                .iter()
                .map(|(name, node)| SourceInfo {
                    name: name.clone(),
                    node: node.id().to_string(),
                    descriptor: node.descriptor().clone(),
                })
                .collect(),
        );

        let settled = operator
            .initialize(&sources)
            .and_then(|descriptor| {
                descriptor.validate(id)?;
                let layout = self.layout_for(&descriptor, &wired)?;
                Ok((descriptor, layout))
            })
            .map_err(|e| match e {
                Error::Configuration { .. } => e,
                other => Error::configuration(id, other),
            });
        let (mut descriptor, layout) = match settled {
            Ok(settled) => settled,
            Err(err) => {
                operator.dispose();
                return Err(err);
            }
        };
        descriptor.tile_size = Some((layout.tile_width(), layout.tile_height()));

        debug!(
            "Initialized '{}' ({}): {}x{}, {} band(s), {}x{} tiles",
            id,
            type_id,
            descriptor.width,
            descriptor.height,
            descriptor.num_bands(),
            layout.tile_width(),
            layout.tile_height()
        );
        let sources = wired.into_iter().map(|(_, node)| node).collect();
        Ok(OperatorNode::new(
            id.to_string(),
            type_id.to_string(),
            operator,
            descriptor,
            layout,
            sources,
        ))
    }

    /// Declared tile size, else that of a same-sized source, else the
    /// configured default
    fn layout_for(
        &self,
        descriptor: &OutputDescriptor,
        wired: &[(String, Arc<OperatorNode>)],
    ) -> Result<TileLayout> {
        let (tile_width, tile_height) = descriptor
            .tile_size
            .or_else(|| {
                wired
                    .iter()
                    .map(|(_, node)| node.layout())
                    .find(|l| l.width() == descriptor.width && l.height() == descriptor.height)
                    .map(|l| (l.tile_width(), l.tile_height()))
            })
            .unwrap_or((self.config.tile_size, self.config.tile_size));
        TileLayout::new(descriptor.width, descriptor.height, tile_width, tile_height)
    }
}

/// Three-color depth-first traversal; returns nodes with sources first.
fn topological_order(graph: &Graph, edges: &[Vec<usize>]) -> Result<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        i: usize,
        graph: &Graph,
        edges: &[Vec<usize>],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = path.iter().position(|&p| p == i).unwrap_or(0);
                let mut members: Vec<String> = path[start..]
                    .iter()
                    .map(|&p| graph.nodes[p].id.clone())
                    .collect();
                members.push(graph.nodes[i].id.clone());
                return Err(Error::Cycle { members });
            }
            Mark::Unvisited => {}
        }
        marks[i] = Mark::InProgress;
        path.push(i);
        for &source in &edges[i] {
            visit(source, graph, edges, marks, path, order)?;
        }
        path.pop();
        marks[i] = Mark::Done;
        order.push(i);
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; graph.nodes.len()];
    let mut path = Vec::new();
    let mut order = Vec::with_capacity(graph.nodes.len());
    for i in 0..graph.nodes.len() {
        visit(i, graph, edges, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn resolve_outputs(
    graph: &Graph,
    ids: &HashMap<&str, usize>,
    edges: &[Vec<usize>],
) -> Result<Vec<String>> {
    if graph.outputs.is_empty() {
        let consumed: HashSet<usize> = edges.iter().flatten().copied().collect();
        return Ok(graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .map(|(_, n)| n.id.clone())
            .collect());
    }
    let mut outputs: Vec<String> = Vec::with_capacity(graph.outputs.len());
    for id in &graph.outputs {
        if !ids.contains_key(id.as_str()) {
            return Err(Error::GraphValidation {
                node: id.clone(),
                reason: "declared output is not a node of the graph".to_string(),
            });
        }
        if !outputs.contains(id) {
            outputs.push(id.clone());
        }
    }
    Ok(outputs)
}

/// Executable form of a [`Graph`].
///
/// Nodes are immutable after the build; tile requests may be issued from
/// any number of threads. Dropping the context disposes it.
pub struct GraphContext {
    nodes: Vec<Arc<OperatorNode>>,
    index: HashMap<String, usize>,
    outputs: Vec<String>,
    scheduler: TileScheduler,
    disposed: AtomicBool,
}

impl GraphContext {
    pub fn builder<'a>(graph: &'a Graph, registry: &'a OperatorRegistry) -> GraphContextBuilder<'a> {
        GraphContextBuilder {
            graph,
            registry,
            config: EngineConfig::default(),
            inputs: BTreeMap::new(),
            observer: None,
        }
    }

    pub fn new(graph: &Graph, registry: &OperatorRegistry, config: EngineConfig) -> Result<Self> {
        Self::builder(graph, registry).config(config).build()
    }

    /// Node ids in instantiation order; every node follows its sources
    pub fn order(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id()).collect()
    }

    pub fn nodes(&self) -> &[Arc<OperatorNode>] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Result<&Arc<OperatorNode>> {
        self.index
            .get(id)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| Error::invalid_parameter("node", id, "no such node in the context"))
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn descriptor(&self, id: &str) -> Result<&OutputDescriptor> {
        Ok(self.node(id)?.descriptor())
    }

    pub fn observer(&self) -> &Arc<dyn TileObserver> {
        self.scheduler.observer()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// One tile of one band of a node
    pub fn request_tile(&self, id: &str, band: usize, tile: TileIndex) -> Result<Arc<Tile>> {
        self.ensure_live()?;
        let node = self.node(id)?;
        self.scheduler
            .request_tile(node, band, tile, &CancellationToken::new())
    }

    /// Any rectangle of one band of a node
    pub fn request_region(
        &self,
        id: &str,
        band: usize,
        region: Rect,
        request: &RegionRequest,
    ) -> Result<Arc<Tile>> {
        self.ensure_live()?;
        let node = self.node(id)?;
        self.scheduler.request_region(node, band, region, request)
    }

    /// The full extent of one band as a raster
    pub fn read_band(&self, id: &str, band: usize, request: &RegionRequest) -> Result<Raster<f64>> {
        let node = self.node(id)?;
        let tile = self.request_region(id, band, node.layout().bounds(), request)?;
        Ok(to_raster(node, band, &tile))
    }

    /// Compute every band of every output node.
    pub fn execute(&self, request: &RegionRequest) -> Result<Vec<OutputBand>> {
        self.ensure_live()?;
        let mut jobs = Vec::new();
        for id in &self.outputs {
            let node = self.node(id)?;
            for band in 0..node.descriptor().num_bands() {
                jobs.push((node, band));
            }
        }
        let total = jobs.iter().map(|(n, _)| n.layout().num_tiles()).sum();
        request.begin(total);

        let forwarded = RegionRequest {
            cancel: request.cancel.clone(),
            progress: request
                .progress
                .clone()
                .map(|p| Arc::new(WorkedOnly(p)) as Arc<dyn ProgressListener>),
        };
        let result = jobs
            .into_iter()
            .map(|(node, band)| {
                let tile = self.scheduler.request_region(
                    node,
                    band,
                    node.layout().bounds(),
                    &forwarded,
                )?;
                Ok(OutputBand {
                    node: node.id().to_string(),
                    band: node.descriptor().bands[band].name.clone(),
                    raster: to_raster(node, band, &tile),
                })
            })
            .collect();
        request.done();
        result
    }

    /// Named auxiliary result of a node's operator
    pub fn target_property(&self, id: &str, name: &str) -> Result<Option<ParamValue>> {
        self.ensure_live()?;
        Ok(self.node(id)?.operator().target_property(name))
    }

    /// Release operators in reverse topological order. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = self.nodes.iter().rev().filter(|n| n.dispose()).count();
        self.scheduler.observer().stop();
        debug!("Graph context disposed ({} operators released)", released);
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::Disposed("graph context".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Drop for GraphContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContext")
            .field("order", &self.order())
            .field("outputs", &self.outputs)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn to_raster(node: &OperatorNode, band: usize, tile: &Tile) -> Raster<f64> {
    let mut raster = tile.to_raster::<f64>();
    raster.set_crs(node.descriptor().crs.clone());
    raster.set_nodata(node.descriptor().bands[band].nodata);
    raster
}

/// Forwards per-tile progress of nested region requests to a listener
/// whose total was announced up front
struct WorkedOnly(Arc<dyn ProgressListener>);

impl ProgressListener for WorkedOnly {
    fn worked(&self, tiles: usize) {
        self.0.worked(tiles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;

    /// `(id, "comma,separated,sources")` pairs
    fn chain(ids: &[(&str, &str)]) -> Graph {
        ids.iter().fold(Graph::new(), |g, (id, sources)| {
            let node = sources
                .split(',')
                .filter(|s| !s.is_empty())
                .enumerate()
                .fold(GraphNode::new(*id, "T"), |n, (i, s)| n.with_source(format!("s{i}"), s));
            g.with_node(node)
        })
    }

    fn order_of(graph: &Graph) -> Result<Vec<String>> {
        let ids: HashMap<&str, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let edges: Vec<Vec<usize>> = graph
            .nodes
            .iter()
            .map(|n| n.sources.iter().map(|s| ids[s.node.as_str()]).collect())
            .collect();
        Ok(topological_order(graph, &edges)?
            .into_iter()
            .map(|i| graph.nodes[i].id.clone())
            .collect())
    }

    #[test]
    fn sources_come_first() {
        let graph = chain(&[("D", "B,C"), ("B", "A"), ("C", "A,B"), ("A", "")]);
        let order = order_of(&graph).unwrap();
        let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
        for node in &graph.nodes {
            for source in &node.sources {
                assert!(pos(&source.node) < pos(&node.id));
            }
        }
    }

    #[test]
    fn cycle_members_are_reported() {
        let graph = chain(&[("A", "C"), ("B", "A"), ("C", "B"), ("D", "")]);
        match order_of(&graph) {
            Err(Error::Cycle { members }) => {
                assert_eq!(members.first(), members.last());
                for id in ["A", "B", "C"] {
                    assert!(members.iter().any(|m| m == id));
                }
                assert!(!members.iter().any(|m| m == "D"));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn outputs_default_to_unconsumed_nodes() {
        let graph = chain(&[("A", ""), ("B", "A"), ("C", "A")]);
        let ids: HashMap<&str, usize> = [("A", 0), ("B", 1), ("C", 2)].into_iter().collect();
        let edges = vec![vec![], vec![0], vec![0]];
        assert_eq!(resolve_outputs(&graph, &ids, &edges).unwrap(), vec!["B", "C"]);

        let explicit = graph.clone().with_output("A").with_output("A");
        assert_eq!(resolve_outputs(&explicit, &ids, &edges).unwrap(), vec!["A"]);

        let bad = graph.with_output("Z");
        assert!(resolve_outputs(&bad, &ids, &edges).unwrap_err().is_graph_validation());
    }
}
