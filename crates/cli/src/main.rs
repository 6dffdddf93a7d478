//! rasterflow CLI - run tile-lazy raster processing graphs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use rasterflow_algorithms::{standard_registry, RasterSource};
use rasterflow_core::{ParamDef, ParamKind, Raster};
use rasterflow_engine::{
    ChannelObserver, EngineConfig, Graph, GraphContext, ObserverMessage, OperatorRegistry,
    OutputBand, ProcessingMode, ProgressListener, RegionRequest, TileObserver,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "rasterflow")]
#[command(author, version, about = "Tile-lazy raster processing graphs", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a graph description and print its build order
    Validate {
        /// Graph description (JSON)
        graph: PathBuf,
        /// Constant input raster bound to a source name
        #[arg(short, long = "input", value_name = "NAME=WxH:VALUE")]
        inputs: Vec<String>,
    },
    /// Execute the outputs of a graph and print band statistics
    Run {
        /// Graph description (JSON)
        graph: PathBuf,
        /// Constant input raster bound to a source name
        #[arg(short, long = "input", value_name = "NAME=WxH:VALUE")]
        inputs: Vec<String>,
        /// Compute these nodes instead of the graph outputs
        #[arg(long = "node", value_name = "ID")]
        nodes: Vec<String>,
        /// Worker threads (0 = all cores, 1 = sequential)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
        /// Default tile edge in pixels
        #[arg(long)]
        tile_size: Option<usize>,
        /// Print a per-node summary of computed and cached tiles
        #[arg(long)]
        observe: bool,
    },
    /// List registered operators and their parameters
    Operators,
}

// ─── Inputs ─────────────────────────────────────────────────────────────

/// Constant raster given on the command line as `NAME=WxH:VALUE`
#[derive(Debug, Clone, PartialEq)]
struct InputSpec {
    name: String,
    width: usize,
    height: usize,
    value: f64,
}

fn parse_input(s: &str) -> Result<InputSpec> {
    let (name, rest) = s
        .split_once('=')
        .with_context(|| format!("Input must be 'NAME=WxH:VALUE', got: {}", s))?;
    let (size, value) = rest
        .split_once(':')
        .with_context(|| format!("Missing ':VALUE' in input: {}", s))?;
    let (w, h) = size
        .split_once(['x', 'X'])
        .with_context(|| format!("Size must be 'WxH', got: {}", size))?;
    let spec = InputSpec {
        name: name.trim().to_string(),
        width: w.trim().parse().context("Invalid width")?,
        height: h.trim().parse().context("Invalid height")?,
        value: value.trim().parse().context("Invalid value")?,
    };
    if spec.name.is_empty() {
        bail!("Input name is empty: {}", s);
    }
    if spec.width == 0 || spec.height == 0 {
        bail!("Input {} has an empty size", spec.name);
    }
    Ok(spec)
}

impl InputSpec {
    fn provider(&self) -> Arc<RasterSource<f64>> {
        Arc::new(RasterSource::new(Raster::filled(
            self.height,
            self.width,
            self.value,
        )))
    }
}

// ─── Graph loading and execution ────────────────────────────────────────

fn load_graph(path: &Path) -> Result<Graph> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph {}", path.display()))?;
    let graph: Graph = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse graph {}", path.display()))?;
    debug!("Loaded {} node(s) from {}", graph.nodes.len(), path.display());
    Ok(graph)
}

fn engine_config(threads: Option<usize>, tile_size: Option<usize>) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env().context("Invalid environment configuration")?;
    if let Some(n) = threads {
        config = config.with_mode(ProcessingMode::from_threads(n));
    }
    if let Some(size) = tile_size {
        if size == 0 {
            bail!("Tile size must be positive");
        }
        config = config.with_tile_size(size);
    }
    Ok(config)
}

fn build_context(
    graph: &Graph,
    registry: &OperatorRegistry,
    config: EngineConfig,
    inputs: &[InputSpec],
    observer: Option<Arc<dyn TileObserver>>,
) -> Result<GraphContext> {
    let mut builder = GraphContext::builder(graph, registry).config(config);
    for input in inputs {
        builder = builder.input(input.name.clone(), input.provider());
    }
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }
    builder.build().context("Invalid graph")
}

/// Execute the graph outputs, or `nodes` when given
fn run_graph(
    mut graph: Graph,
    registry: &OperatorRegistry,
    config: EngineConfig,
    inputs: &[InputSpec],
    nodes: &[String],
    observer: Option<Arc<dyn TileObserver>>,
    progress: Option<Arc<dyn ProgressListener>>,
) -> Result<Vec<OutputBand>> {
    if !nodes.is_empty() {
        graph.outputs = nodes.to_vec();
    }
    let ctx = build_context(&graph, registry, config, inputs, observer)?;
    let mut request = RegionRequest::new();
    if let Some(progress) = progress {
        request = request.with_progress(progress);
    }
    let outputs = ctx.execute(&request).context("Graph execution failed")?;
    ctx.dispose();
    Ok(outputs)
}

// ─── Progress and observation ───────────────────────────────────────────

/// Tile progress rendered as a bar
struct BarProgress(ProgressBar);

impl BarProgress {
    fn new() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} tiles ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self(pb)
    }
}

impl ProgressListener for BarProgress {
    fn begin(&self, total: usize) {
        self.0.set_length(total as u64);
        self.0.enable_steady_tick(Duration::from_millis(100));
    }

    fn worked(&self, tiles: usize) {
        self.0.inc(tiles as u64);
    }

    fn done(&self) {
        self.0.finish_and_clear();
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct NodeSummary {
    computed: usize,
    served: usize,
    recomputed: usize,
    net: Duration,
    wall: Duration,
}

fn summarize(rx: &Receiver<ObserverMessage>) -> BTreeMap<String, NodeSummary> {
    let mut out: BTreeMap<String, NodeSummary> = BTreeMap::new();
    for msg in rx.try_iter() {
        match msg {
            ObserverMessage::Computed(e) => {
                let s = out.entry(e.node.clone()).or_default();
                s.computed += 1;
                s.net += e.net;
                s.wall += e.wall();
            }
            ObserverMessage::Recomputed(e) => {
                out.entry(e.node.clone()).or_default().recomputed += 1;
            }
            ObserverMessage::Served(e) => {
                out.entry(e.node).or_default().served += 1;
            }
            ObserverMessage::Started | ObserverMessage::Stopped => {}
        }
    }
    out
}

fn print_summary(summary: &BTreeMap<String, NodeSummary>) {
    println!("\nTile summary:");
    println!(
        "  {:<16} {:>9} {:>7} {:>11} {:>12} {:>12}",
        "node", "computed", "cached", "recomputed", "net", "wall"
    );
    for (node, s) in summary {
        println!(
            "  {:<16} {:>9} {:>7} {:>11} {:>12.2?} {:>12.2?}",
            node, s.computed, s.served, s.recomputed, s.net, s.wall
        );
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")
}

fn describe_param(def: &ParamDef) -> String {
    let kind = match &def.kind {
        ParamKind::Float { default, min, max } => {
            let mut s = "float".to_string();
            if min.is_finite() || max.is_finite() {
                s.push_str(&format!(" [{}, {}]", min, max));
            }
            if let Some(d) = default {
                s.push_str(&format!(" = {}", d));
            }
            s
        }
        ParamKind::Int { default, min, max } => match default {
            Some(d) => format!("int [{}, {}] = {}", min, max, d),
            None => format!("int [{}, {}]", min, max),
        },
        ParamKind::Bool { default } => match default {
            Some(d) => format!("bool = {}", d),
            None => "bool".to_string(),
        },
        ParamKind::Choice { options, default } => match default {
            Some(d) => format!("one of {} = {}", options.join("|"), d),
            None => format!("one of {}", options.join("|")),
        },
        ParamKind::Text { default } => match default {
            Some(d) => format!("text = {}", d),
            None => "text".to_string(),
        },
        ParamKind::Structured => "structured".to_string(),
    };
    if def.required {
        format!("{} (required)", kind)
    } else {
        kind
    }
}

fn print_outputs(outputs: &[OutputBand]) {
    for output in outputs {
        let stats = output.raster.statistics();
        let (rows, cols) = output.raster.shape();
        println!("{}/{} ({} x {})", output.node, output.band, cols, rows);
        if stats.valid > 0 {
            println!("  Min: {:.4}", stats.min);
            println!("  Max: {:.4}", stats.max);
            println!("  Mean: {:.4}", stats.mean);
        }
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid,
            100.0 * stats.valid_fraction()
        );
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let registry = standard_registry();

    match cli.command {
        // ── Validate ─────────────────────────────────────────────────
        Commands::Validate { graph, inputs } => {
            let inputs = inputs
                .iter()
                .map(|s| parse_input(s))
                .collect::<Result<Vec<_>>>()?;
            let config = EngineConfig::from_env().context("Invalid environment configuration")?;
            let parsed = load_graph(&graph)?;
            let ctx = build_context(&parsed, &registry, config, &inputs, None)?;
            println!("Graph: {}", graph.display());
            println!("Build order:");
            for node in ctx.nodes() {
                let desc = node.descriptor();
                println!(
                    "  {:<16} {:<22} {} x {}, {} band(s)",
                    node.id(),
                    node.type_id(),
                    desc.width,
                    desc.height,
                    desc.num_bands()
                );
            }
            println!("Outputs: {}", ctx.outputs().join(", "));
            ctx.dispose();
        }

        // ── Run ──────────────────────────────────────────────────────
        Commands::Run {
            graph,
            inputs,
            nodes,
            threads,
            tile_size,
            observe,
        } => {
            let inputs = inputs
                .iter()
                .map(|s| parse_input(s))
                .collect::<Result<Vec<_>>>()?;
            let config = engine_config(threads, tile_size)?;
            info!("Mode: {:?}, tile size {}", config.mode, config.tile_size);
            let parsed = load_graph(&graph)?;

            let (observer, rx) = if observe {
                let (tx, rx) = unbounded();
                let observer: Arc<dyn TileObserver> = Arc::new(ChannelObserver::new(tx));
                (Some(observer), Some(rx))
            } else {
                (None, None)
            };

            let start = Instant::now();
            let outputs = run_graph(
                parsed,
                &registry,
                config,
                &inputs,
                &nodes,
                observer,
                Some(Arc::new(BarProgress::new())),
            )?;
            let elapsed = start.elapsed();

            print_outputs(&outputs);
            if let Some(rx) = rx {
                print_summary(&summarize(&rx));
            }
            println!("  Processing time: {:.2?}", elapsed);
        }

        // ── Operators ────────────────────────────────────────────────
        Commands::Operators => {
            for spi in registry.descriptors() {
                println!("{}\n  {}", spi.type_id(), spi.description());
                for def in spi.schema().defs() {
                    println!(
                        "    {:<14} {:<44} {}",
                        def.name,
                        describe_param(def),
                        def.description
                    );
                }
            }
        }
    }

    Ok(())
}
