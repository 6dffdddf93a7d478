//! Test operators shared by the engine integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rasterflow_core::{
    BorderMode, DataType, Error, ParamDef, ParamSchema, Parameters, Result, Tile, TileIndex,
    Window,
};
use rasterflow_engine::{
    BandDescriptor, ComputeMode, Operator, OperatorRegistry, OperatorSpi, OutputDescriptor,
    Sources, TileContext,
};

/// Shared counters observed by the tests
#[derive(Clone, Default)]
pub struct Probe {
    pub computed: Arc<AtomicUsize>,
    pub disposed: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> Vec<String> {
        self.disposed.lock().unwrap().clone()
    }
}

struct Constant {
    width: usize,
    height: usize,
    tile: usize,
    value: f64,
    tag: String,
    probe: Probe,
}

impl Operator for Constant {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        sources.expect_count("Constant", 0)?;
        Ok(OutputDescriptor::new(self.width, self.height)
            .with_band(BandDescriptor::new("value", DataType::F64))
            .with_tile_size(self.tile, self.tile))
    }

    fn compute_tile(&self, _ctx: &TileContext<'_>, _band: usize, tile: &mut Tile) -> Result<()> {
        self.probe.computed.fetch_add(1, Ordering::SeqCst);
        tile.fill(self.value)
    }

    fn dispose(&self) {
        self.probe.disposed.lock().unwrap().push(self.tag.clone());
    }
}

/// Pass-through with a multiplier, an optional delay and an optional
/// failing tile
struct Scale {
    factor: f64,
    delay: Duration,
    fail_at: Option<TileIndex>,
    tag: String,
    probe: Probe,
}

impl Operator for Scale {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        sources.expect_count("Scale", 1)?;
        let source = &sources.require("Scale", 0)?.descriptor;
        let mut out = OutputDescriptor::like(source);
        out.tile_size = None;
        Ok(out.with_band(BandDescriptor::new("scaled", DataType::F64)))
    }

    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        self.probe.computed.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail_at == Some(ctx.tile_index()) {
            return Err(Error::computation(
                ctx.node_id(),
                ctx.tile_index(),
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated source"),
            ));
        }
        let source = ctx.source_rect(0, band, tile.rect())?;
        for row in 0..tile.height() {
            for col in 0..tile.width() {
                tile.set_sample(row, col, source.get_sample(row, col)? * self.factor)?;
            }
        }
        Ok(())
    }

    fn dispose(&self) {
        self.probe.disposed.lock().unwrap().push(self.tag.clone());
    }
}

/// Running sum along x: each tile adds its source to the last column of
/// the tile to its left (a different tile of the same operator)
struct RowSum {
    probe: Probe,
}

impl Operator for RowSum {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        let source = &sources.require("RowSum", 0)?.descriptor;
        Ok(OutputDescriptor::like(source).with_band(BandDescriptor::new("sum", DataType::F64)))
    }

    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        self.probe.computed.fetch_add(1, Ordering::SeqCst);
        let index = ctx.tile_index();
        let left = if index.tile_x > 0 {
            Some(ctx.own_tile(band, TileIndex::new(index.tile_x - 1, index.tile_y))?)
        } else {
            None
        };
        let source = ctx.source_rect(0, band, tile.rect())?;
        for row in 0..tile.height() {
            let mut acc = match &left {
                Some(l) => l.get_sample(row, l.width() - 1)?,
                None => 0.0,
            };
            for col in 0..tile.width() {
                acc += source.get_sample(row, col)?;
                tile.set_sample(row, col, acc)?;
            }
        }
        Ok(())
    }
}

/// Defective operator asking for the tile it is computing
struct SelfLoop;

impl Operator for SelfLoop {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        let source = &sources.require("SelfLoop", 0)?.descriptor;
        Ok(OutputDescriptor::like(source).with_band(BandDescriptor::new("v", DataType::F64)))
    }

    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, _tile: &mut Tile) -> Result<()> {
        ctx.own_tile(band, ctx.tile_index())?;
        Ok(())
    }
}

/// Tiles (x, y) and (1 - x, y) each pull the other after a delay
struct Mutual {
    delay: Duration,
}

impl Operator for Mutual {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        let source = &sources.require("Mutual", 0)?.descriptor;
        Ok(OutputDescriptor::like(source).with_band(BandDescriptor::new("v", DataType::F64)))
    }

    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        thread::sleep(self.delay);
        let index = ctx.tile_index();
        let other = TileIndex::new(1 - index.tile_x.min(1), index.tile_y);
        ctx.own_tile(band, other)?;
        tile.fill(1.0)
    }
}

/// Source shifted right by `dx` columns; the columns entering on the left
/// come from beyond the source edge
struct Shift {
    dx: i64,
    border: BorderMode,
}

impl Operator for Shift {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        let source = &sources.require("Shift", 0)?.descriptor;
        Ok(OutputDescriptor::like(source).with_band(BandDescriptor::new("v", DataType::F64)))
    }

    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        let rect = tile.rect();
        let (x, y) = (rect.x as i64 - self.dx, rect.y as i64);
        let window = Window::new(x, y, rect.width, rect.height);
        let source = ctx.source_rect_extended(0, band, window, self.border)?;
        for row in 0..rect.height {
            for col in 0..rect.width {
                let v = source.get(y + row as i64, x + col as i64).unwrap_or(-1.0);
                tile.set_sample(row, col, v)?;
            }
        }
        Ok(())
    }
}

/// Two bands from one computation
struct SumDiff {
    probe: Probe,
}

impl Operator for SumDiff {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        sources.expect_count("SumDiff", 2)?;
        let a = &sources.require("SumDiff", 0)?.descriptor;
        let b = &sources.require("SumDiff", 1)?.descriptor;
        if !a.same_geometry(b) {
            return Err(Error::configuration("SumDiff", "sources differ in size"));
        }
        Ok(OutputDescriptor::like(a)
            .with_band(BandDescriptor::new("sum", DataType::F64))
            .with_band(BandDescriptor::new("diff", DataType::F64)))
    }

    fn compute_mode(&self) -> ComputeMode {
        ComputeMode::Stack
    }

    fn compute_tile_stack(&self, ctx: &TileContext<'_>, tiles: &mut [Tile]) -> Result<()> {
        self.probe.computed.fetch_add(1, Ordering::SeqCst);
        let a = ctx.source_rect(0, 0, ctx.rect())?;
        let b = ctx.source_rect(1, 0, ctx.rect())?;
        let (sum, diff) = tiles.split_at_mut(1);
        for row in 0..a.height() {
            for col in 0..a.width() {
                let (x, y) = (a.get_sample(row, col)?, b.get_sample(row, col)?);
                sum[0].set_sample(row, col, x + y)?;
                diff[0].set_sample(row, col, x - y)?;
            }
        }
        Ok(())
    }
}

fn tag(params: &Parameters) -> Result<String> {
    Ok(params.str_or("tag", "")?.to_string())
}

/// Registry of the test operators, all reporting to `probe`
pub fn registry(probe: &Probe) -> OperatorRegistry {
    let mut registry = OperatorRegistry::new();

    let p = probe.clone();
    registry.register(OperatorSpi::new(
        "Constant",
        "Constant raster",
        ParamSchema::new(vec![
            ParamDef::int("width", "Width", 1, 1 << 16).required(),
            ParamDef::int("height", "Height", 1, 1 << 16).required(),
            ParamDef::int("tileSize", "Tile edge", 1, 1 << 16).default_int(4),
            ParamDef::float("value", "Fill value", 0.0),
            ParamDef::text("tag", "Dispose tag"),
        ]),
        move |params| {
            Ok(Box::new(Constant {
                width: params.require_usize("width")?,
                height: params.require_usize("height")?,
                tile: params.require_usize("tileSize")?,
                value: params.require_f64("value")?,
                tag: tag(params)?,
                probe: p.clone(),
            }) as Box<dyn Operator>)
        },
    ));

    let p = probe.clone();
    registry.register(OperatorSpi::new(
        "Scale",
        "Multiply by a factor",
        ParamSchema::new(vec![
            ParamDef::float("factor", "Multiplier", 1.0),
            ParamDef::int("delayMs", "Artificial delay", 0, 10_000).default_int(0),
            ParamDef::int("failX", "Failing tile column", -1, 1 << 16).default_int(-1),
            ParamDef::int("failY", "Failing tile row", -1, 1 << 16).default_int(-1),
            ParamDef::text("tag", "Dispose tag"),
        ]),
        move |params| {
            let fail_x = params.get("failX").and_then(|v| v.as_i64()).unwrap_or(-1);
            let fail_y = params.get("failY").and_then(|v| v.as_i64()).unwrap_or(-1);
            let fail_at = (fail_x >= 0 && fail_y >= 0)
                .then(|| TileIndex::new(fail_x as usize, fail_y as usize));
            Ok(Box::new(Scale {
                factor: params.require_f64("factor")?,
                delay: Duration::from_millis(params.require_usize("delayMs")? as u64),
                fail_at,
                tag: tag(params)?,
                probe: p.clone(),
            }) as Box<dyn Operator>)
        },
    ));

    let p = probe.clone();
    registry.register(OperatorSpi::new(
        "RowSum",
        "Running sum along rows",
        ParamSchema::default(),
        move |_| Ok(Box::new(RowSum { probe: p.clone() }) as Box<dyn Operator>),
    ));

    registry.register(OperatorSpi::new(
        "SelfLoop",
        "Requests its own tile",
        ParamSchema::default(),
        |_| Ok(Box::new(SelfLoop) as Box<dyn Operator>),
    ));

    registry.register(OperatorSpi::new(
        "Mutual",
        "Two tiles requesting each other",
        ParamSchema::new(vec![
            ParamDef::int("delayMs", "Delay before the request", 0, 10_000).default_int(0)
        ]),
        |params| {
            Ok(Box::new(Mutual {
                delay: Duration::from_millis(params.require_usize("delayMs")? as u64),
            }) as Box<dyn Operator>)
        },
    ));

    registry.register(OperatorSpi::new(
        "Shift",
        "Shift right, filling from beyond the edge",
        ParamSchema::new(vec![
            ParamDef::int("dx", "Columns to shift by", -1024, 1024).default_int(0),
            ParamDef::choice("border", "Border fill", &["copy", "zero", "nan"], "copy"),
        ]),
        |params| {
            let border = match params.require_str("border")? {
                "zero" => BorderMode::Zero,
                "nan" => BorderMode::Nan,
                _ => BorderMode::Copy,
            };
            let dx = params.get("dx").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(Box::new(Shift { dx, border }) as Box<dyn Operator>)
        },
    ));

    let p = probe.clone();
    registry.register(OperatorSpi::new(
        "SumDiff",
        "Sum and difference of two sources",
        ParamSchema::default(),
        move |_| Ok(Box::new(SumDiff { probe: p.clone() }) as Box<dyn Operator>),
    ));

    registry
}
