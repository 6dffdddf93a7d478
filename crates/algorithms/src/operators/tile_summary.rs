//! Pass-through that keeps per-tile statistics

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use rasterflow_core::{ParamSchema, ParamValue, Rect, Result, SampleStats, Tile};
use rasterflow_engine::{
    BandDescriptor, Operator, OperatorSpi, OutputDescriptor, Sources, TileContext,
};

pub const TILE_SUMMARY: &str = "TileSummary";

/// Statistics of one computed tile
#[derive(Debug, Clone, PartialEq)]
pub struct TileRecord {
    pub band: usize,
    pub rect: Rect,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Samples that were neither NaN nor no-data
    pub valid: usize,
}

impl TileRecord {
    fn new(band: usize, rect: Rect, stats: SampleStats) -> Self {
        Self {
            band,
            rect,
            min: stats.min,
            max: stats.max,
            mean: stats.mean,
            valid: stats.valid,
        }
    }

    fn to_value(&self) -> ParamValue {
        let mut map = BTreeMap::new();
        map.insert("band".to_string(), ParamValue::from(self.band));
        map.insert("x".to_string(), ParamValue::from(self.rect.x));
        map.insert("y".to_string(), ParamValue::from(self.rect.y));
        map.insert("width".to_string(), ParamValue::from(self.rect.width));
        map.insert("height".to_string(), ParamValue::from(self.rect.height));
        map.insert("min".to_string(), ParamValue::from(self.min));
        map.insert("max".to_string(), ParamValue::from(self.max));
        map.insert("mean".to_string(), ParamValue::from(self.mean));
        map.insert("valid".to_string(), ParamValue::from(self.valid));
        ParamValue::Map(map)
    }
}

/// Copies its source unchanged and records min, max, mean and valid count
/// of every tile it computes.
///
/// The records are exposed as the target property `records`, in completion
/// order. A recomputed tile replaces its earlier record.
#[derive(Debug, Default)]
pub struct TileSummary {
    nodata: Vec<Option<f64>>,
    records: Mutex<Vec<TileRecord>>,
}

impl TileSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spi() -> OperatorSpi {
        OperatorSpi::new(
            TILE_SUMMARY,
            "Pass-through recording per-tile statistics",
            ParamSchema::default(),
            |_| Ok(Box::new(Self::new()) as Box<dyn Operator>),
        )
    }

    /// Snapshot of the records collected so far
    pub fn records(&self) -> Vec<TileRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Operator for TileSummary {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        sources.expect_count(TILE_SUMMARY, 1)?;
        let source = &sources.require(TILE_SUMMARY, 0)?.descriptor;
        self.nodata = source.bands.iter().map(|b| b.nodata).collect();

        let mut out = OutputDescriptor::like(source);
        for band in &source.bands {
            let mut desc = BandDescriptor::new(band.name.clone(), band.data_type);
            desc.nodata = band.nodata;
            out = out.with_band(desc);
        }
        Ok(out)
    }

    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        let source = ctx.source_rect(0, band, tile.rect())?;
        tile.copy_from(&source)?;

        let nodata = self.nodata.get(band).copied().flatten();
        let record = TileRecord::new(band, tile.rect(), tile.statistics(nodata));

        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match records
            .iter_mut()
            .find(|r| r.band == record.band && r.rect == record.rect)
        {
            Some(previous) => *previous = record,
            None => records.push(record),
        }
        Ok(())
    }

    fn target_property(&self, name: &str) -> Option<ParamValue> {
        match name {
            "records" => Some(ParamValue::List(
                self.records().iter().map(TileRecord::to_value).collect(),
            )),
            _ => None,
        }
    }
}
