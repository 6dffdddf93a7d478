//! Constant-valued terminal operator

use rasterflow_core::{DataType, ParamDef, ParamSchema, Parameters, Result, Tile};
use rasterflow_engine::{
    BandDescriptor, Operator, OperatorSpi, OutputDescriptor, Sources, TileContext,
};

pub const CONSTANT: &str = "Constant";

/// Raster of a single repeated value, with no sources.
#[derive(Debug, Clone)]
pub struct Constant {
    pub width: usize,
    pub height: usize,
    pub value: f64,
    pub data_type: DataType,
    pub bands: usize,
    pub tile_size: Option<usize>,
}

impl Constant {
    pub fn new(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            value,
            data_type: DataType::F64,
            bands: 1,
            tile_size: None,
        }
    }

    fn from_params(params: &Parameters) -> Result<Self> {
        Ok(Self {
            width: params.require_usize("width")?,
            height: params.require_usize("height")?,
            value: params.require_f64("value")?,
            data_type: params.require_str("dataType")?.parse()?,
            bands: params.require_usize("bands")?,
            tile_size: params.get("tileSize").and_then(|v| v.as_usize()),
        })
    }

    pub fn spi() -> OperatorSpi {
        OperatorSpi::new(
            CONSTANT,
            "Raster filled with one value",
            ParamSchema::new(vec![
                ParamDef::int("width", "Raster width in pixels", 1, 1 << 20).required(),
                ParamDef::int("height", "Raster height in pixels", 1, 1 << 20).required(),
                ParamDef::float("value", "Fill value", 0.0),
                ParamDef::choice(
                    "dataType",
                    "Sample type",
                    &["u8", "i16", "u16", "i32", "u32", "f32", "f64"],
                    "f64",
                ),
                ParamDef::int("bands", "Number of bands", 1, 64).default_int(1),
                ParamDef::int("tileSize", "Square tile edge", 1, 1 << 16),
            ]),
            |params| Ok(Box::new(Self::from_params(params)?) as Box<dyn Operator>),
        )
    }
}

impl Operator for Constant {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        sources.expect_count(CONSTANT, 0)?;
        let mut out = OutputDescriptor::new(self.width, self.height);
        for b in 0..self.bands {
            out = out.with_band(BandDescriptor::new(format!("band_{}", b + 1), self.data_type));
        }
        if let Some(size) = self.tile_size {
            out = out.with_tile_size(size, size);
        }
        Ok(out)
    }

    fn compute_tile(&self, _ctx: &TileContext<'_>, _band: usize, tile: &mut Tile) -> Result<()> {
        tile.fill(self.value)
    }
}
