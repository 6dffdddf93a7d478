//! Rectangular subset of a source

use rasterflow_core::{Error, ParamDef, ParamSchema, Parameters, Rect, Result, Tile};
use rasterflow_engine::{
    BandDescriptor, Operator, OperatorSpi, OutputDescriptor, Sources, TileContext,
};

pub const SUBSET: &str = "Subset";

/// The `region` window of its source, re-based to the origin.
///
/// Target tiles generally straddle source tiles; each one pulls the
/// matching source rectangle, which the scheduler assembles.
#[derive(Debug, Clone)]
pub struct Subset {
    pub region: Rect,
}

impl Subset {
    pub fn new(region: Rect) -> Self {
        Self { region }
    }

    pub fn spi() -> OperatorSpi {
        OperatorSpi::new(
            SUBSET,
            "Rectangular window of the source",
            ParamSchema::new(vec![
                ParamDef::int("x", "Left column", 0, 1 << 20).default_int(0),
                ParamDef::int("y", "Top row", 0, 1 << 20).default_int(0),
                ParamDef::int("width", "Width in pixels", 1, 1 << 20).required(),
                ParamDef::int("height", "Height in pixels", 1, 1 << 20).required(),
            ]),
            |params: &Parameters| {
                Ok(Box::new(Self::new(Rect::new(
                    params.require_usize("x")?,
                    params.require_usize("y")?,
                    params.require_usize("width")?,
                    params.require_usize("height")?,
                ))) as Box<dyn Operator>)
            },
        )
    }
}

impl Operator for Subset {
    fn initialize(&mut self, sources: &Sources) -> Result<OutputDescriptor> {
        sources.expect_count(SUBSET, 1)?;
        let source = &sources.require(SUBSET, 0)?.descriptor;
        let bounds = Rect::new(0, 0, source.width, source.height);
        if self.region.is_empty() || !bounds.contains_rect(&self.region) {
            return Err(Error::configuration(
                SUBSET,
                format!(
                    "region {:?} outside source of {}x{}",
                    self.region, source.width, source.height
                ),
            ));
        }

        let mut out = OutputDescriptor::new(self.region.width, self.region.height)
            .with_crs(source.crs.clone());
        for band in &source.bands {
            let mut desc = BandDescriptor::new(band.name.clone(), band.data_type);
            desc.nodata = band.nodata;
            out = out.with_band(desc);
        }
        Ok(out)
    }

    fn compute_tile(&self, ctx: &TileContext<'_>, band: usize, tile: &mut Tile) -> Result<()> {
        let rect = tile.rect();
        let shifted = Rect::new(
            rect.x + self.region.x,
            rect.y + self.region.y,
            rect.width,
            rect.height,
        );
        let source = ctx.source_rect(0, band, shifted)?;
        for row in 0..rect.height {
            for col in 0..rect.width {
                tile.set_sample(row, col, source.get_sample(row, col)?)?;
            }
        }
        Ok(())
    }
}
