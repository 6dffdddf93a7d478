//! Structural metadata produced by `Operator::initialize`

use rasterflow_core::{DataType, Error, Result, CRS};

/// One output band of an operator
#[derive(Debug, Clone, PartialEq)]
pub struct BandDescriptor {
    pub name: String,
    pub data_type: DataType,
    pub nodata: Option<f64>,
}

impl BandDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nodata: None,
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }
}

/// Size, band list and georeferencing of an operator's output.
///
/// `tile_size` may be left unset; the graph context then inherits the tile
/// size of a same-sized source, or falls back to the engine default.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDescriptor {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<BandDescriptor>,
    pub tile_size: Option<(usize, usize)>,
    pub crs: Option<CRS>,
}

impl OutputDescriptor {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bands: Vec::new(),
            tile_size: None,
            crs: None,
        }
    }

    /// Same size and georeferencing as `other`, without bands
    pub fn like(other: &OutputDescriptor) -> Self {
        Self {
            width: other.width,
            height: other.height,
            bands: Vec::new(),
            tile_size: other.tile_size,
            crs: other.crs.clone(),
        }
    }

    pub fn with_band(mut self, band: BandDescriptor) -> Self {
        self.bands.push(band);
        self
    }

    pub fn with_tile_size(mut self, tile_width: usize, tile_height: usize) -> Self {
        self.tile_size = Some((tile_width, tile_height));
        self
    }

    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, index: usize) -> Option<&BandDescriptor> {
        self.bands.get(index)
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b.name == name)
    }

    /// Identical raster dimensions and equivalent CRS
    pub fn same_geometry(&self, other: &OutputDescriptor) -> bool {
        self.width == other.width
            && self.height == other.height
            && match (&self.crs, &other.crs) {
                (Some(a), Some(b)) => a.is_equivalent(b),
                (None, None) => true,
                _ => false,
            }
    }

    /// Structural checks applied to every descriptor an operator returns
    pub fn validate(&self, operator: &str) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::configuration(
                operator,
                format!("output size {}x{} is empty", self.width, self.height),
            ));
        }
        if self.bands.is_empty() {
            return Err(Error::configuration(operator, "output declares no bands"));
        }
        if let Some((tw, th)) = self.tile_size {
            if tw == 0 || th == 0 {
                return Err(Error::configuration(
                    operator,
                    format!("tile size {tw}x{th} is empty"),
                ));
            }
        }
        for (i, band) in self.bands.iter().enumerate() {
            if self.bands[..i].iter().any(|b| b.name == band.name) {
                return Err(Error::configuration(
                    operator,
                    format!("duplicate band name '{}'", band.name),
                ));
            }
        }
        Ok(())
    }
}

/// A wired source as seen by `Operator::initialize`
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Name given to the source reference in the graph
    pub name: String,
    /// Id of the node (or external input) providing it
    pub node: String,
    pub descriptor: OutputDescriptor,
}

/// Ordered source list handed to `Operator::initialize`
#[derive(Debug, Clone, Default)]
pub struct Sources {
    items: Vec<SourceInfo>,
}

impl Sources {
    pub fn new(items: Vec<SourceInfo>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SourceInfo> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceInfo> {
        self.items.iter()
    }

    /// Position of the source reference called `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|s| s.name == name)
    }

    /// Fail unless exactly `count` sources are wired
    pub fn expect_count(&self, operator: &str, count: usize) -> Result<()> {
        if self.items.len() == count {
            Ok(())
        } else {
            Err(Error::configuration(
                operator,
                format!("expected {count} source(s), got {}", self.items.len()),
            ))
        }
    }

    /// Source `index` or a configuration error
    pub fn require(&self, operator: &str, index: usize) -> Result<&SourceInfo> {
        self.items.get(index).ok_or_else(|| {
            Error::configuration(operator, format!("missing source #{index}"))
        })
    }

    /// Index of the source reference called `name` or a configuration error
    pub fn require_named(&self, operator: &str, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| {
            Error::configuration(operator, format!("missing source '{name}'"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(width: usize, height: usize) -> OutputDescriptor {
        OutputDescriptor::new(width, height).with_band(BandDescriptor::new("v", DataType::F32))
    }

    #[test]
    fn validate_rejects_empty_outputs() {
        assert!(single(4, 4).validate("op").is_ok());
        assert!(single(0, 4).validate("op").unwrap_err().is_configuration());
        assert!(OutputDescriptor::new(4, 4).validate("op").is_err());
        let dup = single(4, 4).with_band(BandDescriptor::new("v", DataType::U8));
        assert!(dup.validate("op").is_err());
    }

    #[test]
    fn geometry_comparison_includes_crs() {
        let a = single(4, 4).with_crs(Some(CRS::from_epsg(4326)));
        let b = single(4, 4).with_crs(Some(CRS::wgs84()));
        let c = single(4, 4);
        assert!(a.same_geometry(&b));
        assert!(!a.same_geometry(&c));
        assert!(!a.same_geometry(&single(4, 5).with_crs(Some(CRS::wgs84()))));
    }

    #[test]
    fn named_sources() {
        let sources = Sources::new(vec![
            SourceInfo {
                name: "a".into(),
                node: "n1".into(),
                descriptor: single(2, 2),
            },
            SourceInfo {
                name: "b".into(),
                node: "n2".into(),
                descriptor: single(2, 2),
            },
        ]);
        assert_eq!(sources.require_named("op", "b").unwrap(), 1);
        assert!(sources.require_named("op", "c").unwrap_err().is_configuration());
        assert!(sources.expect_count("op", 1).is_err());
    }
}
