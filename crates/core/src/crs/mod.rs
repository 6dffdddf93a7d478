//! Coordinate reference carried by output descriptors
//!
//! The engine never reprojects; it only compares references to decide
//! whether two sources share a geometry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Coordinate Reference System identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CRS {
    /// EPSG authority code
    Epsg(u32),
    /// Well-known text definition
    Wkt(String),
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        CRS::Epsg(code)
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        CRS::Wkt(wkt.into())
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        CRS::Epsg(4326)
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            CRS::Epsg(code) => Some(*code),
            CRS::Wkt(_) => None,
        }
    }

    /// Two references are equivalent when both codes match or both WKT
    /// strings match after whitespace normalisation.
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self, other) {
            (CRS::Epsg(a), CRS::Epsg(b)) => a == b,
            (CRS::Wkt(a), CRS::Wkt(b)) => {
                a.split_whitespace().eq(b.split_whitespace())
            }
            _ => false,
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CRS::Epsg(code) => write!(f, "EPSG:{}", code),
            CRS::Wkt(wkt) => write!(f, "WKT:{}", wkt.chars().take(50).collect::<String>()),
        }
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Parses `EPSG:<code>`; anything else is taken as WKT.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("EPSG:") => trimmed[5..]
                .parse()
                .map(CRS::Epsg)
                .map_err(|_| Error::invalid_parameter("crs", s, "invalid EPSG code")),
            _ if trimmed.is_empty() => Err(Error::invalid_parameter("crs", s, "empty")),
            _ => Ok(CRS::Wkt(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs: CRS = "epsg:32630".parse().unwrap();
        assert_eq!(crs.epsg(), Some(32630));
        assert_eq!(crs.to_string(), "EPSG:32630");
        assert!("EPSG:abc".parse::<CRS>().is_err());
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(CRS::from_wkt("GEOGCS[\"x\",  DATUM]").is_equivalent(&CRS::from_wkt("GEOGCS[\"x\", DATUM]")));
        assert!(!CRS::wgs84().is_equivalent(&CRS::from_wkt("GEOGCS")));
    }
}
