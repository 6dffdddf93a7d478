//! Sample element types and the typed buffer behind a tile

use num_traits::{NumCast, Zero};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;

use crate::error::Error;

/// Runtime tag of a band's sample type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl DataType {
    /// Size of one sample in bytes
    pub fn size_bytes(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::U8 => "u8",
            DataType::I16 => "i16",
            DataType::U16 => "u16",
            DataType::I32 => "i32",
            DataType::U32 => "u32",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Ok(DataType::U8),
            "i16" | "int16" => Ok(DataType::I16),
            "u16" | "uint16" => Ok(DataType::U16),
            "i32" | "int32" => Ok(DataType::I32),
            "u32" | "uint32" => Ok(DataType::U32),
            "f32" | "float32" => Ok(DataType::F32),
            "f64" | "float64" => Ok(DataType::F64),
            _ => Err(Error::invalid_parameter(
                "dataType",
                s,
                "expected one of u8, i16, u16, i32, u32, f32, f64",
            )),
        }
    }
}

/// Flat, row-major sample buffer of one of the supported element types.
#[derive(Debug, Clone, PartialEq)]
pub enum TileData {
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! dispatch {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            TileData::U8($v) => $body,
            TileData::I16($v) => $body,
            TileData::U16($v) => $body,
            TileData::I32($v) => $body,
            TileData::U32($v) => $body,
            TileData::F32($v) => $body,
            TileData::F64($v) => $body,
        }
    };
}

impl TileData {
    /// Zero-filled buffer of `len` samples
    pub fn zeros(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::U8 => TileData::U8(vec![0; len]),
            DataType::I16 => TileData::I16(vec![0; len]),
            DataType::U16 => TileData::U16(vec![0; len]),
            DataType::I32 => TileData::I32(vec![0; len]),
            DataType::U32 => TileData::U32(vec![0; len]),
            DataType::F32 => TileData::F32(vec![0.0; len]),
            DataType::F64 => TileData::F64(vec![0.0; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            TileData::U8(_) => DataType::U8,
            TileData::I16(_) => DataType::I16,
            TileData::U16(_) => DataType::U16,
            TileData::I32(_) => DataType::I32,
            TileData::U32(_) => DataType::U32,
            TileData::F32(_) => DataType::F32,
            TileData::F64(_) => DataType::F64,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at flat index, widened to f64
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        dispatch!(self, v => v.get(index).and_then(|s| s.to_f64()))
    }

    /// Store an f64 at flat index, converting to the element type.
    ///
    /// Returns `false` when the index is out of range.
    pub fn set_f64(&mut self, index: usize, value: f64) -> bool {
        dispatch!(self, v => match v.get_mut(index) {
            Some(slot) => {
                *slot = RasterElement::from_f64(value);
                true
            }
            None => false,
        })
    }

    /// Fill every sample with `value`
    pub fn fill(&mut self, value: f64) {
        dispatch!(self, v => {
            let s = RasterElement::from_f64(value);
            v.iter_mut().for_each(|x| *x = s);
        })
    }
}

/// Trait for types that can be stored in a raster cell or tile sample.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Runtime tag for this element type
    const DATA_TYPE: DataType;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert from f64, saturating for integer types (NaN maps to zero)
    fn from_f64(value: f64) -> Self;

    /// Borrow the samples of a buffer holding this element type
    fn slice(data: &TileData) -> Option<&[Self]>;

    /// Mutably borrow the samples of a buffer holding this element type
    fn slice_mut(data: &mut TileData) -> Option<&mut [Self]>;

    /// Wrap a vector into a buffer
    fn wrap(samples: Vec<Self>) -> TileData;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $variant:ident) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn from_f64(value: f64) -> Self {
                if value.is_nan() {
                    return 0;
                }
                let v = value.round();
                if v <= <$t>::MIN as f64 {
                    <$t>::MIN
                } else if v >= <$t>::MAX as f64 {
                    <$t>::MAX
                } else {
                    v as $t
                }
            }

            fn slice(data: &TileData) -> Option<&[Self]> {
                match data {
                    TileData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut TileData) -> Option<&mut [Self]> {
                match data {
                    TileData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn wrap(samples: Vec<Self>) -> TileData {
                TileData::$variant(samples)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $variant:ident) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn slice(data: &TileData) -> Option<&[Self]> {
                match data {
                    TileData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut TileData) -> Option<&mut [Self]> {
                match data {
                    TileData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn wrap(samples: Vec<Self>) -> TileData {
                TileData::$variant(samples)
            }
        }
    };
}

impl_raster_element_int!(u8, U8);
impl_raster_element_int!(i16, I16);
impl_raster_element_int!(u16, U16);
impl_raster_element_int!(i32, I32);
impl_raster_element_int!(u32, U32);
impl_raster_element_float!(f32, F32);
impl_raster_element_float!(f64, F64);
