//! Operator parameters: tagged values and declarative schemas
//!
//! A graph node carries a flat bag of [`ParamValue`]s. Each operator type
//! declares a [`ParamSchema`]; the registry validates the bag against it
//! (kinds, ranges, choices, required names) and fills in defaults before
//! the operator is constructed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Runtime parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

/// Kind tag of a [`ParamValue`], used in schema errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Text,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

impl ParamValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer value; floats are accepted when they hold an integral value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|v| usize::try_from(v).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "\"{}\"", v),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Named parameter bag of a graph node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, ParamValue>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn require_f64(&self, name: &str) -> Result<f64> {
        self.typed(name, ParamValue::as_f64, "expected a number")?
            .ok_or_else(|| missing(name))
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        Ok(self
            .typed(name, ParamValue::as_f64, "expected a number")?
            .unwrap_or(default))
    }

    pub fn require_usize(&self, name: &str) -> Result<usize> {
        self.typed(name, ParamValue::as_usize, "expected a non-negative integer")?
            .ok_or_else(|| missing(name))
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        Ok(self
            .typed(name, ParamValue::as_usize, "expected a non-negative integer")?
            .unwrap_or(default))
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        Ok(self
            .typed(name, ParamValue::as_bool, "expected a boolean")?
            .unwrap_or(default))
    }

    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.typed(name, ParamValue::as_str, "expected text")?
            .ok_or_else(|| missing(name))
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        Ok(self
            .typed(name, ParamValue::as_str, "expected text")?
            .unwrap_or(default))
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        extract: impl Fn(&'a ParamValue) -> Option<T>,
        reason: &str,
    ) -> Result<Option<T>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(value) => extract(value)
                .map(Some)
                .ok_or_else(|| Error::invalid_parameter(name, value, reason)),
        }
    }
}

impl FromIterator<(String, ParamValue)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn missing(name: &str) -> Error {
    Error::invalid_parameter(name, "<missing>", "required parameter not set")
}

/// The kind of a declared parameter, with its default and constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Float {
        default: Option<f64>,
        min: f64,
        max: f64,
    },
    Int {
        default: Option<i64>,
        min: i64,
        max: i64,
    },
    Bool {
        default: Option<bool>,
    },
    /// Selection from a fixed list of names (matched case-insensitively)
    Choice {
        options: &'static [&'static str],
        default: Option<&'static str>,
    },
    Text {
        default: Option<&'static str>,
    },
    /// Structured value passed through unchecked
    Structured,
}

/// Definition of a single operator parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamDef {
    pub fn float(name: &'static str, description: &'static str, default: f64) -> Self {
        Self::new(
            name,
            description,
            ParamKind::Float {
                default: Some(default),
                min: f64::NEG_INFINITY,
                max: f64::INFINITY,
            },
        )
    }

    pub fn int(name: &'static str, description: &'static str, min: i64, max: i64) -> Self {
        Self::new(
            name,
            description,
            ParamKind::Int {
                default: None,
                min,
                max,
            },
        )
    }

    pub fn bool(name: &'static str, description: &'static str, default: bool) -> Self {
        Self::new(
            name,
            description,
            ParamKind::Bool {
                default: Some(default),
            },
        )
    }

    pub fn choice(
        name: &'static str,
        description: &'static str,
        options: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self::new(
            name,
            description,
            ParamKind::Choice {
                options,
                default: Some(default),
            },
        )
    }

    pub fn text(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, ParamKind::Text { default: None })
    }

    pub fn structured(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, ParamKind::Structured)
    }

    fn new(name: &'static str, description: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
        }
    }

    /// Mark the parameter as mandatory
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict a numeric parameter to `[min, max]`
    pub fn range(mut self, lo: f64, hi: f64) -> Self {
        match &mut self.kind {
            ParamKind::Float { min, max, .. } => {
                *min = lo;
                *max = hi;
            }
            ParamKind::Int { min, max, .. } => {
                *min = lo as i64;
                *max = hi as i64;
            }
            _ => {}
        }
        self
    }

    /// Give an integer parameter a default value
    pub fn default_int(mut self, value: i64) -> Self {
        if let ParamKind::Int { default, .. } = &mut self.kind {
            *default = Some(value);
        }
        self
    }

    /// Give a text parameter a default value
    pub fn default_text(mut self, value: &'static str) -> Self {
        if let ParamKind::Text { default } = &mut self.kind {
            *default = Some(value);
        }
        self
    }

    fn default_value(&self) -> Option<ParamValue> {
        match &self.kind {
            ParamKind::Float { default, .. } => default.map(ParamValue::Float),
            ParamKind::Int { default, .. } => default.map(ParamValue::Int),
            ParamKind::Bool { default } => default.map(ParamValue::Bool),
            ParamKind::Choice { default, .. } | ParamKind::Text { default } => {
                default.map(ParamValue::from)
            }
            ParamKind::Structured => None,
        }
    }

    /// Check a supplied value and return its normalised form
    fn check(&self, value: &ParamValue) -> Result<ParamValue> {
        let invalid = |reason: String| Error::invalid_parameter(self.name, value, reason);
        match &self.kind {
            ParamKind::Float { min, max, .. } => {
                let v = value
                    .as_f64()
                    .ok_or_else(|| invalid(format!("expected float, got {}", value.kind())))?;
                if v.is_nan() || v < *min || v > *max {
                    return Err(invalid(format!("must be within [{}, {}]", min, max)));
                }
                Ok(ParamValue::Float(v))
            }
            ParamKind::Int { min, max, .. } => {
                let v = value
                    .as_i64()
                    .ok_or_else(|| invalid(format!("expected int, got {}", value.kind())))?;
                if v < *min || v > *max {
                    return Err(invalid(format!("must be within [{}, {}]", min, max)));
                }
                Ok(ParamValue::Int(v))
            }
            ParamKind::Bool { .. } => value
                .as_bool()
                .map(ParamValue::Bool)
                .ok_or_else(|| invalid(format!("expected bool, got {}", value.kind()))),
            ParamKind::Choice { options, .. } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| invalid(format!("expected text, got {}", value.kind())))?;
                options
                    .iter()
                    .find(|o| o.eq_ignore_ascii_case(s))
                    .map(|o| ParamValue::from(*o))
                    .ok_or_else(|| invalid(format!("must be one of {}", options.join(", "))))
            }
            ParamKind::Text { .. } => value
                .as_str()
                .map(ParamValue::from)
                .ok_or_else(|| invalid(format!("expected text, got {}", value.kind()))),
            ParamKind::Structured => Ok(value.clone()),
        }
    }
}

/// Declared parameters of an operator type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    defs: Vec<ParamDef>,
}

impl ParamSchema {
    pub fn new(defs: Vec<ParamDef>) -> Self {
        Self { defs }
    }

    pub fn defs(&self) -> &[ParamDef] {
        &self.defs
    }

    pub fn get(&self, name: &str) -> Option<&ParamDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// Validate a parameter bag and return it with defaults filled in.
    ///
    /// Unknown names, kind mismatches, out-of-range numbers, unknown choices
    /// and missing required parameters are all rejected.
    pub fn validate(&self, params: &Parameters) -> Result<Parameters> {
        for (name, value) in params.iter() {
            if self.get(name).is_none() {
                return Err(Error::invalid_parameter(name, value, "unknown parameter"));
            }
        }

        let mut out = Parameters::new();
        for def in &self.defs {
            match params.get(def.name) {
                Some(value) => out.insert(def.name, def.check(value)?),
                None => match def.default_value() {
                    Some(default) => out.insert(def.name, default),
                    None if def.required => return Err(missing(def.name)),
                    None => {}
                },
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParamSchema {
        ParamSchema::new(vec![
            ParamDef::float("factor", "Multiplier", 1.0).range(-1e6, 1e6),
            ParamDef::int("width", "Width in pixels", 1, 1 << 20).required(),
            ParamDef::choice("method", "Kernel", &["nearest", "bilinear"], "nearest"),
            ParamDef::text("crs", "Coordinate reference"),
        ])
    }

    #[test]
    fn defaults_are_filled() {
        let out = schema()
            .validate(&Parameters::new().with("width", 16))
            .unwrap();
        assert_eq!(out.get("factor"), Some(&ParamValue::Float(1.0)));
        assert_eq!(out.get("method"), Some(&ParamValue::from("nearest")));
        assert!(!out.contains("crs"));
    }

    #[test]
    fn int_is_accepted_as_float_and_choice_is_normalised() {
        let out = schema()
            .validate(
                &Parameters::new()
                    .with("width", 4)
                    .with("factor", 2)
                    .with("method", "BILINEAR"),
            )
            .unwrap();
        assert_eq!(out.require_f64("factor").unwrap(), 2.0);
        assert_eq!(out.require_str("method").unwrap(), "bilinear");
    }

    #[test]
    fn rejects_bad_bags() {
        let s = schema();
        assert!(s.validate(&Parameters::new()).is_err());
        assert!(s
            .validate(&Parameters::new().with("width", 4).with("speed", 1.0))
            .is_err());
        assert!(s.validate(&Parameters::new().with("width", 0)).is_err());
        assert!(s
            .validate(&Parameters::new().with("width", 4).with("method", "sinc"))
            .is_err());
        assert!(s
            .validate(&Parameters::new().with("width", "four"))
            .is_err());
    }

    #[test]
    fn untagged_json_decoding() {
        let params: Parameters =
            serde_json::from_str(r#"{"factor": 2, "scale": 0.5, "name": "b1", "on": true, "bands": [1, 2]}"#)
                .unwrap();
        assert_eq!(params.get("factor"), Some(&ParamValue::Int(2)));
        assert_eq!(params.get("scale"), Some(&ParamValue::Float(0.5)));
        assert_eq!(params.get("name"), Some(&ParamValue::from("b1")));
        assert_eq!(params.get("on"), Some(&ParamValue::Bool(true)));
        assert_eq!(params.get("bands").and_then(|v| v.as_list()).map(|l| l.len()), Some(2));
    }
}
