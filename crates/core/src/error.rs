//! Error types for rasterflow

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::raster::{Rect, TileIndex};

/// Shared, thread-safe cause of a failed computation.
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// Main error type for rasterflow operations.
///
/// The variants fall into four families: graph validation (fatal when a
/// context is built), configuration (fatal in `initialize`), computation
/// (fatal for the requested region only) and re-entrancy (a defect in an
/// operator). `Error` is `Clone` so one failure can be handed to every
/// requester that was waiting on the same tile.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("graph validation failed at node '{node}': {reason}")]
    GraphValidation { node: String, reason: String },

    #[error("node '{node}' references unknown source '{reference}'")]
    UnresolvedReference { node: String, reference: String },

    #[error("graph contains a cycle: {}", .members.join(" -> "))]
    Cycle { members: Vec<String> },

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("operator '{operator}': {reason}")]
    Configuration { operator: String, reason: String },

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("unknown operator type '{0}'")]
    UnknownOperator(String),

    #[error("computation of {tile} in '{operator}' failed: {source}")]
    Computation {
        operator: String,
        tile: TileIndex,
        source: Cause,
    },

    #[error("re-entrant request for {tile} of band {band} in '{operator}'")]
    Reentrancy {
        operator: String,
        band: usize,
        tile: TileIndex,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operator '{0}' has been disposed")]
    Disposed(String),

    #[error("tile {0} is published and can no longer be modified")]
    TilePublished(Rect),

    #[error("invalid region {region}: {reason}")]
    InvalidRegion { region: Rect, reason: String },

    #[error("invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Configuration failure attributed to an operator.
    pub fn configuration(operator: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Configuration {
            operator: operator.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap an arbitrary cause as a tile computation failure.
    ///
    /// Errors that already carry a computation, re-entrancy or cancellation
    /// meaning are passed through untouched so the original category reaches
    /// the requester.
    pub fn computation<E>(operator: impl Into<String>, tile: TileIndex, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let cause: Box<dyn std::error::Error + Send + Sync> = cause.into();
        match cause.downcast::<Error>() {
            Ok(inner) => match *inner {
                e @ (Error::Computation { .. } | Error::Reentrancy { .. } | Error::Cancelled) => e,
                other => Error::Computation {
                    operator: operator.into(),
                    tile,
                    source: Arc::new(other),
                },
            },
            Err(cause) => Error::Computation {
                operator: operator.into(),
                tile,
                source: Arc::from(cause),
            },
        }
    }

    /// Invalid parameter value.
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_graph_validation(&self) -> bool {
        matches!(
            self,
            Error::GraphValidation { .. }
                | Error::UnresolvedReference { .. }
                | Error::Cycle { .. }
                | Error::DuplicateNode(_)
        )
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. } | Error::InvalidParameter { .. } | Error::UnknownOperator(_)
        )
    }

    pub fn is_computation(&self) -> bool {
        matches!(self, Error::Computation { .. })
    }

    pub fn is_reentrancy(&self) -> bool {
        match self {
            Error::Reentrancy { .. } => true,
            Error::Computation { source, .. } => source
                .downcast_ref::<Error>()
                .is_some_and(Error::is_reentrancy),
            _ => false,
        }
    }
}

/// Result type alias for rasterflow operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computation_wraps_foreign_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let err = Error::computation("reader", TileIndex::new(1, 2), io);
        assert!(err.is_computation());
        assert!(err.to_string().contains("short read"));
    }

    #[test]
    fn computation_keeps_reentrancy_category() {
        let inner = Error::Reentrancy {
            operator: "B".into(),
            band: 0,
            tile: TileIndex::new(0, 0),
        };
        let err = Error::computation("B", TileIndex::new(0, 0), inner);
        assert!(err.is_reentrancy());
        assert!(!err.is_computation());
    }

    #[test]
    fn cycle_message_lists_members() {
        let err = Error::Cycle {
            members: vec!["X".into(), "Y".into(), "X".into()],
        };
        assert!(err.is_graph_validation());
        assert_eq!(err.to_string(), "graph contains a cycle: X -> Y -> X");
    }
}
