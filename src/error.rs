use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::query::QueryError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Top-level error surfaced by the recommenders and their collaborators.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph store could not serve a query.
    #[error("gateway failure: {0}")]
    Gateway(#[from] GatewayError),
    /// A query was rejected before it reached the store.
    #[error("invalid query: {0}")]
    Query(#[from] QueryError),
    /// A result row lacked a column the caller projected.
    #[error("row is missing column '{0}'")]
    MissingColumn(String),
    /// A result column held a value of the wrong type.
    #[error("column '{column}' expected {expected}")]
    ColumnType {
        /// Column alias.
        column: String,
        /// Human-readable expected type.
        expected: &'static str,
    },
    /// Dataset file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// Dataset JSON was malformed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// CSV import failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Dataset content is inconsistent (dangling reference, bad relation).
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    /// Caller supplied an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl GraphError {
    /// Returns true when the error originated in the graph store layer.
    pub fn is_gateway_failure(&self) -> bool {
        matches!(self, GraphError::Gateway(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        GraphError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures raised by a graph store session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No session could be acquired from the store.
    #[error("session unavailable: {0}")]
    SessionUnavailable(String),
    /// The store accepted the session but failed to execute the query.
    #[error("query execution failed: {0}")]
    Execution(String),
}
