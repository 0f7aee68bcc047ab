#![forbid(unsafe_code)]

//! Graph store access for the recommenders.
//!
//! A [`GraphGateway`] runs one [`QueryAst`] per session: it acquires a session
//! from its [`SessionSource`], executes the query and drops the session before
//! returning, on success and on failure alike. Sessions release their
//! resources in `Drop`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn, Level};

use crate::error::{GraphError, Result};
use crate::query::{ast::QueryAst, cypher, Value};

/// Pattern-match evaluation over [`MemoryGraph`].
mod executor;

/// In-process property-graph store.
pub mod memory;

pub use memory::MemoryGraph;

/// A single acquired connection to the graph store.
///
/// Implementations release the underlying connection when dropped.
pub trait GraphSession {
    /// Executes one query.
    fn run(&mut self, query: &QueryAst) -> Result<QueryResult>;

    /// Issues a trivial round-trip to verify connectivity.
    fn ping(&mut self) -> Result<()>;
}

/// Source of scoped graph sessions.
pub trait SessionSource: Send + Sync {
    /// Acquires a session; the returned guard releases it on drop.
    fn acquire(&self) -> Result<Box<dyn GraphSession + '_>>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Executes graph queries with one scoped session per query.
#[derive(Clone)]
pub struct GraphGateway {
    source: Arc<dyn SessionSource>,
}

impl fmt::Debug for GraphGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphGateway")
            .field("source", &self.source.describe())
            .finish()
    }
}

impl GraphGateway {
    /// Wraps a session source.
    pub fn new<S>(source: S) -> Self
    where
        S: SessionSource + 'static,
    {
        Self {
            source: Arc::new(source),
        }
    }

    /// Wraps an already shared session source.
    pub fn from_shared(source: Arc<dyn SessionSource>) -> Self {
        Self { source }
    }

    /// Runs `query` inside a freshly acquired session.
    pub fn run(&self, query: &QueryAst) -> Result<QueryResult> {
        if tracing::enabled!(Level::DEBUG) {
            let compiled = cypher::compile(query);
            debug!(query = %compiled.text, params = ?compiled.params, "running graph query");
        }
        let mut session = self.source.acquire().map_err(|err| {
            warn!(source = %self.source.describe(), %err, "failed to acquire graph session");
            err
        })?;
        let result = session.run(query);
        drop(session);

        match result {
            Ok(result) => {
                debug!(rows = result.rows.len(), "graph query finished");
                Ok(result)
            }
            Err(err) => {
                error!(source = %self.source.describe(), %err, "graph query failed");
                Err(err)
            }
        }
    }

    /// Reports whether a session can be acquired and answers a ping.
    pub fn health_check(&self) -> bool {
        match self.source.acquire().and_then(|mut session| session.ping()) {
            Ok(()) => true,
            Err(err) => {
                warn!(source = %self.source.describe(), %err, "graph health check failed");
                false
            }
        }
    }

    /// Description of the underlying store.
    pub fn describe(&self) -> String {
        self.source.describe()
    }
}

/// Materialised result returned by a session.
#[derive(Debug, Default, Clone)]
pub struct QueryResult {
    /// The rows returned by the query.
    pub rows: Vec<Record>,
}

impl QueryResult {
    /// Returns true when no rows were produced.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for QueryResult {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Single output row represented as a mapping from alias to value.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Wraps a column map.
    pub fn new(columns: BTreeMap<String, Value>) -> Self {
        Self(columns)
    }

    /// Raw access to a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    fn column(&self, column: &str) -> Result<&Value> {
        self.0
            .get(column)
            .ok_or_else(|| GraphError::MissingColumn(column.to_owned()))
    }

    /// Reads a non-null string column.
    pub fn str(&self, column: &str) -> Result<&str> {
        self.column(column)?
            .as_str()
            .ok_or_else(|| GraphError::ColumnType {
                column: column.to_owned(),
                expected: "string",
            })
    }

    /// Reads a string column that may be null.
    pub fn opt_str(&self, column: &str) -> Result<Option<&str>> {
        match self.column(column)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            _ => Err(GraphError::ColumnType {
                column: column.to_owned(),
                expected: "string or null",
            }),
        }
    }

    /// Reads an integer column; null reads as `None`.
    pub fn opt_int(&self, column: &str) -> Result<Option<i64>> {
        match self.column(column)? {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v)),
            _ => Err(GraphError::ColumnType {
                column: column.to_owned(),
                expected: "integer or null",
            }),
        }
    }

    /// Reads a boolean column; null reads as `None`.
    pub fn opt_bool(&self, column: &str) -> Result<Option<bool>> {
        match self.column(column)? {
            Value::Null => Ok(None),
            Value::Bool(v) => Ok(Some(*v)),
            _ => Err(GraphError::ColumnType {
                column: column.to_owned(),
                expected: "boolean or null",
            }),
        }
    }

    /// Reads a list-of-strings column such as `labels(n)`.
    pub fn strings(&self, column: &str) -> Result<Vec<&str>> {
        let list = self
            .column(column)?
            .as_list()
            .ok_or_else(|| GraphError::ColumnType {
                column: column.to_owned(),
                expected: "list",
            })?;
        list.iter()
            .map(|value| {
                value.as_str().ok_or_else(|| GraphError::ColumnType {
                    column: column.to_owned(),
                    expected: "list of strings",
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        Record::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn typed_accessors_report_the_column() {
        let row = record(&[("itemId", Value::from("a")), ("year", Value::Int(1998))]);
        assert_eq!(row.str("itemId").expect("string"), "a");
        assert_eq!(row.opt_int("year").expect("int"), Some(1998));
        assert!(matches!(
            row.str("missing"),
            Err(GraphError::MissingColumn(col)) if col == "missing"
        ));
        assert!(matches!(
            row.str("year"),
            Err(GraphError::ColumnType { expected: "string", .. })
        ));
    }

    #[test]
    fn nulls_read_as_none() {
        let row = record(&[("name", Value::Null)]);
        assert_eq!(row.opt_str("name").expect("nullable"), None);
    }

    #[test]
    fn label_lists_decode() {
        let row = record(&[("labels", Value::from(vec!["Genre", "Tag"]))]);
        assert_eq!(row.strings("labels").expect("labels"), vec!["Genre", "Tag"]);
    }
}
