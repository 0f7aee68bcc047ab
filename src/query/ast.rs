//! Abstract syntax tree for the graph pattern-match queries issued by the
//! recommenders.
//!
//! Queries are built with [`crate::query::QueryBuilder`] and consumed either
//! by an in-process store (which walks the AST directly) or by
//! [`crate::query::cypher::compile`] for text-based stores. Literal values
//! only ever live inside the AST; they become bound parameters on rendering.

use crate::query::Value;

/// Identifier assigned to a binding (node) within the query.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(pub String);

impl Var {
    /// Returns the variable name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Var {
    fn from(value: &str) -> Self {
        Var(value.to_owned())
    }
}

/// A match clause describing a node binding, its label and inline key properties.
#[derive(Clone, Debug)]
pub struct MatchClause {
    /// The variable binding for this match clause.
    pub var: Var,
    /// Optional label to filter nodes by type.
    pub label: Option<String>,
    /// Inline equality constraints, rendered as `{prop: $p}`.
    pub props: Vec<(String, Value)>,
}

/// Direction selector for edge traversals.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EdgeDirection {
    /// Outgoing edges from the source node.
    #[default]
    Out,
    /// Incoming edges to the source node.
    In,
    /// Edges in both directions.
    Both,
}

impl EdgeDirection {
    /// Direction seen from the other endpoint.
    pub fn reversed(self) -> Self {
        match self {
            EdgeDirection::Out => EdgeDirection::In,
            EdgeDirection::In => EdgeDirection::Out,
            EdgeDirection::Both => EdgeDirection::Both,
        }
    }
}

/// Edge expansion captured in the AST.
#[derive(Clone, Debug)]
pub struct EdgeClause {
    /// Source variable for the edge traversal.
    pub from: Var,
    /// Destination variable for the edge traversal.
    pub to: Var,
    /// Accepted edge types; empty means any type.
    pub edge_types: Vec<String>,
    /// Direction of the edge traversal.
    pub direction: EdgeDirection,
}

/// Property comparisons against literal values.
#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    /// `var.prop = value`
    Eq {
        /// Variable to test the property on.
        var: Var,
        /// Property name to check.
        prop: String,
        /// Expected value.
        value: Value,
    },
    /// `var.prop <> value`
    Ne {
        /// Variable to test the property on.
        var: Var,
        /// Property name to check.
        prop: String,
        /// Rejected value.
        value: Value,
    },
    /// `var.prop IN [values]`
    In {
        /// Variable to test the property on.
        var: Var,
        /// Property name to check.
        prop: String,
        /// Accepted values (non-empty, homogeneous).
        values: Vec<Value>,
    },
    /// Case-insensitive substring test on a string property.
    Contains {
        /// Variable to test the property on.
        var: Var,
        /// Property name to check.
        prop: String,
        /// Substring to look for.
        needle: String,
    },
}

impl Comparison {
    /// Variable the comparison reads from.
    pub fn var(&self) -> &Var {
        match self {
            Comparison::Eq { var, .. }
            | Comparison::Ne { var, .. }
            | Comparison::In { var, .. }
            | Comparison::Contains { var, .. } => var,
        }
    }
}

/// Existence test for a one-hop pattern anchored at an already bound variable.
///
/// The target variable is local to the pattern and never escapes into the
/// outer bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternPredicate {
    /// Bound variable the pattern starts from.
    pub from: Var,
    /// Accepted edge types; empty means any type.
    pub edge_types: Vec<String>,
    /// Traversal direction relative to `from`.
    pub direction: EdgeDirection,
    /// Pattern-local variable for the far endpoint.
    pub target: Var,
    /// Optional label for the far endpoint.
    pub label: Option<String>,
    /// Optional filter evaluated with `target` bound to the far endpoint.
    pub filter: Option<Box<BoolExpr>>,
}

/// Boolean predicate tree.
#[derive(Clone, Debug, PartialEq)]
pub enum BoolExpr {
    /// Leaf comparison.
    Cmp(Comparison),
    /// Pattern existence test.
    Exists(PatternPredicate),
    /// Conjunction of all children.
    And(Vec<BoolExpr>),
    /// Negation.
    Not(Box<BoolExpr>),
}

/// Projection item included in the final result.
#[derive(Clone, Debug)]
pub enum Projection {
    /// `var.prop AS alias`
    Prop {
        /// Variable to read from.
        var: Var,
        /// Property name.
        prop: String,
        /// Output column name.
        alias: String,
    },
    /// `labels(var) AS alias`
    Labels {
        /// Variable to read from.
        var: Var,
        /// Output column name.
        alias: String,
    },
}

impl Projection {
    /// Output column name.
    pub fn alias(&self) -> &str {
        match self {
            Projection::Prop { alias, .. } | Projection::Labels { alias, .. } => alias,
        }
    }

    /// Variable the projection reads from.
    pub fn var(&self) -> &Var {
        match self {
            Projection::Prop { var, .. } | Projection::Labels { var, .. } => var,
        }
    }
}

/// Sort key referencing a projection alias.
#[derive(Clone, Debug)]
pub struct OrderBy {
    /// Projection alias to sort on.
    pub alias: String,
    /// Sort descending when true.
    pub descending: bool,
}

/// Top-level AST produced by the query builder.
#[derive(Clone, Debug, Default)]
pub struct QueryAst {
    /// Match clauses defining variable bindings.
    pub matches: Vec<MatchClause>,
    /// Edge traversal clauses connecting variables.
    pub edges: Vec<EdgeClause>,
    /// Combined filter; `None` means unfiltered.
    pub predicate: Option<BoolExpr>,
    /// Whether to deduplicate result rows.
    pub distinct: bool,
    /// Projection items defining the output columns.
    pub projections: Vec<Projection>,
    /// Sort keys applied after projection.
    pub order_by: Vec<OrderBy>,
    /// Maximum number of rows returned.
    pub limit: Option<usize>,
}
