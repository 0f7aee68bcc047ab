#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// Structured errors emitted while composing a query.
///
/// Every variant is raised by [`crate::query::QueryBuilder::build`] before a
/// query reaches any store, so a malformed composition never executes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// No match clauses were supplied.
    #[error("query requires at least one MATCH clause")]
    EmptyMatches,
    /// A match variable was declared more than once with different constraints.
    #[error("duplicate match variable '{var}'")]
    DuplicateVariable { var: String },
    /// Referenced variable was never declared.
    #[error("unknown variable '{var}' referenced in {context}")]
    UnknownVariable { var: String, context: &'static str },
    /// An edge or property constraint was added before any node was matched.
    #[error("{context} requires an existing left variable")]
    MissingLeftVariable { context: &'static str },
    /// A pattern-local variable shadows an outer binding.
    #[error("pattern variable '{var}' shadows a matched variable")]
    PatternShadowsVariable { var: String },
    /// A predicate group was opened but nothing was added to it.
    #[error("predicate group must emit at least one predicate")]
    EmptyPredicateGroup,
    /// IN list normalized to zero entries.
    #[error("in() requires at least one literal")]
    InListEmpty,
    /// IN list mixed literal types.
    #[error("in() requires all values to share the same type")]
    InListMixedTypes,
    /// The query projects nothing.
    #[error("query must project at least one column")]
    EmptyProjection,
    /// Projection alias cannot be blank or whitespace-only.
    #[error("projection alias cannot be empty")]
    EmptyProjectionAlias,
    /// Two projections share an alias.
    #[error("duplicate projection alias '{alias}'")]
    DuplicateAlias { alias: String },
    /// ORDER BY references an alias that is not projected.
    #[error("order by references unknown alias '{alias}'")]
    UnknownOrderAlias { alias: String },
    /// A projection string was not of the form `var.prop`.
    #[error("projection '{spec}' must be of the form var.prop")]
    MalformedProjection { spec: String },
}

impl QueryError {
    /// Builds an [`QueryError::UnknownVariable`] for a specific context.
    pub fn unknown_var(var: impl Into<String>, context: &'static str) -> Self {
        QueryError::UnknownVariable {
            var: var.into(),
            context,
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::EmptyMatches => "EmptyMatches",
            QueryError::DuplicateVariable { .. } => "DuplicateVariable",
            QueryError::UnknownVariable { .. } => "UnknownVariable",
            QueryError::MissingLeftVariable { .. } => "MissingLeftVariable",
            QueryError::PatternShadowsVariable { .. } => "PatternShadowsVariable",
            QueryError::EmptyPredicateGroup => "EmptyPredicateGroup",
            QueryError::InListEmpty => "InListEmpty",
            QueryError::InListMixedTypes => "TypeMismatch",
            QueryError::EmptyProjection => "EmptyProjection",
            QueryError::EmptyProjectionAlias => "EmptyProjectionAlias",
            QueryError::DuplicateAlias { .. } => "DuplicateAlias",
            QueryError::UnknownOrderAlias { .. } => "UnknownOrderAlias",
            QueryError::MalformedProjection { .. } => "MalformedProjection",
        }
    }
}

/// Convenience wrapper that formats query errors with their codes.
pub struct QueryErrorWithCode<'a>(pub &'a QueryError);

impl fmt::Display for QueryErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
