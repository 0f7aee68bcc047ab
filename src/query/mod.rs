#![forbid(unsafe_code)]

//! Query construction for the graph gateway.
//!
//! Recommenders describe what they need from the store as a typed
//! [`ast::QueryAst`], assembled through the fluent [`QueryBuilder`]. The AST is
//! executed directly by in-process stores or rendered to parameterized Cypher
//! by [`cypher::compile`].

/// Abstract syntax tree (AST) for graph queries.
///
/// Defines match clauses, edge expansions, predicates and projections.
pub mod ast;

/// Query builder for programmatic query construction.
///
/// Provides a fluent API that validates variable scoping on `build`.
pub mod builder;

/// Parameterized Cypher rendering.
pub mod cypher;

/// Query composition errors.
pub mod errors;

/// Scalar values used by literals, parameters and result rows.
pub mod value;

pub use builder::{predicate, EdgeSpec, ProjectionSpec, QueryBuilder};
pub use cypher::{compile, CompiledQuery};
pub use errors::QueryError;
pub use value::Value;
