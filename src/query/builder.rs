//! Fluent query builder.
//!
//! Predicates are accumulated as a structured list and combined into a single
//! [`BoolExpr::And`] when more than one is present, so callers can add any
//! subset of independent filters without caring which one comes first.
//! [`QueryBuilder::build`] validates variable scoping before the AST is handed
//! to a store.

use std::collections::HashSet;
use std::mem;

use crate::query::{
    ast::{
        BoolExpr, Comparison, EdgeClause, EdgeDirection, MatchClause, OrderBy, PatternPredicate,
        Projection, QueryAst, Var,
    },
    errors::QueryError,
    Value,
};

/// Fluent builder producing a validated [`QueryAst`].
#[derive(Default)]
pub struct QueryBuilder {
    ast: QueryAst,
    last_var: Option<Var>,
    next_var_idx: usize,
    pending_direction: EdgeDirection,
    error: Option<QueryError>,
}

impl QueryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node match clause.
    pub fn r#match<T>(mut self, target: T) -> Self
    where
        T: Into<MatchTarget>,
    {
        if self.error.is_some() {
            return self;
        }
        let (var, label) = target.into().into_parts(self.next_auto_var());
        self.declare(var.clone(), label);
        self.last_var = Some(var);
        self
    }

    /// Adds an inline equality constraint on the most recently matched node.
    pub fn keyed<P, V>(mut self, prop: P, value: V) -> Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        if self.error.is_some() {
            return self;
        }
        let Some(var) = self.last_var.clone() else {
            self.error = Some(QueryError::MissingLeftVariable { context: "keyed" });
            return self;
        };
        if let Some(clause) = self.ast.matches.iter_mut().find(|m| m.var == var) {
            clause.props.push((prop.into(), value.into()));
        }
        self
    }

    /// Moves the traversal cursor back to an already matched variable.
    pub fn from_var(mut self, var: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        let var = Var::from(var);
        if !self.ast.matches.iter().any(|m| m.var == var) {
            self.error = Some(QueryError::unknown_var(var.0, "from_var"));
            return self;
        }
        self.last_var = Some(var);
        self
    }

    /// Adds an edge clause from the current variable to the supplied target.
    pub fn where_edge<E, T>(mut self, edge: E, target: T) -> Self
    where
        E: Into<EdgeSpec>,
        T: Into<MatchTarget>,
    {
        if self.error.is_some() {
            return self;
        }
        let Some(from) = self.last_var.clone() else {
            self.error = Some(QueryError::MissingLeftVariable {
                context: "where_edge",
            });
            return self;
        };
        let (to, label) = target.into().into_parts(self.next_auto_var());
        self.declare(to.clone(), label);

        self.ast.edges.push(EdgeClause {
            from,
            to: to.clone(),
            edge_types: edge.into().edge_types,
            direction: self.pending_direction,
        });

        self.last_var = Some(to);
        self.pending_direction = EdgeDirection::Out;
        self
    }

    /// Adds predicates for a specific variable using the supplied builder.
    pub fn where_var<S, F>(mut self, var: S, build: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(&mut PredicateBuilder),
    {
        if self.error.is_some() {
            return self;
        }
        let mut builder = PredicateBuilder::new(Var(var.into()));
        build(&mut builder);
        if let Some(err) = builder.error.take() {
            self.error = Some(err);
            return self;
        }
        match builder.finish() {
            Some(expr) => self.append_bool_expr(expr),
            None => self.error = Some(QueryError::EmptyPredicateGroup),
        }
        self
    }

    /// Appends an already built predicate to the conjunction.
    pub fn filter(mut self, expr: BoolExpr) -> Self {
        if self.error.is_none() {
            self.append_bool_expr(expr);
        }
        self
    }

    /// Appends every predicate yielded by `exprs` to the conjunction.
    pub fn filters<I>(self, exprs: I) -> Self
    where
        I: IntoIterator<Item = BoolExpr>,
    {
        exprs.into_iter().fold(self, QueryBuilder::filter)
    }

    /// Sets the direction for the next edge clause.
    pub fn direction(mut self, dir: EdgeDirection) -> Self {
        self.pending_direction = dir;
        self
    }

    /// Convenience helper for reverse expansions.
    pub fn incoming(self) -> Self {
        self.direction(EdgeDirection::In)
    }

    /// Convenience helper for bidirectional expansions.
    pub fn bidirectional(self) -> Self {
        self.direction(EdgeDirection::Both)
    }

    /// Marks the query as distinct.
    pub fn distinct(mut self) -> Self {
        self.ast.distinct = true;
        self
    }

    /// Appends projections to the output column list.
    pub fn select<I, P>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProjectionSpec>,
    {
        if self.error.is_some() {
            return self;
        }
        for field in fields {
            match field.into().projection {
                Ok(projection) => self.ast.projections.push(projection),
                Err(err) => {
                    self.error = Some(err);
                    return self;
                }
            }
        }
        self
    }

    /// Appends a sort key on a projected alias.
    pub fn order_by(mut self, alias: impl Into<String>, descending: bool) -> Self {
        self.ast.order_by.push(OrderBy {
            alias: alias.into(),
            descending,
        });
        self
    }

    /// Caps the number of returned rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.ast.limit = Some(limit);
        self
    }

    /// Validates and returns the AST.
    pub fn build(self) -> Result<QueryAst, QueryError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        validate(&self.ast)?;
        Ok(self.ast)
    }

    fn declare(&mut self, var: Var, label: Option<String>) {
        match self.ast.matches.iter().find(|m| m.var == var) {
            Some(existing) => {
                if label.is_some() && existing.label != label {
                    self.error = Some(QueryError::DuplicateVariable { var: var.0 });
                }
            }
            None => self.ast.matches.push(MatchClause {
                var,
                label,
                props: Vec::new(),
            }),
        }
    }

    fn next_auto_var(&mut self) -> Var {
        let idx = self.next_var_idx;
        self.next_var_idx += 1;
        Var(auto_var_name(idx))
    }

    fn append_bool_expr(&mut self, expr: BoolExpr) {
        self.ast.predicate = Some(match self.ast.predicate.take() {
            Some(BoolExpr::And(mut args)) => {
                args.push(expr);
                BoolExpr::And(args)
            }
            Some(other) => BoolExpr::And(vec![other, expr]),
            None => expr,
        });
    }
}

fn validate(ast: &QueryAst) -> Result<(), QueryError> {
    if ast.matches.is_empty() {
        return Err(QueryError::EmptyMatches);
    }
    let declared: HashSet<&Var> = ast.matches.iter().map(|m| &m.var).collect();
    for edge in &ast.edges {
        for var in [&edge.from, &edge.to] {
            if !declared.contains(var) {
                return Err(QueryError::unknown_var(var.0.clone(), "edge"));
            }
        }
    }
    if let Some(expr) = &ast.predicate {
        let mut scope: Vec<&Var> = declared.iter().copied().collect();
        validate_expr(expr, &declared, &mut scope)?;
    }
    if ast.projections.is_empty() {
        return Err(QueryError::EmptyProjection);
    }
    let mut aliases = HashSet::new();
    for projection in &ast.projections {
        if !declared.contains(projection.var()) {
            return Err(QueryError::unknown_var(
                projection.var().0.clone(),
                "projection",
            ));
        }
        let alias = projection.alias();
        if alias.trim().is_empty() {
            return Err(QueryError::EmptyProjectionAlias);
        }
        if !aliases.insert(alias) {
            return Err(QueryError::DuplicateAlias {
                alias: alias.to_owned(),
            });
        }
    }
    for key in &ast.order_by {
        if !aliases.contains(key.alias.as_str()) {
            return Err(QueryError::UnknownOrderAlias {
                alias: key.alias.clone(),
            });
        }
    }
    Ok(())
}

fn validate_expr<'a>(
    expr: &'a BoolExpr,
    declared: &HashSet<&'a Var>,
    scope: &mut Vec<&'a Var>,
) -> Result<(), QueryError> {
    match expr {
        BoolExpr::Cmp(cmp) => {
            if !scope.contains(&cmp.var()) {
                return Err(QueryError::unknown_var(cmp.var().0.clone(), "predicate"));
            }
            Ok(())
        }
        BoolExpr::Exists(pattern) => {
            if !scope.contains(&&pattern.from) {
                return Err(QueryError::unknown_var(pattern.from.0.clone(), "pattern"));
            }
            if declared.contains(&pattern.target) || scope.contains(&&pattern.target) {
                return Err(QueryError::PatternShadowsVariable {
                    var: pattern.target.0.clone(),
                });
            }
            if let Some(filter) = &pattern.filter {
                scope.push(&pattern.target);
                let result = validate_expr(filter, declared, scope);
                scope.pop();
                result?;
            }
            Ok(())
        }
        BoolExpr::And(args) => {
            if args.is_empty() {
                return Err(QueryError::EmptyPredicateGroup);
            }
            args.iter()
                .try_for_each(|arg| validate_expr(arg, declared, scope))
        }
        BoolExpr::Not(inner) => validate_expr(inner, declared, scope),
    }
}

/// Specifies the target node for a match or edge clause.
pub enum MatchTarget {
    /// Match by label only; the builder assigns a variable name.
    Label(String),
    /// Match by variable name and optional label.
    Var {
        /// Variable name
        name: String,
        /// Optional label constraint
        label: Option<String>,
    },
}

impl MatchTarget {
    fn into_parts(self, fallback: Var) -> (Var, Option<String>) {
        match self {
            MatchTarget::Label(label) => (fallback, Some(label)),
            MatchTarget::Var { name, label } => (Var(name), label),
        }
    }
}

impl From<&str> for MatchTarget {
    fn from(label: &str) -> Self {
        MatchTarget::Label(label.to_owned())
    }
}

impl From<(&str, &str)> for MatchTarget {
    fn from((var, label): (&str, &str)) -> Self {
        MatchTarget::Var {
            name: var.to_owned(),
            label: Some(label.to_owned()),
        }
    }
}

impl From<(&str, Option<&str>)> for MatchTarget {
    fn from((var, label): (&str, Option<&str>)) -> Self {
        MatchTarget::Var {
            name: var.to_owned(),
            label: label.map(|l| l.to_owned()),
        }
    }
}

/// Edge types accepted by [`QueryBuilder::where_edge`].
pub struct EdgeSpec {
    edge_types: Vec<String>,
}

impl EdgeSpec {
    /// Matches an edge of any type.
    pub fn any() -> Self {
        Self {
            edge_types: Vec::new(),
        }
    }

    /// Matches an edge whose type is one of `types`.
    pub fn one_of<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            edge_types: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&str> for EdgeSpec {
    fn from(edge_type: &str) -> Self {
        Self::one_of([edge_type])
    }
}

impl<const N: usize> From<[&str; N]> for EdgeSpec {
    fn from(types: [&str; N]) -> Self {
        Self::one_of(types)
    }
}

impl From<Option<&str>> for EdgeSpec {
    fn from(edge_type: Option<&str>) -> Self {
        Self::one_of(edge_type)
    }
}

/// Builder used to construct predicates bound to a single variable.
pub struct PredicateBuilder {
    var: Var,
    exprs: Vec<BoolExpr>,
    error: Option<QueryError>,
}

impl PredicateBuilder {
    fn new(var: Var) -> Self {
        Self {
            var,
            exprs: Vec::new(),
            error: None,
        }
    }

    fn push_expr(&mut self, expr: BoolExpr) -> &mut Self {
        if self.error.is_none() {
            self.exprs.push(expr);
        }
        self
    }

    fn push_cmp(&mut self, cmp: Comparison) -> &mut Self {
        self.push_expr(BoolExpr::Cmp(cmp))
    }

    fn finish(self) -> Option<BoolExpr> {
        if self.error.is_some() {
            return None;
        }
        match self.exprs.len() {
            0 => None,
            1 => self.exprs.into_iter().next(),
            _ => Some(BoolExpr::And(self.exprs)),
        }
    }

    fn record_error(&mut self, err: QueryError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn build_group_expr<F>(var: Var, build: F) -> Result<BoolExpr, QueryError>
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        let mut nested = PredicateBuilder::new(var);
        build(&mut nested);
        if let Some(err) = nested.error.take() {
            return Err(err);
        }
        nested.finish().ok_or(QueryError::EmptyPredicateGroup)
    }

    /// Adds an equality predicate comparing the property to a literal.
    pub fn eq<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(Comparison::Eq {
            var: self.var.clone(),
            prop: prop.into(),
            value: value.into(),
        })
    }

    /// Adds an inequality predicate comparing the property to a literal.
    pub fn ne<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(Comparison::Ne {
            var: self.var.clone(),
            prop: prop.into(),
            value: value.into(),
        })
    }

    /// Adds an `IN` predicate matching a finite homogeneous literal set.
    pub fn in_list<P, I, V>(&mut self, prop: P, values: I) -> &mut Self
    where
        P: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if self.error.is_some() {
            return self;
        }
        let collected: Vec<Value> = values.into_iter().map(Into::into).collect();
        let Some(first) = collected.first() else {
            self.record_error(QueryError::InListEmpty);
            return self;
        };
        let first_tag = mem::discriminant(first);
        if !collected
            .iter()
            .all(|value| mem::discriminant(value) == first_tag)
        {
            self.record_error(QueryError::InListMixedTypes);
            return self;
        }
        self.push_cmp(Comparison::In {
            var: self.var.clone(),
            prop: prop.into(),
            values: collected,
        })
    }

    /// Adds a case-insensitive substring predicate.
    pub fn contains<P, S>(&mut self, prop: P, needle: S) -> &mut Self
    where
        P: Into<String>,
        S: Into<String>,
    {
        self.push_cmp(Comparison::Contains {
            var: self.var.clone(),
            prop: prop.into(),
            needle: needle.into(),
        })
    }

    /// Requires a one-hop neighbour reachable through `edge` in `direction`.
    ///
    /// `build` receives a predicate builder bound to the pattern-local target
    /// variable; leaving it empty only requires the neighbour to exist.
    pub fn exists<E, T, F>(
        &mut self,
        edge: E,
        direction: EdgeDirection,
        target: T,
        build: F,
    ) -> &mut Self
    where
        E: Into<EdgeSpec>,
        T: Into<MatchTarget>,
        F: FnOnce(&mut PredicateBuilder),
    {
        if self.error.is_some() {
            return self;
        }
        let fallback = Var(format!("{}_{}", self.var.0, self.exprs.len()));
        let (target, label) = target.into().into_parts(fallback);
        let mut nested = PredicateBuilder::new(target.clone());
        build(&mut nested);
        if let Some(err) = nested.error.take() {
            self.record_error(err);
            return self;
        }
        let pattern = PatternPredicate {
            from: self.var.clone(),
            edge_types: edge.into().edge_types,
            direction,
            target,
            label,
            filter: nested.finish().map(Box::new),
        };
        self.push_expr(BoolExpr::Exists(pattern))
    }

    /// Nests a group of predicates and negates the result.
    pub fn not_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        match PredicateBuilder::build_group_expr(self.var.clone(), build) {
            Ok(expr) => self.push_expr(BoolExpr::Not(Box::new(expr))),
            Err(err) => {
                self.record_error(err);
                self
            }
        }
    }
}

/// Builds a single predicate expression bound to `var` outside of a query.
///
/// Used by callers that assemble independent filter clauses before handing
/// them to [`QueryBuilder::filters`].
pub fn predicate<F>(var: &str, build: F) -> Result<BoolExpr, QueryError>
where
    F: FnOnce(&mut PredicateBuilder),
{
    PredicateBuilder::build_group_expr(Var::from(var), build)
}

/// Projection helper used by the builder API.
pub struct ProjectionSpec {
    projection: Result<Projection, QueryError>,
}

impl ProjectionSpec {
    /// Projects `var.prop AS alias`.
    pub fn prop(var: &str, prop: &str, alias: &str) -> Self {
        Self {
            projection: Ok(Projection::Prop {
                var: Var::from(var),
                prop: prop.to_owned(),
                alias: alias.to_owned(),
            }),
        }
    }

    /// Projects `labels(var) AS alias`.
    pub fn labels(var: &str, alias: &str) -> Self {
        Self {
            projection: Ok(Projection::Labels {
                var: Var::from(var),
                alias: alias.to_owned(),
            }),
        }
    }
}

impl From<(&str, &str)> for ProjectionSpec {
    fn from((path, alias): (&str, &str)) -> Self {
        match path.split_once('.') {
            Some((var, prop)) if !var.is_empty() && !prop.is_empty() => {
                Self::prop(var, prop, alias)
            }
            _ => Self {
                projection: Err(QueryError::MalformedProjection {
                    spec: path.to_owned(),
                }),
            },
        }
    }
}

impl From<Projection> for ProjectionSpec {
    fn from(projection: Projection) -> Self {
        Self {
            projection: Ok(projection),
        }
    }
}

fn auto_var_name(idx: usize) -> String {
    const FIRST: u8 = b'a';
    let letter = (FIRST + (idx % 26) as u8) as char;
    if idx < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, idx / 26)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_adds_match_and_edge() {
        let ast = QueryBuilder::new()
            .r#match(("u", "User"))
            .keyed("id", "u1")
            .where_edge("LIKES", ("item", "Item"))
            .select([("item.id", "itemId")])
            .build()
            .expect("builder should succeed");

        assert_eq!(ast.matches.len(), 2);
        assert_eq!(ast.edges.len(), 1);
        assert_eq!(ast.matches[0].props.len(), 1);
        assert_eq!(ast.edges[0].edge_types, vec!["LIKES".to_string()]);
    }

    #[test]
    fn filters_collapse_into_one_conjunction() {
        let genre = predicate("item", |p| {
            p.in_list("genre", ["RPG"]);
        })
        .expect("predicate");
        let ast = QueryBuilder::new()
            .r#match(("item", "Item"))
            .filters([genre.clone(), genre.clone(), genre])
            .select([("item.id", "itemId")])
            .build()
            .expect("builder should succeed");
        match ast.predicate {
            Some(BoolExpr::And(args)) => assert_eq!(args.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn negated_groups_are_conjunctions() {
        let expr = predicate("item", |p| {
            p.not_group(|n| {
                n.eq("id", "a");
                n.contains("name", "alp");
            });
        })
        .expect("predicate");
        match expr {
            BoolExpr::Not(inner) => {
                assert!(matches!(*inner, BoolExpr::And(ref args) if args.len() == 2))
            }
            other => panic!("expected negation, got {other:?}"),
        }

        let err = predicate("item", |p| {
            p.not_group(|_| {});
        })
        .expect_err("empty group");
        assert_eq!(err, QueryError::EmptyPredicateGroup);
    }

    #[test]
    fn single_filter_is_not_wrapped() {
        let ast = QueryBuilder::new()
            .r#match(("item", "Item"))
            .where_var("item", |p| {
                p.ne("id", "a");
            })
            .select([("item.id", "itemId")])
            .build()
            .expect("builder should succeed");
        assert!(matches!(ast.predicate, Some(BoolExpr::Cmp(_))));
    }

    #[test]
    fn undeclared_alias_is_rejected() {
        let err = QueryBuilder::new()
            .r#match(("game", "Item"))
            .where_var("platform", |p| {
                p.in_list("name", ["PC"]);
            })
            .select([("game.id", "gameId")])
            .build()
            .expect_err("platform is never matched");
        assert_eq!(err, QueryError::unknown_var("platform", "predicate"));
    }

    #[test]
    fn pattern_variables_stay_local() {
        let err = QueryBuilder::new()
            .r#match(("item", "Item"))
            .where_var("item", |p| {
                p.exists("AVAILABLE_ON", EdgeDirection::Out, ("p", "Platform"), |_| {});
            })
            .select([("p.name", "platform")])
            .build()
            .expect_err("p is pattern-local");
        assert_eq!(err.code(), "UnknownVariable");
    }

    #[test]
    fn empty_in_list_is_rejected() {
        let err = QueryBuilder::new()
            .r#match(("item", "Item"))
            .where_var("item", |p| {
                p.in_list("id", Vec::<String>::new());
            })
            .select([("item.id", "itemId")])
            .build()
            .expect_err("empty list");
        assert_eq!(err, QueryError::InListEmpty);
    }

    #[test]
    fn order_by_requires_projected_alias() {
        let err = QueryBuilder::new()
            .r#match(("item", "Item"))
            .select([("item.id", "itemId")])
            .order_by("itemName", false)
            .build()
            .expect_err("unknown alias");
        assert_eq!(err.code(), "UnknownOrderAlias");
    }

    #[test]
    fn malformed_projection_is_reported() {
        let err = QueryBuilder::new()
            .r#match(("item", "Item"))
            .select([("item", "itemId")])
            .build()
            .expect_err("missing property");
        assert_eq!(err.code(), "MalformedProjection");
    }

    #[test]
    fn auto_vars_are_assigned() {
        let ast = QueryBuilder::new()
            .r#match("User")
            .where_edge("FRIENDS_WITH", "User")
            .select([("b.id", "friend")])
            .build()
            .expect("builder should succeed");
        assert_eq!(ast.matches[0].var, Var::from("a"));
        assert_eq!(ast.matches[1].var, Var::from("b"));
    }
}
