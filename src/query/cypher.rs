//! Renders a [`QueryAst`] into parameterized Cypher text.
//!
//! Every literal becomes a numbered parameter (`$p0`, `$p1`, ...); only the
//! clause skeleton is produced as text. The `WHERE` keyword is emitted once
//! for the whole predicate tree and conjunctions are joined uniformly, so any
//! combination of filters renders to a well-formed statement.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::query::ast::{
    BoolExpr, Comparison, EdgeClause, EdgeDirection, MatchClause, PatternPredicate, Projection,
    QueryAst, Var,
};
use crate::query::Value;

/// Query text plus its bound parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// Cypher statement with `$pN` placeholders.
    pub text: String,
    /// Parameter values keyed by placeholder name (without `$`).
    pub params: BTreeMap<String, Value>,
}

/// Renders `ast` to Cypher.
pub fn compile(ast: &QueryAst) -> CompiledQuery {
    let mut renderer = Renderer::default();
    let text = renderer.render(ast);
    CompiledQuery {
        text,
        params: renderer.params,
    }
}

#[derive(Default)]
struct Renderer {
    params: BTreeMap<String, Value>,
}

impl Renderer {
    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.params.len());
        let placeholder = format!("${name}");
        self.params.insert(name, value);
        placeholder
    }

    fn render(&mut self, ast: &QueryAst) -> String {
        let mut out = String::from("MATCH ");
        let mut decorated: Vec<&Var> = Vec::new();
        let mut patterns = Vec::new();

        for edge in &ast.edges {
            let from = self.node(ast, &edge.from, &mut decorated);
            let to = self.node(ast, &edge.to, &mut decorated);
            patterns.push(format!("{from}{}{to}", relationship(edge)));
        }
        for clause in &ast.matches {
            if !decorated.contains(&&clause.var) {
                let node = self.node(ast, &clause.var, &mut decorated);
                patterns.push(node);
            }
        }
        out.push_str(&patterns.join(", "));

        if let Some(expr) = &ast.predicate {
            out.push_str(" WHERE ");
            let rendered = self.expr(expr, false);
            out.push_str(&rendered);
        }

        out.push_str(" RETURN ");
        if ast.distinct {
            out.push_str("DISTINCT ");
        }
        let columns: Vec<String> = ast.projections.iter().map(projection).collect();
        out.push_str(&columns.join(", "));

        if !ast.order_by.is_empty() {
            let keys: Vec<String> = ast
                .order_by
                .iter()
                .map(|key| {
                    if key.descending {
                        format!("{} DESC", key.alias)
                    } else {
                        key.alias.clone()
                    }
                })
                .collect();
            let _ = write!(out, " ORDER BY {}", keys.join(", "));
        }
        if let Some(limit) = ast.limit {
            let placeholder = self.bind(Value::Int(limit as i64));
            let _ = write!(out, " LIMIT {placeholder}");
        }
        out
    }

    fn node<'a>(&mut self, ast: &'a QueryAst, var: &'a Var, decorated: &mut Vec<&'a Var>) -> String {
        if decorated.contains(&var) {
            return format!("({})", var.0);
        }
        decorated.push(var);
        match ast.matches.iter().find(|m| &m.var == var) {
            Some(clause) => self.decorated_node(clause),
            None => format!("({})", var.0),
        }
    }

    fn decorated_node(&mut self, clause: &MatchClause) -> String {
        let mut out = format!("({}", clause.var.0);
        if let Some(label) = &clause.label {
            let _ = write!(out, ":{label}");
        }
        if !clause.props.is_empty() {
            let props: Vec<String> = clause
                .props
                .iter()
                .map(|(prop, value)| {
                    let placeholder = self.bind(value.clone());
                    format!("{prop}: {placeholder}")
                })
                .collect();
            let _ = write!(out, " {{{}}}", props.join(", "));
        }
        out.push(')');
        out
    }

    fn expr(&mut self, expr: &BoolExpr, nested: bool) -> String {
        match expr {
            BoolExpr::Cmp(cmp) => self.comparison(cmp),
            BoolExpr::Exists(pattern) => self.pattern(pattern),
            BoolExpr::And(args) => self.join(args, " AND ", nested),
            BoolExpr::Not(inner) => format!("NOT ({})", self.expr(inner, false)),
        }
    }

    fn join(&mut self, args: &[BoolExpr], sep: &str, nested: bool) -> String {
        let parts: Vec<String> = args.iter().map(|arg| self.expr(arg, true)).collect();
        let joined = parts.join(sep);
        if nested && parts.len() > 1 {
            format!("({joined})")
        } else {
            joined
        }
    }

    fn comparison(&mut self, cmp: &Comparison) -> String {
        match cmp {
            Comparison::Eq { var, prop, value } => {
                format!("{}.{prop} = {}", var.0, self.bind(value.clone()))
            }
            Comparison::Ne { var, prop, value } => {
                format!("{}.{prop} <> {}", var.0, self.bind(value.clone()))
            }
            Comparison::In { var, prop, values } => {
                format!(
                    "{}.{prop} IN {}",
                    var.0,
                    self.bind(Value::List(values.clone()))
                )
            }
            Comparison::Contains { var, prop, needle } => format!(
                "toLower({}.{prop}) CONTAINS toLower({})",
                var.0,
                self.bind(Value::String(needle.clone()))
            ),
        }
    }

    fn pattern(&mut self, pattern: &PatternPredicate) -> String {
        let mut target = format!("({}", pattern.target.0);
        if let Some(label) = &pattern.label {
            let _ = write!(target, ":{label}");
        }
        target.push(')');
        let rel = arrow(&pattern.edge_types, pattern.direction);
        let mut out = format!("EXISTS {{ ({}){rel}{target}", pattern.from.0);
        if let Some(filter) = &pattern.filter {
            let _ = write!(out, " WHERE {}", self.expr(filter, false));
        }
        out.push_str(" }");
        out
    }
}

fn relationship(edge: &EdgeClause) -> String {
    arrow(&edge.edge_types, edge.direction)
}

fn arrow(types: &[String], direction: EdgeDirection) -> String {
    let body = if types.is_empty() {
        "[]".to_string()
    } else {
        format!("[:{}]", types.join("|"))
    };
    match direction {
        EdgeDirection::Out => format!("-{body}->"),
        EdgeDirection::In => format!("<-{body}-"),
        EdgeDirection::Both => format!("-{body}-"),
    }
}

fn projection(projection: &Projection) -> String {
    match projection {
        Projection::Prop { var, prop, alias } => format!("{}.{prop} AS {alias}", var.0),
        Projection::Labels { var, alias } => format!("labels({}) AS {alias}", var.0),
    }
}
