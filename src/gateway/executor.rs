//! Evaluates a [`QueryAst`] against [`GraphData`].
//!
//! Edge clauses are expanded in declaration order into binding rows; each row
//! maps query variables to node ids and remembers the edges it traversed so a
//! relationship is never matched twice within one row. Remaining match
//! clauses are bound by label scan, then the predicate filters rows before
//! projection, `DISTINCT`, ordering and the row limit are applied.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::error::{GatewayError, Result};
use crate::gateway::memory::GraphData;
use crate::gateway::{QueryResult, Record};
use crate::model::{EdgeId, Node, NodeId};
use crate::query::ast::{
    BoolExpr, Comparison, EdgeClause, EdgeDirection, MatchClause, Projection, QueryAst,
};
use crate::query::Value;

#[derive(Clone, Debug, Default)]
struct BindingRow<'q> {
    nodes: BTreeMap<&'q str, NodeId>,
    edges: Vec<EdgeId>,
}

impl<'q> BindingRow<'q> {
    fn get(&self, var: &str) -> Option<NodeId> {
        self.nodes.get(var).copied()
    }

    fn with(&self, var: &'q str, node: NodeId) -> Self {
        let mut next = self.clone();
        next.nodes.insert(var, node);
        next
    }
}

pub(crate) fn execute(data: &GraphData, query: &QueryAst) -> Result<QueryResult> {
    let mut rows = vec![BindingRow::default()];

    for edge in &query.edges {
        let mut expanded = Vec::new();
        for row in &rows {
            expand(data, query, edge, row, &mut expanded);
        }
        rows = expanded;
        if rows.is_empty() {
            return Ok(QueryResult::default());
        }
    }

    for clause in &query.matches {
        let var = clause.var.as_str();
        if rows.iter().all(|row| row.get(var).is_some()) {
            continue;
        }
        let candidates = scan(data, clause);
        rows = rows
            .into_iter()
            .flat_map(|row| {
                if row.get(var).is_some() {
                    return vec![row];
                }
                candidates.iter().map(|id| row.with(var, *id)).collect()
            })
            .collect();
    }

    if let Some(predicate) = &query.predicate {
        rows.retain(|row| eval(data, predicate, &|var: &str| row.get(var)));
    }

    let mut records = Vec::with_capacity(rows.len());
    let mut seen = FxHashSet::default();
    for row in &rows {
        let mut columns = BTreeMap::new();
        for projection in &query.projections {
            columns.insert(projection.alias().to_owned(), project(data, projection, row)?);
        }
        if query.distinct && !seen.insert(format!("{columns:?}")) {
            continue;
        }
        records.push(columns);
    }

    if !query.order_by.is_empty() {
        records.sort_by(|a, b| {
            query
                .order_by
                .iter()
                .map(|key| {
                    let left = a.get(&key.alias).unwrap_or(&Value::Null);
                    let right = b.get(&key.alias).unwrap_or(&Value::Null);
                    let ord = left.sort_cmp(right);
                    if key.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }

    Ok(QueryResult {
        rows: records.into_iter().map(Record::new).collect(),
    })
}

fn expand<'q>(
    data: &GraphData,
    query: &'q QueryAst,
    edge: &'q EdgeClause,
    row: &BindingRow<'q>,
    out: &mut Vec<BindingRow<'q>>,
) {
    let from = edge.from.as_str();
    let to = edge.to.as_str();
    match (row.get(from), row.get(to)) {
        (Some(anchor), bound_to) => {
            for (edge_id, other) in neighbours(data, anchor, edge.direction, &edge.edge_types) {
                if row.edges.contains(&edge_id) {
                    continue;
                }
                let accepted = match bound_to {
                    Some(target) => other == target,
                    None => node_matches(data, clause(query, to), other),
                };
                if accepted {
                    let mut next = row.with(to, other);
                    next.edges.push(edge_id);
                    out.push(next);
                }
            }
        }
        (None, Some(anchor)) => {
            let reversed = edge.direction.reversed();
            for (edge_id, other) in neighbours(data, anchor, reversed, &edge.edge_types) {
                if row.edges.contains(&edge_id) || !node_matches(data, clause(query, from), other)
                {
                    continue;
                }
                let mut next = row.with(from, other);
                next.edges.push(edge_id);
                out.push(next);
            }
        }
        (None, None) => {
            let Some(source) = clause(query, from) else {
                return;
            };
            for node in scan(data, source) {
                expand(data, query, edge, &row.with(from, node), out);
            }
        }
    }
}

fn clause<'q>(query: &'q QueryAst, var: &str) -> Option<&'q MatchClause> {
    query.matches.iter().find(|m| m.var.as_str() == var)
}

fn scan(data: &GraphData, clause: &MatchClause) -> Vec<NodeId> {
    let candidates: Box<dyn Iterator<Item = NodeId> + '_> = match &clause.label {
        Some(label) => match data.by_label.get(label) {
            Some(ids) => Box::new(ids.iter().copied()),
            None => return Vec::new(),
        },
        None => Box::new(data.nodes.keys().copied()),
    };
    candidates
        .filter(|id| node_matches(data, Some(clause), *id))
        .collect()
}

fn node_matches(data: &GraphData, clause: Option<&MatchClause>, id: NodeId) -> bool {
    let Some(node) = data.nodes.get(&id) else {
        return false;
    };
    let Some(clause) = clause else {
        return true;
    };
    if let Some(label) = &clause.label {
        if !node.has_label(label) {
            return false;
        }
    }
    clause.props.iter().all(|(prop, value)| {
        node.properties
            .get(prop)
            .is_some_and(|stored| stored.equals(value))
    })
}

/// Edges adjacent to `node` in `direction`, paired with the far endpoint.
fn neighbours<'d>(
    data: &'d GraphData,
    node: NodeId,
    direction: EdgeDirection,
    types: &'d [String],
) -> impl Iterator<Item = (EdgeId, NodeId)> + 'd {
    let outgoing = matches!(direction, EdgeDirection::Out | EdgeDirection::Both)
        .then(|| data.outgoing.get(&node))
        .flatten()
        .into_iter()
        .flatten()
        .map(move |id| (id, false));
    let incoming = matches!(direction, EdgeDirection::In | EdgeDirection::Both)
        .then(|| data.incoming.get(&node))
        .flatten()
        .into_iter()
        .flatten()
        .map(move |id| (id, true));

    outgoing.chain(incoming).filter_map(move |(id, inbound)| {
        let edge = data.edges.get(id)?;
        if !types.is_empty() && !types.iter().any(|t| *t == edge.type_name) {
            return None;
        }
        // Self-loops already surfaced through the outgoing list.
        if inbound && direction == EdgeDirection::Both && edge.source_node_id == edge.target_node_id
        {
            return None;
        }
        Some((*id, edge.other(node)))
    })
}

fn eval(data: &GraphData, expr: &BoolExpr, lookup: &dyn Fn(&str) -> Option<NodeId>) -> bool {
    match expr {
        BoolExpr::Cmp(cmp) => {
            let node = lookup(cmp.var().as_str()).and_then(|id| data.nodes.get(&id));
            node.is_some_and(|node| compare(node, cmp))
        }
        BoolExpr::Exists(pattern) => {
            let Some(anchor) = lookup(pattern.from.as_str()) else {
                return false;
            };
            let target = pattern.target.as_str();
            neighbours(data, anchor, pattern.direction, &pattern.edge_types).any(|(_, other)| {
                let labelled = match &pattern.label {
                    Some(label) => data.nodes.get(&other).is_some_and(|n| n.has_label(label)),
                    None => true,
                };
                labelled
                    && pattern.filter.as_deref().map_or(true, |filter| {
                        let scoped = |var: &str| {
                            if var == target {
                                Some(other)
                            } else {
                                lookup(var)
                            }
                        };
                        eval(data, filter, &scoped)
                    })
            })
        }
        BoolExpr::And(args) => args.iter().all(|arg| eval(data, arg, lookup)),
        BoolExpr::Not(inner) => !eval(data, inner, lookup),
    }
}

/// Missing properties never satisfy a comparison, including `<>`.
fn compare(node: &Node, cmp: &Comparison) -> bool {
    match cmp {
        Comparison::Eq { prop, value, .. } => node
            .properties
            .get(prop)
            .is_some_and(|stored| stored.equals(value)),
        Comparison::Ne { prop, value, .. } => node
            .properties
            .get(prop)
            .is_some_and(|stored| !stored.equals(value)),
        Comparison::In { prop, values, .. } => node
            .properties
            .get(prop)
            .is_some_and(|stored| values.iter().any(|v| stored.equals(v))),
        Comparison::Contains { prop, needle, .. } => node
            .properties
            .get(prop)
            .and_then(|stored| stored.as_str())
            .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
    }
}

fn project(data: &GraphData, projection: &Projection, row: &BindingRow<'_>) -> Result<Value> {
    let var = projection.var().as_str();
    let node = row
        .get(var)
        .and_then(|id| data.nodes.get(&id))
        .ok_or_else(|| GatewayError::Execution(format!("variable '{var}' is not bound")))?;
    Ok(match projection {
        Projection::Prop { prop, .. } => node
            .properties
            .get(prop)
            .map_or(Value::Null, |stored| stored.to_value()),
        Projection::Labels { .. } => {
            Value::List(node.labels.iter().map(Value::from).collect())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GraphGateway, MemoryGraph};
    use crate::model::PropertyValue;
    use crate::query::{predicate, EdgeSpec, ProjectionSpec, QueryBuilder};

    fn sample() -> MemoryGraph {
        let graph = MemoryGraph::new();
        let item = |id: &str, name: &str| {
            graph.add_node(
                ["Item"],
                [("id", PropertyValue::from(id)), ("name", PropertyValue::from(name))],
            )
        };
        let a = item("a", "Alpha");
        let b = item("b", "Beta");
        let c = item("c", "Gamma");
        let rpg = graph.merge_node("Genre", "name", "RPG");
        let pc = graph.merge_node("Platform", "name", "PC");
        let user = graph.add_node(["User"], [("id", PropertyValue::from("u1"))]);
        for (from, to, rel) in [
            (a, rpg, "BELONGS_TO_GENRE"),
            (b, rpg, "BELONGS_TO_GENRE"),
            (a, pc, "AVAILABLE_ON"),
            (c, pc, "AVAILABLE_ON"),
            (user, a, "LIKES"),
            (user, a, "PLAYED"),
            (user, b, "PLAYED"),
        ] {
            graph.add_edge(from, to, rel).expect("edge");
        }
        graph
    }

    fn ids(gateway: &GraphGateway, ast: &QueryAst) -> Vec<String> {
        gateway
            .run(ast)
            .expect("query")
            .into_iter()
            .map(|row| row.str("itemId").expect("itemId").to_owned())
            .collect()
    }

    #[test]
    fn distinct_collapses_parallel_relationships() {
        let gateway = GraphGateway::new(sample());
        let ast = QueryBuilder::new()
            .r#match(("u", "User"))
            .keyed("id", "u1")
            .where_edge(["LIKES", "PLAYED"], ("item", "Item"))
            .distinct()
            .select([("item.id", "itemId")])
            .order_by("itemId", false)
            .build()
            .expect("query");
        assert_eq!(ids(&gateway, &ast), vec!["a", "b"]);
    }

    #[test]
    fn shared_attribute_paths_do_not_reuse_the_seed_edge() {
        let gateway = GraphGateway::new(sample());
        let ast = QueryBuilder::new()
            .r#match(("seed", "Item"))
            .keyed("id", "a")
            .bidirectional()
            .where_edge(EdgeSpec::any(), ("attr", None::<&str>))
            .bidirectional()
            .where_edge(EdgeSpec::any(), ("item", "Item"))
            .where_var("item", |p| {
                p.ne("id", "a");
            })
            .select([("item.id", "itemId")])
            .order_by("itemId", false)
            .build()
            .expect("query");
        // b through RPG and through u1 once per seed edge (LIKES, PLAYED); c through PC.
        assert_eq!(ids(&gateway, &ast), vec!["b", "b", "b", "c"]);
    }

    #[test]
    fn exists_filters_conjoin() {
        let gateway = GraphGateway::new(sample());
        let genre = predicate("item", |p| {
            p.exists("BELONGS_TO_GENRE", EdgeDirection::Out, ("g", "Genre"), |g| {
                g.in_list("name", ["RPG"]);
            });
        })
        .expect("genre");
        let platform = predicate("item", |p| {
            p.exists("AVAILABLE_ON", EdgeDirection::Out, ("pl", "Platform"), |pl| {
                pl.in_list("name", ["PC"]);
            });
        })
        .expect("platform");

        let query = |filters: Vec<BoolExpr>| {
            QueryBuilder::new()
                .r#match(("item", "Item"))
                .filters(filters)
                .select([("item.id", "itemId")])
                .order_by("itemId", false)
                .build()
                .expect("query")
        };
        assert_eq!(ids(&gateway, &query(vec![genre.clone()])), vec!["a", "b"]);
        assert_eq!(ids(&gateway, &query(vec![platform.clone()])), vec!["a", "c"]);
        assert_eq!(ids(&gateway, &query(vec![genre, platform])), vec!["a"]);
    }

    #[test]
    fn missing_properties_fail_every_comparison() {
        let graph = sample();
        graph.add_node(["Item"], [("id", PropertyValue::from("nameless"))]);
        let gateway = GraphGateway::new(graph);
        let ast = QueryBuilder::new()
            .r#match(("item", "Item"))
            .where_var("item", |p| {
                p.ne("name", "Alpha");
            })
            .select([("item.id", "itemId")])
            .order_by("itemId", false)
            .build()
            .expect("query");
        assert_eq!(ids(&gateway, &ast), vec!["b", "c"]);
    }

    #[test]
    fn contains_is_case_insensitive_and_limit_applies() {
        let gateway = GraphGateway::new(sample());
        let ast = QueryBuilder::new()
            .r#match(("item", "Item"))
            .where_var("item", |p| {
                p.contains("name", "A");
            })
            .select([("item.id", "itemId"), ("item.name", "itemName")])
            .order_by("itemName", true)
            .limit(2)
            .build()
            .expect("query");
        assert_eq!(ids(&gateway, &ast), vec!["c", "b"]);
    }

    #[test]
    fn labels_project_as_lists() {
        let gateway = GraphGateway::new(sample());
        let ast = QueryBuilder::new()
            .r#match(("g", "Genre"))
            .select([ProjectionSpec::labels("g", "labels")])
            .build()
            .expect("query");
        let rows = gateway.run(&ast).expect("rows");
        assert_eq!(rows.rows[0].strings("labels").expect("labels"), vec!["Genre"]);
    }

    #[test]
    fn unknown_labels_yield_no_rows() {
        let gateway = GraphGateway::new(sample());
        let ast = QueryBuilder::new()
            .r#match(("x", "Publisher"))
            .select([("x.name", "name")])
            .build()
            .expect("query");
        assert!(gateway.run(&ast).expect("rows").is_empty());
    }
}
