//! Shared-attribute similarity between items.

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::error::Result;
use crate::gateway::GraphGateway;
use crate::model::labels;
use crate::query::{EdgeSpec, ProjectionSpec, QueryBuilder, Value};
use crate::recommend::{ItemCatalog, Recommendation, RecommendationKind, ScoreBoard};

/// Scalar that can address a node: floats, lists and nulls are excluded.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    /// Boolean key.
    Bool(bool),
    /// Integer key.
    Int(i64),
    /// String key.
    Str(String),
}

impl KeyValue {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(KeyValue::Bool(*v)),
            Value::Int(v) => Some(KeyValue::Int(*v)),
            Value::String(v) => Some(KeyValue::Str(v.clone())),
            Value::Null | Value::Float(_) | Value::List(_) => None,
        }
    }
}

impl From<&KeyValue> for Value {
    fn from(key: &KeyValue) -> Self {
        match key {
            KeyValue::Bool(v) => Value::Bool(*v),
            KeyValue::Int(v) => Value::Int(*v),
            KeyValue::Str(v) => Value::String(v.clone()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Bool(v) => write!(f, "{v}"),
            KeyValue::Int(v) => write!(f, "{v}"),
            KeyValue::Str(v) => f.write_str(v),
        }
    }
}

/// Stable address of an attribute node: its full label set plus `id` when
/// the node has a scalar one, otherwise `name`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeKey {
    /// Sorted labels; empty for an unlabeled node.
    pub labels: Vec<String>,
    /// Key property name (`id` or `name`).
    pub prop: &'static str,
    /// Key property value.
    pub value: KeyValue,
}

impl AttributeKey {
    fn matches_labels(&self, found: &[&str]) -> bool {
        let mut found = found.to_vec();
        found.sort_unstable();
        found.dedup();
        found.len() == self.labels.len()
            && found.iter().zip(&self.labels).all(|(a, b)| *a == b.as_str())
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}: {}}}", self.labels.join(":"), self.prop, self.value)
    }
}

/// Ranks items by how many attribute nodes they share with a seed item.
///
/// Any node adjacent to the seed counts as an attribute, over any
/// relationship type and in either direction. Attributes are addressed by
/// [`AttributeKey`], so a neighbour with neither a scalar `id` nor a scalar
/// `name` is not counted, and a candidate only shares an attribute node whose
/// label set is exactly the seed's one (an unlabeled node matches only
/// unlabeled nodes).
#[derive(Clone, Debug)]
pub struct ItemSimilarityRecommender {
    gateway: GraphGateway,
    catalog: ItemCatalog,
}

impl ItemSimilarityRecommender {
    /// Creates a recommender over `gateway`.
    pub fn new(gateway: GraphGateway) -> Self {
        Self {
            catalog: ItemCatalog::new(gateway.clone()),
            gateway,
        }
    }

    /// Items most similar to `seed_id`, best first. An unknown seed yields an
    /// empty list.
    pub fn recommend_by_item(
        &self,
        seed_id: &str,
        max_results: usize,
    ) -> Result<Vec<Recommendation>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        if self.catalog.item_name(seed_id)?.is_none() {
            debug!(seed_id, "seed item not found");
            return Ok(Vec::new());
        }

        let attributes = self.attributes_of(seed_id)?;
        let mut board = ScoreBoard::new();
        for attribute in &attributes {
            for (item_id, item_name) in self.items_sharing(attribute, seed_id)? {
                board.add(&item_id, &item_name, 1);
            }
        }

        let ranked = board.into_ranked(RecommendationKind::Personal, max_results);
        info!(
            seed_id,
            attributes = attributes.len(),
            results = ranked.len(),
            "similar item recommendations produced"
        );
        Ok(ranked)
    }

    /// Distinct attribute nodes adjacent to the seed.
    pub fn attributes_of(&self, seed_id: &str) -> Result<BTreeSet<AttributeKey>> {
        let query = QueryBuilder::new()
            .r#match(("seed", labels::ITEM))
            .keyed("id", seed_id)
            .bidirectional()
            .where_edge(EdgeSpec::any(), ("attr", None::<&str>))
            .distinct()
            .select([
                ProjectionSpec::labels("attr", "labels"),
                ProjectionSpec::prop("attr", "id", "attrId"),
                ProjectionSpec::prop("attr", "name", "attrName"),
            ])
            .build()?;

        let mut keys = BTreeSet::new();
        for row in self.gateway.run(&query)? {
            let mut attr_labels: Vec<String> = row
                .strings("labels")?
                .into_iter()
                .map(str::to_owned)
                .collect();
            attr_labels.sort_unstable();
            attr_labels.dedup();
            let id = row.get("attrId").and_then(KeyValue::from_value);
            let name = row.get("attrName").and_then(KeyValue::from_value);
            let (prop, value) = match (id, name) {
                (Some(id), _) => ("id", id),
                (None, Some(name)) => ("name", name),
                (None, None) => {
                    debug!(labels = ?attr_labels, "skipping attribute without a stable key");
                    continue;
                }
            };
            keys.insert(AttributeKey {
                labels: attr_labels,
                prop,
                value,
            });
        }
        Ok(keys)
    }

    fn items_sharing(
        &self,
        attribute: &AttributeKey,
        seed_id: &str,
    ) -> Result<Vec<(String, String)>> {
        let query = QueryBuilder::new()
            .r#match(("attr", attribute.labels.first().map(String::as_str)))
            .keyed(attribute.prop, Value::from(&attribute.value))
            .bidirectional()
            .where_edge(EdgeSpec::any(), ("item", labels::ITEM))
            .where_var("item", |p| {
                p.ne("id", seed_id);
            })
            .distinct()
            .select([
                ProjectionSpec::labels("attr", "attrLabels"),
                ProjectionSpec::prop("item", "id", "itemId"),
                ProjectionSpec::prop("item", "name", "itemName"),
            ])
            .build()?;

        let mut seen = FxHashSet::default();
        let mut items = Vec::new();
        for row in self.gateway.run(&query)? {
            if !attribute.matches_labels(&row.strings("attrLabels")?) {
                continue;
            }
            let id = row.str("itemId")?;
            if seen.insert(id.to_owned()) {
                let name = row.opt_str("itemName")?.unwrap_or(id);
                items.push((id.to_owned(), name.to_owned()));
            }
        }
        Ok(items)
    }
}
