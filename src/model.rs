//! Graph records stored by [`crate::gateway::MemoryGraph`] and the domain
//! objects read from them.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::query::Value;

/// Engine-assigned node identifier. Never used as a business key.
pub type NodeId = u64;
/// Engine-assigned edge identifier.
pub type EdgeId = u64;

/// Node labels of the consumed schema.
pub mod labels {
    /// Recommendable game.
    pub const ITEM: &str = "Item";
    /// Genre attribute node.
    pub const GENRE: &str = "Genre";
    /// Platform attribute node.
    pub const PLATFORM: &str = "Platform";
    /// Developer attribute node.
    pub const DEVELOPER: &str = "Developer";
    /// Player.
    pub const USER: &str = "User";
}

/// Relationship types of the consumed schema.
pub mod rel {
    /// `Item -> Genre`
    pub const BELONGS_TO_GENRE: &str = "BELONGS_TO_GENRE";
    /// `Item -> Platform`
    pub const AVAILABLE_ON: &str = "AVAILABLE_ON";
    /// `Item -> Developer`
    pub const DEVELOPED_BY: &str = "DEVELOPED_BY";
    /// `User -> Item`
    pub const LIKES: &str = "LIKES";
    /// `User -> Item`
    pub const PLAYED: &str = "PLAYED";
    /// `User -> User`
    pub const FRIENDS_WITH: &str = "FRIENDS_WITH";
}

/// Stored property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean property.
    Bool(bool),
    /// Integer property.
    Int(i64),
    /// Floating point property.
    Float(f64),
    /// String property.
    String(String),
}

impl PropertyValue {
    /// Converts the stored value into a query value.
    pub fn to_value(&self) -> Value {
        match self {
            PropertyValue::Bool(v) => Value::Bool(*v),
            PropertyValue::Int(v) => Value::Int(*v),
            PropertyValue::Float(v) => Value::Float(*v),
            PropertyValue::String(v) => Value::String(v.clone()),
        }
    }

    /// Equality against a query literal; integers and floats compare numerically.
    pub fn equals(&self, literal: &Value) -> bool {
        match (self, literal) {
            (PropertyValue::Bool(a), Value::Bool(b)) => a == b,
            (PropertyValue::Int(a), Value::Int(b)) => a == b,
            (PropertyValue::Float(a), Value::Float(b)) => a == b,
            (PropertyValue::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (PropertyValue::Float(a), Value::Int(b)) => *a == (*b as f64),
            (PropertyValue::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Borrows the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// Labelled node with properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Engine identifier.
    pub id: NodeId,
    /// Labels carried by the node.
    pub labels: Vec<String>,
    /// Property map.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    /// Creates an unlabelled node without properties.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Returns true when the node carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Typed directed edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Engine identifier.
    pub id: EdgeId,
    /// Source node.
    pub source_node_id: NodeId,
    /// Target node.
    pub target_node_id: NodeId,
    /// Relationship type.
    pub type_name: String,
}

impl Edge {
    /// Creates an edge.
    pub fn new(
        id: EdgeId,
        source_node_id: NodeId,
        target_node_id: NodeId,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source_node_id,
            target_node_id,
            type_name: type_name.into(),
        }
    }

    /// Endpoint opposite to `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.source_node_id == node {
            self.target_node_id
        } else {
            self.source_node_id
        }
    }
}

/// A recommendable game and its categorical attributes.
///
/// Equality and hashing use `id` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Stable external key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Release year.
    #[serde(default)]
    pub release_year: i64,
    /// Genre names.
    #[serde(default)]
    pub genres: BTreeSet<String>,
    /// Platform names.
    #[serde(default)]
    pub platforms: BTreeSet<String>,
    /// Developer names.
    #[serde(default)]
    pub developers: BTreeSet<String>,
    /// Whether the game supports multiplayer.
    #[serde(default)]
    pub is_multiplayer: bool,
}

impl Item {
    /// Creates an item with no attributes.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            release_year: 0,
            genres: BTreeSet::new(),
            platforms: BTreeSet::new(),
            developers: BTreeSet::new(),
            is_multiplayer: false,
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn items_compare_by_id_only() {
        let mut a = Item::new("a", "Alpha");
        let mut b = Item::new("a", "Renamed");
        a.genres.insert("RPG".into());
        b.is_multiplayer = true;
        assert_eq!(a, b);

        let set: HashSet<Item> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn numeric_equality_crosses_int_and_float() {
        assert!(PropertyValue::Int(2).equals(&Value::Float(2.0)));
        assert!(!PropertyValue::String("2".into()).equals(&Value::Int(2)));
    }
}
