//! JSON catalog documents and their loading into a [`MemoryGraph`].
//!
//! ```json
//! {
//!   "items": [{"id": "a", "name": "Alpha", "releaseYear": 1998,
//!              "genres": ["RPG"], "platforms": ["PC"], "developers": [],
//!              "isMultiplayer": false}],
//!   "users": [{"id": "u1", "likes": ["a"], "played": [], "friends": ["u2"]}]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GraphError, Result};
use crate::gateway::MemoryGraph;
use crate::index::CategoryKind;
use crate::model::{labels, rel, Item, NodeId, PropertyValue};

/// A user and their interactions, keyed by stable ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Stable user key.
    pub id: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Liked item ids.
    #[serde(default)]
    pub likes: BTreeSet<String>,
    /// Played item ids.
    #[serde(default)]
    pub played: BTreeSet<String>,
    /// Befriended user ids (outgoing `FRIENDS_WITH`).
    #[serde(default)]
    pub friends: BTreeSet<String>,
}

impl UserRecord {
    /// Creates a user without interactions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Items and users making up one catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Catalog items.
    #[serde(default)]
    pub items: Vec<Item>,
    /// Users and their interactions.
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

/// Counts reported after loading a dataset into a graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    /// Item nodes created.
    pub items: usize,
    /// User nodes created.
    pub users: usize,
    /// Distinct category nodes.
    pub categories: usize,
    /// Relationships created.
    pub relationships: usize,
}

impl Dataset {
    /// Parses a JSON document.
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Reads and validates a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| GraphError::io(path, err))?;
        let dataset = Self::from_json(&contents)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Writes the dataset as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| GraphError::io(parent, err))?;
        }
        fs::write(path, contents).map_err(|err| GraphError::io(path, err))
    }

    /// Rejects duplicate keys and references to unknown items or users.
    pub fn validate(&self) -> Result<()> {
        let mut items = BTreeSet::new();
        for item in &self.items {
            if item.id.trim().is_empty() {
                return Err(GraphError::InvalidDataset("item with an empty id".into()));
            }
            if !items.insert(item.id.as_str()) {
                return Err(GraphError::InvalidDataset(format!(
                    "duplicate item id '{}'",
                    item.id
                )));
            }
        }
        let mut users = BTreeSet::new();
        for user in &self.users {
            if !users.insert(user.id.as_str()) {
                return Err(GraphError::InvalidDataset(format!(
                    "duplicate user id '{}'",
                    user.id
                )));
            }
        }
        for user in &self.users {
            for item in user.likes.iter().chain(&user.played) {
                if !items.contains(item.as_str()) {
                    return Err(GraphError::InvalidDataset(format!(
                        "user '{}' references unknown item '{item}'",
                        user.id
                    )));
                }
            }
            for friend in &user.friends {
                if !users.contains(friend.as_str()) {
                    return Err(GraphError::InvalidDataset(format!(
                        "user '{}' befriends unknown user '{friend}'",
                        user.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validates and loads the dataset into a fresh graph.
    pub fn into_graph(&self) -> Result<MemoryGraph> {
        let graph = MemoryGraph::new();
        self.load_into(&graph)?;
        Ok(graph)
    }

    /// Validates and appends the dataset to `graph`. Category nodes are
    /// merged by name.
    pub fn load_into(&self, graph: &MemoryGraph) -> Result<LoadSummary> {
        self.validate()?;
        let mut summary = LoadSummary::default();
        let mut item_nodes: BTreeMap<&str, NodeId> = BTreeMap::new();
        let mut categories: BTreeSet<(CategoryKind, &str)> = BTreeSet::new();

        for item in &self.items {
            let node = graph.add_node(
                [labels::ITEM],
                [
                    ("id", PropertyValue::from(item.id.as_str())),
                    ("name", PropertyValue::from(item.name.as_str())),
                    ("releaseYear", PropertyValue::from(item.release_year)),
                    ("isMultiplayer", PropertyValue::from(item.is_multiplayer)),
                ],
            );
            item_nodes.insert(&item.id, node);
            summary.items += 1;

            for (kind, names) in [
                (CategoryKind::Genre, &item.genres),
                (CategoryKind::Platform, &item.platforms),
                (CategoryKind::Developer, &item.developers),
            ] {
                for name in names {
                    let category = graph.merge_node(kind.label(), "name", name);
                    graph.add_edge(node, category, kind.relationship())?;
                    categories.insert((kind, name.as_str()));
                    summary.relationships += 1;
                }
            }
        }

        let mut user_nodes: BTreeMap<&str, NodeId> = BTreeMap::new();
        for user in &self.users {
            let mut props = vec![("id", PropertyValue::from(user.id.as_str()))];
            if let Some(name) = &user.name {
                props.push(("name", PropertyValue::from(name.as_str())));
            }
            user_nodes.insert(&user.id, graph.add_node([labels::USER], props));
            summary.users += 1;
        }

        for user in &self.users {
            let Some(&from) = user_nodes.get(user.id.as_str()) else {
                continue;
            };
            for (targets, relationship) in [(&user.likes, rel::LIKES), (&user.played, rel::PLAYED)]
            {
                for target in targets {
                    if let Some(&to) = item_nodes.get(target.as_str()) {
                        graph.add_edge(from, to, relationship)?;
                        summary.relationships += 1;
                    }
                }
            }
            for friend in &user.friends {
                if let Some(&to) = user_nodes.get(friend.as_str()) {
                    graph.add_edge(from, to, rel::FRIENDS_WITH)?;
                    summary.relationships += 1;
                }
            }
        }

        summary.categories = categories.len();
        info!(
            items = summary.items,
            users = summary.users,
            categories = summary.categories,
            relationships = summary.relationships,
            "dataset loaded"
        );
        Ok(summary)
    }
}
