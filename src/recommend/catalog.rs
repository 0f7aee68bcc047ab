//! Read-side lookups shared by the recommenders and the outer surfaces.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::gateway::GraphGateway;
use crate::index::CategoryKind;
use crate::model::{labels, rel, Item};
use crate::query::{QueryBuilder, Value};

/// Search hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    /// Stable item key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Release year, when recorded.
    pub release_year: Option<i64>,
}

/// Item and user lookups by stable key.
#[derive(Clone, Debug)]
pub struct ItemCatalog {
    gateway: GraphGateway,
}

impl ItemCatalog {
    /// Creates a catalog over `gateway`.
    pub fn new(gateway: GraphGateway) -> Self {
        Self { gateway }
    }

    /// Whether a `User` node with `user_id` exists.
    pub fn user_exists(&self, user_id: &str) -> Result<bool> {
        let query = QueryBuilder::new()
            .r#match(("u", labels::USER))
            .keyed("id", user_id)
            .select([("u.id", "userId")])
            .limit(1)
            .build()?;
        Ok(!self.gateway.run(&query)?.is_empty())
    }

    /// Display name of the item with `item_id`, or `None` when absent.
    pub fn item_name(&self, item_id: &str) -> Result<Option<String>> {
        let query = QueryBuilder::new()
            .r#match(("item", labels::ITEM))
            .keyed("id", item_id)
            .select([("item.name", "itemName")])
            .limit(1)
            .build()?;
        match self.gateway.run(&query)?.rows.first() {
            Some(row) => Ok(Some(row.opt_str("itemName")?.unwrap_or(item_id).to_owned())),
            None => Ok(None),
        }
    }

    /// Distinct ids of items the user LIKES or PLAYED.
    pub fn known_items(&self, user_id: &str) -> Result<BTreeSet<String>> {
        let query = QueryBuilder::new()
            .r#match(("u", labels::USER))
            .keyed("id", user_id)
            .where_edge([rel::LIKES, rel::PLAYED], ("item", labels::ITEM))
            .distinct()
            .select([("item.id", "itemId")])
            .build()?;
        self.gateway
            .run(&query)?
            .into_iter()
            .map(|row| row.str("itemId").map(str::to_owned))
            .collect()
    }

    /// Case-insensitive substring search on item names, ordered by name then id.
    pub fn search(&self, needle: &str, limit: usize) -> Result<Vec<ItemSummary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = QueryBuilder::new()
            .r#match(("item", labels::ITEM))
            .where_var("item", |p| {
                p.contains("name", needle);
            })
            .select([
                ("item.id", "itemId"),
                ("item.name", "itemName"),
                ("item.releaseYear", "releaseYear"),
            ])
            .order_by("itemName", false)
            .order_by("itemId", false)
            .limit(limit)
            .build()?;
        let hits = self
            .gateway
            .run(&query)?
            .into_iter()
            .map(|row| {
                Ok(ItemSummary {
                    id: row.str("itemId")?.to_owned(),
                    name: row.str("itemName")?.to_owned(),
                    release_year: row.opt_int("releaseYear")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(needle, hits = hits.len(), "catalog search");
        Ok(hits)
    }

    /// Full item with its category sets, or `None` when absent.
    pub fn fetch_item(&self, item_id: &str) -> Result<Option<Item>> {
        let query = QueryBuilder::new()
            .r#match(("item", labels::ITEM))
            .keyed("id", item_id)
            .select([
                ("item.name", "itemName"),
                ("item.releaseYear", "releaseYear"),
                ("item.isMultiplayer", "isMultiplayer"),
            ])
            .limit(1)
            .build()?;
        let result = self.gateway.run(&query)?;
        let Some(row) = result.rows.first() else {
            return Ok(None);
        };

        let mut item = Item::new(item_id, row.opt_str("itemName")?.unwrap_or(item_id));
        item.release_year = row.opt_int("releaseYear")?.unwrap_or_default();
        item.is_multiplayer = row.opt_bool("isMultiplayer")?.unwrap_or_default();
        for kind in CategoryKind::ALL {
            let names = self.categories_of(item_id, kind)?;
            match kind {
                CategoryKind::Genre => item.genres = names,
                CategoryKind::Platform => item.platforms = names,
                CategoryKind::Developer => item.developers = names,
            }
        }
        Ok(Some(item))
    }

    fn categories_of(&self, item_id: &str, kind: CategoryKind) -> Result<BTreeSet<String>> {
        let query = QueryBuilder::new()
            .r#match(("item", labels::ITEM))
            .keyed("id", item_id)
            .where_edge(kind.relationship(), ("cat", kind.label()))
            .distinct()
            .select([("cat.name", "name")])
            .build()?;
        let mut names = BTreeSet::new();
        for row in self.gateway.run(&query)? {
            if let Some(Value::String(name)) = row.get("name") {
                names.insert(name.clone());
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGraph;
    use crate::model::PropertyValue;

    fn catalog() -> (MemoryGraph, ItemCatalog) {
        let graph = MemoryGraph::new();
        let zelda = graph.add_node(
            ["Item"],
            [
                ("id", PropertyValue::from("z")),
                ("name", PropertyValue::from("Zelda")),
                ("releaseYear", PropertyValue::from(1986_i64)),
            ],
        );
        graph.add_node(
            ["Item"],
            [
                ("id", PropertyValue::from("d")),
                ("name", PropertyValue::from("Zeldarian Tales")),
            ],
        );
        let adventure = graph.merge_node("Genre", "name", "Adventure");
        graph
            .add_edge(zelda, adventure, "BELONGS_TO_GENRE")
            .expect("edge");
        let user = graph.add_node(["User"], [("id", PropertyValue::from("u1"))]);
        graph.add_edge(user, zelda, "PLAYED").expect("edge");
        let catalog = ItemCatalog::new(GraphGateway::new(graph.clone()));
        (graph, catalog)
    }

    #[test]
    fn search_orders_by_name_and_limits() {
        let (_, catalog) = catalog();
        let hits = catalog.search("zELd", 10).expect("search");
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Zelda", "Zeldarian Tales"]);
        assert_eq!(hits[0].release_year, Some(1986));
        assert_eq!(hits[1].release_year, None);
        assert_eq!(catalog.search("zeld", 1).expect("search").len(), 1);
    }

    #[test]
    fn fetch_item_collects_categories() {
        let (_, catalog) = catalog();
        let item = catalog.fetch_item("z").expect("fetch").expect("present");
        assert_eq!(item.name, "Zelda");
        assert_eq!(item.release_year, 1986);
        assert!(item.genres.contains("Adventure"));
        assert!(item.platforms.is_empty());
        assert!(catalog.fetch_item("missing").expect("fetch").is_none());
    }

    #[test]
    fn users_and_known_items() {
        let (_, catalog) = catalog();
        assert!(catalog.user_exists("u1").expect("lookup"));
        assert!(!catalog.user_exists("u2").expect("lookup"));
        assert_eq!(
            catalog.known_items("u1").expect("known"),
            BTreeSet::from(["z".to_owned()])
        );
    }
}
