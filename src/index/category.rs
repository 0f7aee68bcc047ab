//! Category -> item id snapshot used to score preference candidates.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::Result;
use crate::gateway::GraphGateway;
use crate::model::{labels, rel};
use crate::query::QueryBuilder;

/// Categorical attribute families indexed by [`CategoryIndex`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// `Item -BELONGS_TO_GENRE-> Genre`
    Genre,
    /// `Item -AVAILABLE_ON-> Platform`
    Platform,
    /// `Item -DEVELOPED_BY-> Developer`
    Developer,
}

impl CategoryKind {
    /// Every kind, in build order.
    pub const ALL: [CategoryKind; 3] = [
        CategoryKind::Genre,
        CategoryKind::Platform,
        CategoryKind::Developer,
    ];

    /// Node label of the attribute.
    pub fn label(self) -> &'static str {
        match self {
            CategoryKind::Genre => labels::GENRE,
            CategoryKind::Platform => labels::PLATFORM,
            CategoryKind::Developer => labels::DEVELOPER,
        }
    }

    /// Relationship type linking an item to the attribute.
    pub fn relationship(self) -> &'static str {
        match self {
            CategoryKind::Genre => rel::BELONGS_TO_GENRE,
            CategoryKind::Platform => rel::AVAILABLE_ON,
            CategoryKind::Developer => rel::DEVELOPED_BY,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Genre => "genre",
            CategoryKind::Platform => "platform",
            CategoryKind::Developer => "developer",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Postings = FxHashMap<String, FxHashSet<String>>;

/// Immutable point-in-time mapping from category name to item ids.
///
/// Built from one read of the store and never mutated afterwards, so a shared
/// `Arc<CategoryIndex>` can be read concurrently without locking. Refreshing
/// means building a new snapshot (see [`IndexHandle`]).
#[derive(Clone)]
pub struct CategoryIndex {
    genres: Postings,
    platforms: Postings,
    developers: Postings,
    built_at: OffsetDateTime,
    empty: FxHashSet<String>,
}

impl fmt::Debug for CategoryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryIndex")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Summary of a snapshot, used by the `index` command and the HTTP surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Distinct genre names.
    pub genres: usize,
    /// Distinct platform names.
    pub platforms: usize,
    /// Distinct developer names.
    pub developers: usize,
    /// Total (category, item) pairs.
    pub entries: usize,
    /// When the snapshot was read from the store.
    #[serde(with = "time::serde::rfc3339")]
    pub built_at: OffsetDateTime,
}

impl CategoryIndex {
    /// Reads every item/category edge from the store and folds the rows into
    /// a fresh snapshot. Duplicate edges collapse silently.
    pub fn build(gateway: &GraphGateway) -> Result<Self> {
        let mut index = Self::empty_at(OffsetDateTime::now_utc());
        for kind in CategoryKind::ALL {
            let query = QueryBuilder::new()
                .r#match(("item", labels::ITEM))
                .where_edge(kind.relationship(), ("cat", kind.label()))
                .select([("item.id", "itemId"), ("cat.name", "categoryName")])
                .build()?;
            let rows = gateway.run(&query)?;
            let postings = index.postings_mut(kind);
            for row in rows {
                match (row.opt_str("itemId")?, row.opt_str("categoryName")?) {
                    (Some(item), Some(category)) => {
                        postings
                            .entry(category.to_owned())
                            .or_default()
                            .insert(item.to_owned());
                    }
                    _ => debug!(%kind, "skipping category row without a key"),
                }
            }
        }
        info!(
            genres = index.genres.len(),
            platforms = index.platforms.len(),
            developers = index.developers.len(),
            "category index built"
        );
        Ok(index)
    }

    /// Builds a snapshot from explicit `(kind, category, item id)` triples.
    pub fn from_entries<I, C, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (CategoryKind, C, T)>,
        C: Into<String>,
        T: Into<String>,
    {
        let mut index = Self::empty_at(OffsetDateTime::now_utc());
        for (kind, category, item) in entries {
            index
                .postings_mut(kind)
                .entry(category.into())
                .or_default()
                .insert(item.into());
        }
        index
    }

    fn empty_at(built_at: OffsetDateTime) -> Self {
        Self {
            genres: Postings::default(),
            platforms: Postings::default(),
            developers: Postings::default(),
            built_at,
            empty: FxHashSet::default(),
        }
    }

    fn postings(&self, kind: CategoryKind) -> &Postings {
        match kind {
            CategoryKind::Genre => &self.genres,
            CategoryKind::Platform => &self.platforms,
            CategoryKind::Developer => &self.developers,
        }
    }

    fn postings_mut(&mut self, kind: CategoryKind) -> &mut Postings {
        match kind {
            CategoryKind::Genre => &mut self.genres,
            CategoryKind::Platform => &mut self.platforms,
            CategoryKind::Developer => &mut self.developers,
        }
    }

    /// Item ids carrying `category`; empty for unknown names.
    pub fn lookup(&self, kind: CategoryKind, category: &str) -> &FxHashSet<String> {
        self.postings(kind).get(category).unwrap_or(&self.empty)
    }

    /// Whether `item_id` carries `category`.
    pub fn contains(&self, kind: CategoryKind, category: &str, item_id: &str) -> bool {
        self.lookup(kind, category).contains(item_id)
    }

    /// Category names of `kind`, sorted.
    pub fn categories(&self, kind: CategoryKind) -> Vec<&str> {
        let mut names: Vec<&str> = self.postings(kind).keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build timestamp of the snapshot.
    pub fn built_at(&self) -> OffsetDateTime {
        self.built_at
    }

    /// Size summary.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            genres: self.genres.len(),
            platforms: self.platforms.len(),
            developers: self.developers.len(),
            entries: CategoryKind::ALL
                .iter()
                .flat_map(|kind| self.postings(*kind).values())
                .map(FxHashSet::len)
                .sum(),
            built_at: self.built_at,
        }
    }
}

/// Holder of the current snapshot.
///
/// Readers clone the inner `Arc` and keep a consistent view for as long as
/// they hold it; a rebuild swaps in a whole new snapshot.
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<CategoryIndex>>,
}

impl IndexHandle {
    /// Wraps an initial snapshot.
    pub fn new(index: CategoryIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// The snapshot currently in use.
    pub fn snapshot(&self) -> Arc<CategoryIndex> {
        Arc::clone(&self.current.read())
    }

    /// Installs `index` and returns the snapshot it replaced.
    pub fn replace(&self, index: CategoryIndex) -> Arc<CategoryIndex> {
        std::mem::replace(&mut *self.current.write(), Arc::new(index))
    }

    /// Builds a new snapshot from `gateway` and swaps it in. The previous
    /// snapshot stays installed if the build fails.
    pub fn rebuild(&self, gateway: &GraphGateway) -> Result<Arc<CategoryIndex>> {
        let fresh = Arc::new(CategoryIndex::build(gateway)?);
        *self.current.write() = Arc::clone(&fresh);
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGraph;
    use crate::model::PropertyValue;

    fn graph() -> MemoryGraph {
        let graph = MemoryGraph::new();
        let a = graph.add_node(["Item"], [("id", PropertyValue::from("a"))]);
        let b = graph.add_node(["Item"], [("id", PropertyValue::from("b"))]);
        let rpg = graph.merge_node("Genre", "name", "RPG");
        let pc = graph.merge_node("Platform", "name", "PC");
        graph.add_edge(a, rpg, "BELONGS_TO_GENRE").expect("edge");
        graph.add_edge(a, rpg, "BELONGS_TO_GENRE").expect("duplicate edge");
        graph.add_edge(b, rpg, "BELONGS_TO_GENRE").expect("edge");
        graph.add_edge(b, pc, "AVAILABLE_ON").expect("edge");
        graph
    }

    #[test]
    fn build_folds_rows_and_collapses_duplicates() {
        let index = CategoryIndex::build(&GraphGateway::new(graph())).expect("index");
        let rpg = index.lookup(CategoryKind::Genre, "RPG");
        assert_eq!(rpg.len(), 2);
        assert!(index.contains(CategoryKind::Platform, "PC", "b"));
        assert!(!index.contains(CategoryKind::Platform, "PC", "a"));
        assert_eq!(index.stats().entries, 3);
    }

    #[test]
    fn unknown_categories_are_empty() {
        let index = CategoryIndex::from_entries(Vec::<(CategoryKind, String, String)>::new());
        assert!(index.lookup(CategoryKind::Developer, "Nobody").is_empty());
        assert!(index.categories(CategoryKind::Genre).is_empty());
    }

    #[test]
    fn kinds_are_kept_apart() {
        let index = CategoryIndex::from_entries([
            (CategoryKind::Genre, "Strategy", "a"),
            (CategoryKind::Developer, "Strategy", "b"),
        ]);
        assert!(index.contains(CategoryKind::Genre, "Strategy", "a"));
        assert!(!index.contains(CategoryKind::Genre, "Strategy", "b"));
    }

    #[test]
    fn rebuild_swaps_without_touching_held_snapshots() {
        let graph = graph();
        let gateway = GraphGateway::new(graph.clone());
        let handle = IndexHandle::new(CategoryIndex::build(&gateway).expect("index"));
        let before = handle.snapshot();

        let c = graph.add_node(["Item"], [("id", PropertyValue::from("c"))]);
        let rpg = graph.merge_node("Genre", "name", "RPG");
        graph.add_edge(c, rpg, "BELONGS_TO_GENRE").expect("edge");

        assert_eq!(before.lookup(CategoryKind::Genre, "RPG").len(), 2);
        handle.rebuild(&gateway).expect("rebuild");
        assert_eq!(before.lookup(CategoryKind::Genre, "RPG").len(), 2);
        assert_eq!(handle.snapshot().lookup(CategoryKind::Genre, "RPG").len(), 3);
        assert!(handle.snapshot().built_at() >= before.built_at());
    }

    #[test]
    fn failed_rebuild_keeps_the_old_snapshot() {
        let graph = graph();
        let gateway = GraphGateway::new(graph.clone());
        let handle = IndexHandle::new(CategoryIndex::build(&gateway).expect("index"));
        graph.fail_next_query(1);
        assert!(handle.rebuild(&gateway).is_err());
        assert_eq!(handle.snapshot().lookup(CategoryKind::Genre, "RPG").len(), 2);
        assert_eq!(graph.open_sessions(), 0);
    }
}
