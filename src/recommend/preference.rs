//! Preference-driven recommendations.
//!
//! A user's preferred genres and platforms are derived from the items they
//! like. Candidates come from one query whose filters are independent
//! [`CandidateFilter`]s, each present only when its driving set is non-empty;
//! scores are then computed against the [`CategoryIndex`] snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::gateway::GraphGateway;
use crate::index::{CategoryIndex, CategoryKind, IndexHandle};
use crate::model::{labels, rel};
use crate::query::ast::{BoolExpr, EdgeDirection, QueryAst};
use crate::query::{predicate, QueryBuilder, QueryError};
use crate::recommend::{ItemCatalog, Recommendation, RecommendationKind, ScoreBoard};

/// Points awarded per matching preferred category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Per preferred genre the item belongs to.
    pub genre: u64,
    /// Per preferred platform the item is available on.
    pub platform: u64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            genre: 2,
            platform: 1,
        }
    }
}

/// Facts derived from a user's interactions for one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPreferences {
    /// Genres of liked items.
    pub genres: BTreeSet<String>,
    /// Platforms of liked items.
    pub platforms: BTreeSet<String>,
    /// Items the user liked or played.
    pub known_items: BTreeSet<String>,
}

impl UserPreferences {
    /// Filters driven by the non-empty preference sets, in a fixed order.
    pub fn candidate_filters(&self) -> Vec<CandidateFilter> {
        let mut filters = Vec::with_capacity(3);
        if !self.genres.is_empty() {
            filters.push(CandidateFilter::InGenres(self.genres.clone()));
        }
        if !self.platforms.is_empty() {
            filters.push(CandidateFilter::OnPlatforms(self.platforms.clone()));
        }
        if !self.known_items.is_empty() {
            filters.push(CandidateFilter::Excluding(self.known_items.clone()));
        }
        filters
    }
}

/// One independent clause of the candidate query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateFilter {
    /// Item belongs to at least one of the genres.
    InGenres(BTreeSet<String>),
    /// Item is available on at least one of the platforms.
    OnPlatforms(BTreeSet<String>),
    /// Item id is none of these.
    Excluding(BTreeSet<String>),
}

impl CandidateFilter {
    /// Predicate over the `item` variable.
    pub fn to_expr(&self) -> std::result::Result<BoolExpr, QueryError> {
        match self {
            CandidateFilter::InGenres(genres) => predicate("item", |p| {
                p.exists(
                    rel::BELONGS_TO_GENRE,
                    EdgeDirection::Out,
                    ("g", labels::GENRE),
                    |g| {
                        g.in_list("name", genres.iter());
                    },
                );
            }),
            CandidateFilter::OnPlatforms(platforms) => predicate("item", |p| {
                p.exists(
                    rel::AVAILABLE_ON,
                    EdgeDirection::Out,
                    ("pl", labels::PLATFORM),
                    |pl| {
                        pl.in_list("name", platforms.iter());
                    },
                );
            }),
            CandidateFilter::Excluding(ids) => predicate("item", |p| {
                p.not_group(|n| {
                    n.in_list("id", ids.iter());
                });
            }),
        }
    }
}

/// Builds the candidate query for `prefs`; every active filter is conjoined.
pub fn candidate_query(prefs: &UserPreferences) -> std::result::Result<QueryAst, QueryError> {
    let filters = prefs
        .candidate_filters()
        .iter()
        .map(CandidateFilter::to_expr)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    QueryBuilder::new()
        .r#match(("item", labels::ITEM))
        .filters(filters)
        .select([("item.id", "itemId"), ("item.name", "itemName")])
        .build()
}

/// Score of `item_id` for `prefs`: the genre weight per preferred genre
/// containing the item plus the platform weight per preferred platform.
pub fn score(
    index: &CategoryIndex,
    prefs: &UserPreferences,
    weights: ScoreWeights,
    item_id: &str,
) -> u64 {
    let matching = |kind: CategoryKind, names: &BTreeSet<String>| {
        names
            .iter()
            .filter(|name| index.contains(kind, name, item_id))
            .count() as u64
    };
    weights.genre * matching(CategoryKind::Genre, &prefs.genres)
        + weights.platform * matching(CategoryKind::Platform, &prefs.platforms)
}

/// Ranks unseen items by overlap with the user's preferred categories.
#[derive(Clone, Debug)]
pub struct PreferenceRecommender {
    gateway: GraphGateway,
    catalog: ItemCatalog,
    index: Arc<IndexHandle>,
    weights: ScoreWeights,
}

impl PreferenceRecommender {
    /// Creates a recommender scoring against `index`.
    pub fn new(gateway: GraphGateway, index: Arc<IndexHandle>, weights: ScoreWeights) -> Self {
        Self {
            catalog: ItemCatalog::new(gateway.clone()),
            gateway,
            index,
            weights,
        }
    }

    /// Builds the category index from `gateway` and wraps it.
    pub fn build(gateway: GraphGateway, weights: ScoreWeights) -> Result<Self> {
        let index = CategoryIndex::build(&gateway)?;
        Ok(Self::new(gateway, Arc::new(IndexHandle::new(index)), weights))
    }

    /// Weights in use.
    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Derives preferences for `user_id`; `None` when the user is unknown.
    pub fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        if !self.catalog.user_exists(user_id)? {
            return Ok(None);
        }
        Ok(Some(UserPreferences {
            genres: self.liked_categories(user_id, CategoryKind::Genre)?,
            platforms: self.liked_categories(user_id, CategoryKind::Platform)?,
            known_items: self.catalog.known_items(user_id)?,
        }))
    }

    /// Unseen items for `user_id`, best first. An unknown user yields an empty
    /// list.
    pub fn recommend_by_user(
        &self,
        user_id: &str,
        max_results: usize,
    ) -> Result<Vec<Recommendation>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let Some(prefs) = self.preferences(user_id)? else {
            debug!(user_id, "user not found");
            return Ok(Vec::new());
        };
        debug!(
            user_id,
            genres = prefs.genres.len(),
            platforms = prefs.platforms.len(),
            known = prefs.known_items.len(),
            "user preferences derived"
        );

        let query = candidate_query(&prefs)?;
        let index = self.index.snapshot();
        let mut board = ScoreBoard::new();
        for row in self.gateway.run(&query)? {
            let item_id = row.str("itemId")?;
            let item_name = row.opt_str("itemName")?.unwrap_or(item_id);
            board.add(
                item_id,
                item_name,
                score(&index, &prefs, self.weights, item_id),
            );
        }

        let ranked = board.into_ranked(RecommendationKind::Personal, max_results);
        info!(
            user_id,
            candidates = ranked.len(),
            "preference recommendations produced"
        );
        Ok(ranked)
    }

    fn liked_categories(&self, user_id: &str, kind: CategoryKind) -> Result<BTreeSet<String>> {
        let query = QueryBuilder::new()
            .r#match(("u", labels::USER))
            .keyed("id", user_id)
            .where_edge(rel::LIKES, ("liked", labels::ITEM))
            .where_edge(kind.relationship(), ("cat", kind.label()))
            .distinct()
            .select([("cat.name", "name")])
            .build()?;
        let mut names = BTreeSet::new();
        for row in self.gateway.run(&query)? {
            if let Some(name) = row.opt_str("name")? {
                names.insert(name.to_owned());
            }
        }
        Ok(names)
    }
}
