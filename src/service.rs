//! Facade bundling the recommenders over one gateway and one category index.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::RecommenderSection;
use crate::dataset::Dataset;
use crate::error::{GraphError, Result};
use crate::gateway::{GraphGateway, MemoryGraph};
use crate::health::{Check, HealthReport};
use crate::index::{CategoryIndex, IndexHandle, IndexStats};
use crate::model::Item;
use crate::recommend::{
    CollaborativeRecommender, ItemCatalog, ItemSimilarityRecommender, ItemSummary,
    PreferenceRecommender, Recommendation,
};

/// Every recommender wired to a shared gateway and index snapshot.
#[derive(Clone, Debug)]
pub struct RecommendationService {
    gateway: GraphGateway,
    index: Arc<IndexHandle>,
    similarity: ItemSimilarityRecommender,
    preference: PreferenceRecommender,
    collaborative: CollaborativeRecommender,
    catalog: ItemCatalog,
    settings: RecommenderSection,
}

impl RecommendationService {
    /// Builds the category index from `gateway` and wires the recommenders.
    pub fn new(gateway: GraphGateway, settings: RecommenderSection) -> Result<Self> {
        let index = Arc::new(IndexHandle::new(CategoryIndex::build(&gateway)?));
        Ok(Self {
            similarity: ItemSimilarityRecommender::new(gateway.clone()),
            preference: PreferenceRecommender::new(
                gateway.clone(),
                Arc::clone(&index),
                settings.weights(),
            ),
            collaborative: CollaborativeRecommender::new(gateway.clone()),
            catalog: ItemCatalog::new(gateway.clone()),
            gateway,
            index,
            settings,
        })
    }

    /// Loads `dataset` into a fresh in-memory graph and serves from it.
    pub fn from_dataset(dataset: &Dataset, settings: RecommenderSection) -> Result<Self> {
        Self::from_graph(dataset.into_graph()?, settings)
    }

    /// Serves from an existing in-memory graph.
    pub fn from_graph(graph: MemoryGraph, settings: RecommenderSection) -> Result<Self> {
        Self::new(GraphGateway::new(graph), settings)
    }

    /// Settings in effect.
    pub fn settings(&self) -> &RecommenderSection {
        &self.settings
    }

    /// Uses the configured default when `requested` is `None`.
    pub fn max_results(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.settings.default_max_results)
    }

    /// See [`ItemSimilarityRecommender::recommend_by_item`].
    pub fn recommend_by_item(&self, seed_id: &str, max_results: usize) -> Result<Vec<Recommendation>> {
        self.similarity.recommend_by_item(seed_id, max_results)
    }

    /// See [`PreferenceRecommender::recommend_by_user`].
    pub fn recommend_by_user(&self, user_id: &str, max_results: usize) -> Result<Vec<Recommendation>> {
        self.preference.recommend_by_user(user_id, max_results)
    }

    /// See [`CollaborativeRecommender::recommend_by_friends`].
    pub fn recommend_by_friends(
        &self,
        user_id: &str,
        max_results: usize,
    ) -> Result<Vec<Recommendation>> {
        self.collaborative.recommend_by_friends(user_id, max_results)
    }

    /// See [`CollaborativeRecommender::recommend_by_similar_users`].
    pub fn recommend_by_similar_users(
        &self,
        user_id: &str,
        max_results: usize,
    ) -> Result<Vec<Recommendation>> {
        self.collaborative
            .recommend_by_similar_users(user_id, max_results)
    }

    /// Name search. Needles shorter than `min_search_length` characters (after
    /// trimming) are rejected; at most `search_limit` hits are returned.
    pub fn search(&self, needle: &str) -> Result<Vec<ItemSummary>> {
        let needle = needle.trim();
        if needle.chars().count() < self.settings.min_search_length {
            return Err(GraphError::InvalidArgument(format!(
                "search query must be at least {} characters",
                self.settings.min_search_length
            )));
        }
        self.catalog.search(needle, self.settings.search_limit)
    }

    /// Full item record, `None` when absent.
    pub fn fetch_item(&self, item_id: &str) -> Result<Option<Item>> {
        self.catalog.fetch_item(item_id)
    }

    /// Statistics for the snapshot currently in use.
    pub fn index_stats(&self) -> IndexStats {
        self.index.snapshot().stats()
    }

    /// Rebuilds the category index and swaps it in. On failure the previous
    /// snapshot keeps serving.
    pub fn rebuild_index(&self) -> Result<IndexStats> {
        match self.index.rebuild(&self.gateway) {
            Ok(index) => {
                let stats = index.stats();
                info!(entries = stats.entries, "category index rebuilt");
                Ok(stats)
            }
            Err(err) => {
                warn!(%err, "category index rebuild failed; keeping previous snapshot");
                Err(err)
            }
        }
    }

    /// Store reachability plus index freshness and population.
    pub fn health(&self) -> HealthReport {
        let mut report = HealthReport::new();
        report.add_check(Check::Store {
            source: self.gateway.describe(),
            healthy: self.gateway.health_check(),
        });

        let index = self.index.snapshot();
        let age = (OffsetDateTime::now_utc() - index.built_at()).whole_seconds();
        let seconds = u64::try_from(age).unwrap_or_default();
        let threshold = self.settings.index_stale_after_secs;
        report.add_check(Check::IndexAge {
            seconds,
            threshold,
            healthy: seconds <= threshold,
        });

        let entries = index.stats().entries;
        report.add_check(Check::IndexPopulated {
            entries,
            healthy: entries > 0,
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    fn dataset() -> Dataset {
        Dataset::from_json(
            r#"{
                "items": [
                    {"id": "a", "name": "Alpha", "genres": ["RPG"]},
                    {"id": "b", "name": "Beta", "genres": ["RPG"]}
                ],
                "users": [{"id": "u1", "likes": ["a"]}]
            }"#,
        )
        .expect("dataset")
    }

    #[test]
    fn search_enforces_the_minimum_length() {
        let service =
            RecommendationService::from_dataset(&dataset(), RecommenderSection::default())
                .expect("service");
        assert!(matches!(
            service.search(" a "),
            Err(GraphError::InvalidArgument(_))
        ));
        let hits = service.search("ALP").expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn health_reflects_store_and_index() {
        let graph = dataset().into_graph().expect("graph");
        let service = RecommendationService::from_graph(graph.clone(), RecommenderSection::default())
            .expect("service");
        assert_eq!(service.health().status, HealthStatus::Healthy);

        graph.set_offline(true);
        let report = service.health();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(!report.is_serving());
    }

    #[test]
    fn empty_graph_reports_degraded() {
        let service =
            RecommendationService::from_graph(MemoryGraph::new(), RecommenderSection::default())
                .expect("service");
        assert_eq!(service.health().status, HealthStatus::Degraded);
        assert_eq!(service.max_results(None), 10);
        assert_eq!(service.max_results(Some(3)), 3);
    }

    #[test]
    fn failed_rebuild_keeps_the_previous_snapshot() {
        let graph = dataset().into_graph().expect("graph");
        let service = RecommendationService::from_graph(graph.clone(), RecommenderSection::default())
            .expect("service");
        let before = service.index_stats();
        graph.fail_next_query(1);
        assert!(service.rebuild_index().is_err());
        assert_eq!(service.index_stats(), before);
        assert_eq!(service.rebuild_index().expect("rebuild").entries, before.entries);
    }
}
