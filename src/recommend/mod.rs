#![forbid(unsafe_code)]

//! Recommenders and the value type they all produce.
//!
//! Every recommender accumulates integer scores per candidate in a
//! [`ScoreBoard`] and hands the result to [`rank`], so ordering (score
//! descending, item id ascending) and truncation behave the same everywhere.

use std::cmp::Ordering;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

mod catalog;
mod collaborative;
mod preference;
mod similarity;

pub use catalog::{ItemCatalog, ItemSummary};
pub use collaborative::CollaborativeRecommender;
pub use preference::{
    candidate_query, score, CandidateFilter, PreferenceRecommender, ScoreWeights, UserPreferences,
};
pub use similarity::{AttributeKey, ItemSimilarityRecommender, KeyValue};

/// Default number of results when a caller does not ask for a specific count.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Which family of recommender produced a [`Recommendation`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    /// Derived from the item graph or the user's own history.
    Personal,
    /// Derived from other users' likes.
    Collaborative,
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationKind::Personal => f.write_str("personal"),
            RecommendationKind::Collaborative => f.write_str("collaborative"),
        }
    }
}

/// A ranked candidate item.
///
/// The natural order is the ranking order: higher score first, then item id
/// ascending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Stable item key.
    #[serde(rename = "gameId")]
    pub item_id: String,
    /// Item display name.
    #[serde(rename = "gameName")]
    pub item_name: String,
    /// Additive, recommender-specific score.
    pub score: u64,
    /// Producing recommender family.
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
}

impl Recommendation {
    /// Creates a recommendation.
    pub fn new(
        item_id: impl Into<String>,
        item_name: impl Into<String>,
        score: u64,
        kind: RecommendationKind,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            item_name: item_name.into(),
            score,
            kind,
        }
    }
}

impl Ord for Recommendation {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.item_id.cmp(&other.item_id))
            .then_with(|| self.item_name.cmp(&other.item_name))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for Recommendation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sorts into ranking order and keeps at most `max_results` entries.
pub fn rank(mut recommendations: Vec<Recommendation>, max_results: usize) -> Vec<Recommendation> {
    if max_results == 0 {
        return Vec::new();
    }
    recommendations.sort_unstable();
    recommendations.truncate(max_results);
    recommendations
}

#[derive(Debug)]
struct Tally {
    name: String,
    score: u64,
}

/// Per-item score accumulator.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    tallies: FxHashMap<String, Tally>,
}

impl ScoreBoard {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `points` to `item_id`, registering it on first sight.
    pub fn add(&mut self, item_id: &str, item_name: &str, points: u64) {
        match self.tallies.get_mut(item_id) {
            Some(tally) => tally.score += points,
            None => {
                self.tallies.insert(
                    item_id.to_owned(),
                    Tally {
                        name: item_name.to_owned(),
                        score: points,
                    },
                );
            }
        }
    }

    /// Whether `item_id` has been registered.
    pub fn contains(&self, item_id: &str) -> bool {
        self.tallies.contains_key(item_id)
    }

    /// Number of distinct items registered.
    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    /// Whether no item has been registered.
    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Current score of `item_id`.
    pub fn score(&self, item_id: &str) -> Option<u64> {
        self.tallies.get(item_id).map(|tally| tally.score)
    }

    /// Ranks the board into at most `max_results` recommendations of `kind`.
    pub fn into_ranked(self, kind: RecommendationKind, max_results: usize) -> Vec<Recommendation> {
        let all = self
            .tallies
            .into_iter()
            .map(|(id, tally)| Recommendation::new(id, tally.name, tally.score, kind))
            .collect();
        rank(all, max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, score: u64) -> Recommendation {
        Recommendation::new(id, id.to_uppercase(), score, RecommendationKind::Personal)
    }

    #[test]
    fn ranking_breaks_ties_on_item_id() {
        let ranked = rank(vec![rec("c", 1), rec("b", 2), rec("a", 1), rec("d", 2)], 10);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn zero_max_results_is_empty() {
        assert!(rank(vec![rec("a", 1)], 0).is_empty());
        assert_eq!(rank(vec![rec("a", 1), rec("b", 3)], 1), vec![rec("b", 3)]);
    }

    #[test]
    fn board_accumulates() {
        let mut board = ScoreBoard::new();
        board.add("a", "Alpha", 2);
        board.add("a", "ignored", 1);
        board.add("b", "Beta", 0);
        assert_eq!(board.score("a"), Some(3));
        let ranked = board.into_ranked(RecommendationKind::Collaborative, 5);
        assert_eq!(ranked[0].item_name, "Alpha");
        assert_eq!(ranked[1].score, 0);
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(rec("a", 3)).expect("json");
        assert_eq!(
            json,
            serde_json::json!({"gameId": "a", "gameName": "A", "score": 3, "type": "PERSONAL"})
        );
        assert_eq!(RecommendationKind::Collaborative.to_string(), "collaborative");
    }
}
