//! Recommendations drawn from other users' likes.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::error::Result;
use crate::gateway::GraphGateway;
use crate::model::{labels, rel};
use crate::query::QueryBuilder;
use crate::recommend::{ItemCatalog, Recommendation, RecommendationKind, ScoreBoard};

#[derive(Debug, Default)]
struct Liked {
    name: String,
    likers: BTreeSet<String>,
}

/// Item id -> name and the distinct users who like it.
type LikesByItem = BTreeMap<String, Liked>;

/// Friend- and neighbour-based recommender.
#[derive(Clone, Debug)]
pub struct CollaborativeRecommender {
    gateway: GraphGateway,
    catalog: ItemCatalog,
}

impl CollaborativeRecommender {
    /// Creates a recommender over `gateway`.
    pub fn new(gateway: GraphGateway) -> Self {
        Self {
            catalog: ItemCatalog::new(gateway.clone()),
            gateway,
        }
    }

    /// Items liked by the user's friends, scored by how many friends like
    /// each. When that yields fewer than `max_results` items, friends of
    /// friends contribute half their count (rounded down) until twice
    /// `max_results` items have been collected.
    pub fn recommend_by_friends(
        &self,
        user_id: &str,
        max_results: usize,
    ) -> Result<Vec<Recommendation>> {
        if max_results == 0 || !self.catalog.user_exists(user_id)? {
            return Ok(Vec::new());
        }
        let known = self.catalog.known_items(user_id)?;
        let friends = self.friends_of(user_id)?;

        let mut board = ScoreBoard::new();
        for (item_id, liked) in self.likes_of(&friends)? {
            if !known.contains(&item_id) {
                board.add(&item_id, &liked.name, liked.likers.len() as u64);
            }
        }

        if board.len() < max_results {
            let mut extended: BTreeSet<String> = BTreeSet::new();
            for friend in &friends {
                extended.extend(self.friends_of(friend)?);
            }
            extended.remove(user_id);
            extended.retain(|candidate| !friends.contains(candidate));
            debug!(user_id, friends_of_friends = extended.len(), "extending friend circle");

            let mut counted: Vec<(String, Liked)> = self
                .likes_of(&extended)?
                .into_iter()
                .filter(|(item_id, _)| !known.contains(item_id))
                .collect();
            counted.sort_by(|(a_id, a), (b_id, b)| {
                b.likers.len().cmp(&a.likers.len()).then_with(|| a_id.cmp(b_id))
            });
            let cap = max_results.saturating_mul(2);
            for (item_id, liked) in counted {
                if board.len() >= cap {
                    break;
                }
                board.add(&item_id, &liked.name, liked.likers.len() as u64 / 2);
            }
        }

        let ranked = board.into_ranked(RecommendationKind::Collaborative, max_results);
        info!(
            user_id,
            friends = friends.len(),
            results = ranked.len(),
            "friend recommendations produced"
        );
        Ok(ranked)
    }

    /// Items liked by users who share at least one liked item with the user.
    /// Each such user weighs in with their number of common likes.
    pub fn recommend_by_similar_users(
        &self,
        user_id: &str,
        max_results: usize,
    ) -> Result<Vec<Recommendation>> {
        if max_results == 0 || !self.catalog.user_exists(user_id)? {
            return Ok(Vec::new());
        }
        let known = self.catalog.known_items(user_id)?;

        let query = QueryBuilder::new()
            .r#match(("u", labels::USER))
            .keyed("id", user_id)
            .where_edge(rel::LIKES, ("shared", labels::ITEM))
            .incoming()
            .where_edge(rel::LIKES, ("other", labels::USER))
            .where_var("other", |p| {
                p.ne("id", user_id);
            })
            .distinct()
            .select([("other.id", "otherId"), ("shared.id", "itemId")])
            .build()?;
        let mut common: BTreeMap<String, u64> = BTreeMap::new();
        for row in self.gateway.run(&query)? {
            *common.entry(row.str("otherId")?.to_owned()).or_default() += 1;
        }

        let neighbours: BTreeSet<String> = common.keys().cloned().collect();
        let mut board = ScoreBoard::new();
        for (item_id, liked) in self.likes_of(&neighbours)? {
            if known.contains(&item_id) {
                continue;
            }
            let weight: u64 = liked
                .likers
                .iter()
                .filter_map(|other| common.get(other))
                .sum();
            board.add(&item_id, &liked.name, weight);
        }

        let ranked = board.into_ranked(RecommendationKind::Collaborative, max_results);
        info!(
            user_id,
            similar_users = neighbours.len(),
            results = ranked.len(),
            "similar user recommendations produced"
        );
        Ok(ranked)
    }

    fn friends_of(&self, user_id: &str) -> Result<BTreeSet<String>> {
        let query = QueryBuilder::new()
            .r#match(("u", labels::USER))
            .keyed("id", user_id)
            .where_edge(rel::FRIENDS_WITH, ("friend", labels::USER))
            .where_var("friend", |p| {
                p.ne("id", user_id);
            })
            .distinct()
            .select([("friend.id", "friendId")])
            .build()?;
        self.gateway
            .run(&query)?
            .into_iter()
            .map(|row| row.str("friendId").map(str::to_owned))
            .collect()
    }

    fn likes_of(&self, users: &BTreeSet<String>) -> Result<LikesByItem> {
        let mut likes = LikesByItem::new();
        if users.is_empty() {
            return Ok(likes);
        }
        let query = QueryBuilder::new()
            .r#match(("u", labels::USER))
            .where_var("u", |p| {
                p.in_list("id", users.iter());
            })
            .where_edge(rel::LIKES, ("item", labels::ITEM))
            .distinct()
            .select([
                ("u.id", "userId"),
                ("item.id", "itemId"),
                ("item.name", "itemName"),
            ])
            .build()?;
        for row in self.gateway.run(&query)? {
            let item_id = row.str("itemId")?;
            let name = row.opt_str("itemName")?.unwrap_or(item_id);
            let entry = likes.entry(item_id.to_owned()).or_insert_with(|| Liked {
                name: name.to_owned(),
                likers: BTreeSet::new(),
            });
            entry.likers.insert(row.str("userId")?.to_owned());
        }
        Ok(likes)
    }
}
