#![allow(dead_code)]

use gamegraph::config::RecommenderSection;
use gamegraph::{Dataset, Item, MemoryGraph, Recommendation, RecommendationService, UserRecord};

pub fn item(id: &str, name: &str, genres: &[&str], platforms: &[&str]) -> Item {
    let mut item = Item::new(id, name);
    item.genres = genres.iter().map(|g| g.to_string()).collect();
    item.platforms = platforms.iter().map(|p| p.to_string()).collect();
    item
}

pub fn user(id: &str, likes: &[&str], played: &[&str], friends: &[&str]) -> UserRecord {
    let mut user = UserRecord::new(id);
    user.likes = likes.iter().map(|s| s.to_string()).collect();
    user.played = played.iter().map(|s| s.to_string()).collect();
    user.friends = friends.iter().map(|s| s.to_string()).collect();
    user
}

/// a: {RPG, Action} on {PC}; b: {RPG} on {PC}; c: {RPG}; z shares nothing.
pub fn similarity_dataset() -> Dataset {
    let mut alpha = item("a", "Alpha", &["RPG", "Action"], &["PC"]);
    alpha.developers.insert("Northwind".to_string());
    Dataset {
        items: vec![
            alpha,
            item("b", "Beta", &["RPG"], &["PC"]),
            item("c", "Gamma", &["RPG"], &[]),
            item("z", "Zeta", &["Puzzle"], &["Switch"]),
        ],
        users: Vec::new(),
    }
}

/// User `u` likes only `a` (RPG on PC). `d` is RPG on Xbox, `e` is RPG on
/// PC, `f` is Puzzle on PC and `g` shares nothing. `v` has only played `a`.
pub fn preference_dataset() -> Dataset {
    Dataset {
        items: vec![
            item("a", "Alpha", &["RPG"], &["PC"]),
            item("d", "Delta", &["RPG"], &["Xbox"]),
            item("e", "Echo", &["RPG"], &["PC"]),
            item("f", "Foxtrot", &["Puzzle"], &["PC"]),
            item("g", "Golf", &["Strategy"], &["Switch"]),
        ],
        users: vec![user("u", &["a"], &[], &[]), user("v", &[], &["a"], &[])],
    }
}

/// `u` befriends f1 and f2; f1 befriends f3; f2 befriends u and f4.
/// `p` likes a and b and has played c.
pub fn social_dataset() -> Dataset {
    Dataset {
        items: vec![
            item("a", "Alpha", &[], &[]),
            item("b", "Beta", &[], &[]),
            item("c", "Gamma", &[], &[]),
            item("d", "Delta", &[], &[]),
            item("e", "Echo", &[], &[]),
        ],
        users: vec![
            user("u", &["a"], &[], &["f1", "f2"]),
            user("f1", &["a", "b", "c", "d"], &[], &["f3"]),
            user("f2", &["b"], &[], &["u", "f4"]),
            user("f3", &["d", "e"], &[], &[]),
            user("f4", &["d"], &[], &[]),
            user("p", &["a", "b"], &["c"], &[]),
            user("s", &["a", "e"], &[], &[]),
            user("loner", &[], &[], &[]),
        ],
    }
}

pub fn graph(dataset: &Dataset) -> MemoryGraph {
    dataset.into_graph().expect("dataset loads")
}

pub fn service(dataset: &Dataset) -> RecommendationService {
    RecommendationService::from_dataset(dataset, RecommenderSection::default())
        .expect("service builds")
}

pub fn scored(recs: &[Recommendation]) -> Vec<(&str, u64)> {
    recs.iter()
        .map(|rec| (rec.item_id.as_str(), rec.score))
        .collect()
}
