mod common;

use std::sync::Arc;

use common::{graph, preference_dataset, scored};
use gamegraph::model::PropertyValue;
use gamegraph::recommend::{score, UserPreferences};
use gamegraph::{
    CategoryIndex, GraphGateway, IndexHandle, PreferenceRecommender, RecommendationKind,
    ScoreWeights,
};

fn recommender() -> PreferenceRecommender {
    PreferenceRecommender::build(
        GraphGateway::new(graph(&preference_dataset())),
        ScoreWeights::default(),
    )
    .unwrap()
}

fn set(values: &[&str]) -> std::collections::BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn preferences_come_from_liked_items() {
    let prefs = recommender().preferences("u").unwrap().unwrap();
    assert_eq!(
        prefs,
        UserPreferences {
            genres: set(&["RPG"]),
            platforms: set(&["PC"]),
            known_items: set(&["a"]),
        }
    );
    assert!(recommender().preferences("nobody").unwrap().is_none());
}

#[test]
fn genre_matches_outweigh_platform_matches() {
    let gateway = GraphGateway::new(graph(&preference_dataset()));
    let index = CategoryIndex::build(&gateway).unwrap();
    let prefs = recommender().preferences("u").unwrap().unwrap();
    let weights = ScoreWeights::default();
    assert_eq!(score(&index, &prefs, weights, "d"), 2);
    assert_eq!(score(&index, &prefs, weights, "e"), 3);
    assert_eq!(score(&index, &prefs, weights, "f"), 1);
    assert_eq!(score(&index, &prefs, weights, "g"), 0);
}

#[test]
fn active_filters_are_conjoined() {
    let recs = recommender().recommend_by_user("u", 10).unwrap();
    assert_eq!(scored(&recs), vec![("e", 3)]);
    assert_eq!(recs[0].item_name, "Echo");
    assert_eq!(recs[0].kind, RecommendationKind::Personal);
}

#[test]
fn known_items_are_never_recommended() {
    let recommender = recommender();
    for user in ["u", "v"] {
        let known = recommender.preferences(user).unwrap().unwrap().known_items;
        let recs = recommender.recommend_by_user(user, 10).unwrap();
        assert!(recs.iter().all(|rec| !known.contains(&rec.item_id)), "{user}");
    }
}

#[test]
fn no_preferences_means_every_unknown_item_at_zero() {
    let recs = recommender().recommend_by_user("v", 10).unwrap();
    assert_eq!(
        scored(&recs),
        vec![("d", 0), ("e", 0), ("f", 0), ("g", 0)]
    );
}

#[test]
fn unknown_users_and_zero_limits_are_empty() {
    let recommender = recommender();
    assert!(recommender.recommend_by_user("nobody", 10).unwrap().is_empty());
    assert!(recommender.recommend_by_user("u", 0).unwrap().is_empty());
    assert_eq!(recommender.recommend_by_user("v", 2).unwrap().len(), 2);
}

#[test]
fn platform_only_preferences_compose() {
    let graph = graph(&preference_dataset());
    let w = graph.add_node(["User"], [("id", PropertyValue::from("w"))]);
    let kiosk = graph.add_node(
        ["Item"],
        [
            ("id", PropertyValue::from("k")),
            ("name", PropertyValue::from("Kiosk")),
        ],
    );
    let pc = graph.find_node("Platform", "name", "PC").unwrap();
    graph.add_edge(kiosk, pc, "AVAILABLE_ON").unwrap();
    graph.add_edge(w, kiosk, "LIKES").unwrap();

    let recommender =
        PreferenceRecommender::build(GraphGateway::new(graph), ScoreWeights::default()).unwrap();
    let recs = recommender.recommend_by_user("w", 10).unwrap();
    assert_eq!(scored(&recs), vec![("a", 1), ("e", 1), ("f", 1)]);
}

#[test]
fn scores_use_the_snapshot_not_the_live_graph() {
    let graph = graph(&preference_dataset());
    let gateway = GraphGateway::new(graph.clone());
    let handle = Arc::new(IndexHandle::new(CategoryIndex::build(&gateway).unwrap()));
    let recommender =
        PreferenceRecommender::new(gateway.clone(), Arc::clone(&handle), ScoreWeights::default());

    let e = graph.find_node("Item", "id", "e").unwrap();
    let action = graph.merge_node("Genre", "name", "Action");
    let a = graph.find_node("Item", "id", "a").unwrap();
    graph.add_edge(a, action, "BELONGS_TO_GENRE").unwrap();
    graph.add_edge(e, action, "BELONGS_TO_GENRE").unwrap();

    assert_eq!(
        scored(&recommender.recommend_by_user("u", 10).unwrap()),
        vec![("e", 3)]
    );

    handle.rebuild(&gateway).unwrap();
    assert_eq!(
        scored(&recommender.recommend_by_user("u", 10).unwrap()),
        vec![("e", 5)]
    );
}

#[test]
fn gateway_failures_propagate() {
    let graph = graph(&preference_dataset());
    let recommender =
        PreferenceRecommender::build(GraphGateway::new(graph.clone()), ScoreWeights::default())
            .unwrap();
    graph.fail_next_query(1);
    let err = recommender.recommend_by_user("u", 10).unwrap_err();
    assert!(err.is_gateway_failure());
    assert_eq!(graph.open_sessions(), 0);
}
