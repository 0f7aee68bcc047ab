//! Game recommendations over a property graph.
//!
//! Items (games) link to genre, platform and developer nodes; users link to
//! items through `LIKES` and `PLAYED` and to each other through
//! `FRIENDS_WITH`. Recommenders query the graph through a [`GraphGateway`]
//! and rank candidates by integer score, ties broken on item id.
//!
//! ```no_run
//! use gamegraph::{Dataset, RecommendationService, config::RecommenderSection};
//!
//! # fn main() -> gamegraph::Result<()> {
//! let dataset = Dataset::load("games.json".as_ref())?;
//! let service = RecommendationService::from_dataset(&dataset, RecommenderSection::default())?;
//! for rec in service.recommend_by_item("witcher-3", 5)? {
//!     println!("{} {}", rec.item_name, rec.score);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gateway;
pub mod health;
pub mod index;
pub mod model;
pub mod query;
pub mod recommend;
pub mod server;
pub mod service;
pub mod telemetry;

pub use dataset::{Dataset, LoadSummary, UserRecord};
pub use error::{GatewayError, GraphError, Result};
pub use gateway::{GraphGateway, GraphSession, MemoryGraph, QueryResult, Record, SessionSource};
pub use index::{CategoryIndex, CategoryKind, IndexHandle, IndexStats};
pub use model::Item;
pub use recommend::{
    CollaborativeRecommender, ItemCatalog, ItemSimilarityRecommender, ItemSummary,
    PreferenceRecommender, Recommendation, RecommendationKind, ScoreWeights,
};
pub use service::RecommendationService;
