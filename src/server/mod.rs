#![forbid(unsafe_code)]

//! JSON-over-HTTP surface for the recommenders.
//!
//! | Method | Path                              | Body / query                          |
//! |--------|-----------------------------------|---------------------------------------|
//! | POST   | `/api/recommend/by-game`          | `{gameId, maxRecommendations?}`       |
//! | POST   | `/api/recommend/by-preferences`   | `{userId, maxRecommendations?}`       |
//! | POST   | `/api/recommend/by-friends`       | `{userId, maxRecommendations?}`       |
//! | POST   | `/api/recommend/by-similar-users` | `{userId, maxRecommendations?}`       |
//! | GET    | `/api/games/search`               | `?q=`                                 |
//! | GET    | `/api/games/:id`                  |                                       |
//! | GET    | `/api/health`                     |                                       |
//! | GET    | `/api/index`                      |                                       |
//! | POST   | `/api/index/rebuild`              |                                       |
//!
//! Successful responses carry `"success": true`; failures carry
//! `{"success": false, "error": "..."}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{net::TcpListener, task};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::GraphError;
use crate::health::HealthReport;
use crate::index::IndexStats;
use crate::model::Item;
use crate::recommend::{ItemSummary, Recommendation};
use crate::service::RecommendationService;
use crate::telemetry::install_tracing_subscriber;

/// Listener settings.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Address to bind.
    pub addr: SocketAddr,
    /// Allowed CORS origins; `*` allows any origin, empty disables CORS.
    pub allow_origins: Vec<String>,
}

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or serving on the socket failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

type AppState = Arc<RecommendationService>;

/// Serves `service` until Ctrl-C.
pub async fn serve(service: RecommendationService, options: ServerOptions) -> Result<(), ServerError> {
    install_tracing_subscriber("info");

    let app = build_router(service, &options.allow_origins);
    let listener = TcpListener::bind(options.addr).await?;
    tracing::info!(
        addr = %options.addr,
        allow_origins = ?options.allow_origins,
        "recommendation server listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Router with every endpoint, CORS and request tracing.
pub fn build_router(service: RecommendationService, allow_origins: &[String]) -> Router {
    let state: AppState = Arc::new(service);
    let mut router = Router::new()
        .route("/api/recommend/by-game", post(by_game_handler))
        .route("/api/recommend/by-preferences", post(by_preferences_handler))
        .route("/api/recommend/by-friends", post(by_friends_handler))
        .route("/api/recommend/by-similar-users", post(by_similar_users_handler))
        .route("/api/games/search", get(search_handler))
        .route("/api/games/:id", get(game_handler))
        .route("/api/health", get(health_handler))
        .route("/api/index", get(index_handler))
        .route("/api/index/rebuild", post(rebuild_handler))
        .fallback(not_found_handler);

    if let Some(layer) = build_cors_layer(allow_origins) {
        router = router.layer(layer);
    }

    router.with_state(state).layer(TraceLayer::new_for_http())
}

fn build_cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE]);
    if origins.iter().any(|origin| origin.trim() == "*") {
        return Some(base.allow_origin(Any));
    }

    let mut allowed = Vec::new();
    for origin in origins {
        let normalized = normalize_origin(origin);
        match normalized
            .as_deref()
            .and_then(|value| HeaderValue::from_str(value).ok())
        {
            Some(value) => allowed.push(value),
            None => {
                tracing::warn!(%origin, ?normalized, "ignoring invalid CORS origin");
            }
        }
    }

    if allowed.is_empty() {
        return None;
    }
    Some(base.allow_origin(AllowOrigin::list(allowed)))
}

fn normalize_origin(origin: &str) -> Option<String> {
    let trimmed = origin.trim().trim_end_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameRequest {
    #[serde(default)]
    game_id: Option<String>,
    #[serde(default)]
    max_recommendations: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    max_recommendations: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecommendationsResponse {
    success: bool,
    recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    success: bool,
    games: Vec<ItemSummary>,
}

#[derive(Debug, Serialize)]
struct GameResponse {
    success: bool,
    game: Item,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    success: bool,
    #[serde(flatten)]
    report: HealthReport,
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    success: bool,
    index: IndexStats,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    success: bool,
    error: String,
}

#[derive(Clone, Copy, Debug)]
enum UserRoute {
    Preferences,
    Friends,
    SimilarUsers,
}

async fn by_game_handler(
    State(state): State<AppState>,
    payload: Result<Json<GameRequest>, JsonRejection>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    let Json(request) = payload?;
    let game_id = required(request.game_id, "gameId")?;
    let max_results = state.max_results(request.max_recommendations.map(clamp_max));
    let recommendations =
        run_blocking(state, move |service| service.recommend_by_item(&game_id, max_results))
            .await?;
    Ok(recommendations_response(recommendations))
}

async fn by_preferences_handler(
    state: State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    by_user(state, payload, UserRoute::Preferences).await
}

async fn by_friends_handler(
    state: State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    by_user(state, payload, UserRoute::Friends).await
}

async fn by_similar_users_handler(
    state: State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    by_user(state, payload, UserRoute::SimilarUsers).await
}

async fn by_user(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
    route: UserRoute,
) -> Result<Json<RecommendationsResponse>, AppError> {
    let Json(request) = payload?;
    let user_id = required(request.user_id, "userId")?;
    let max_results = state.max_results(request.max_recommendations.map(clamp_max));
    let recommendations = run_blocking(state, move |service| match route {
        UserRoute::Preferences => service.recommend_by_user(&user_id, max_results),
        UserRoute::Friends => service.recommend_by_friends(&user_id, max_results),
        UserRoute::SimilarUsers => service.recommend_by_similar_users(&user_id, max_results),
    })
    .await?;
    Ok(recommendations_response(recommendations))
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let needle = params.q.unwrap_or_default();
    if needle.trim().is_empty() {
        return Err(AppError::BadRequest("query parameter q is required".into()));
    }
    let games = run_blocking(state, move |service| service.search(&needle)).await?;
    Ok(Json(SearchResponse {
        success: true,
        games,
    }))
}

async fn game_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GameResponse>, AppError> {
    let lookup = id.clone();
    match run_blocking(state, move |service| service.fetch_item(&lookup)).await? {
        Some(game) => Ok(Json(GameResponse {
            success: true,
            game,
        })),
        None => Err(AppError::NotFound(format!("game '{id}' not found"))),
    }
}

async fn health_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let report = task::spawn_blocking(move || state.health()).await?;
    let status = if report.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        success: report.is_serving(),
        report,
    };
    Ok((status, Json(body)).into_response())
}

async fn index_handler(State(state): State<AppState>) -> Json<IndexResponse> {
    Json(IndexResponse {
        success: true,
        index: state.index_stats(),
    })
}

async fn rebuild_handler(State(state): State<AppState>) -> Result<Json<IndexResponse>, AppError> {
    let index = run_blocking(state, |service| service.rebuild_index()).await?;
    Ok(Json(IndexResponse {
        success: true,
        index,
    }))
}

async fn not_found_handler() -> AppError {
    AppError::NotFound("endpoint not found".into())
}

fn recommendations_response(recommendations: Vec<Recommendation>) -> Json<RecommendationsResponse> {
    Json(RecommendationsResponse {
        success: true,
        recommendations,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{field} is required")))
}

fn clamp_max(requested: i64) -> usize {
    usize::try_from(requested.max(0)).unwrap_or(usize::MAX)
}

async fn run_blocking<T, F>(state: AppState, work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&RecommendationService) -> crate::error::Result<T> + Send + 'static,
{
    Ok(task::spawn_blocking(move || work(state.as_ref())).await??)
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid JSON body: {0}")]
    Body(#[from] JsonRejection),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("internal task failure: {0}")]
    Join(#[from] task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) | AppError::Body(_) => StatusCode::BAD_REQUEST,
            AppError::Graph(GraphError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Graph(_) | AppError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ErrorPayload {
            success: false,
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => tracing::error!(?err, "failed to listen for shutdown signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_limits_clamp_to_zero() {
        assert_eq!(clamp_max(-5), 0);
        assert_eq!(clamp_max(7), 7);
    }

    #[test]
    fn cors_accepts_wildcards_and_skips_garbage() {
        assert!(build_cors_layer(&[]).is_none());
        assert!(build_cors_layer(&["*".to_string()]).is_some());
        assert!(build_cors_layer(&["  ".to_string()]).is_none());
        assert_eq!(
            normalize_origin("https://games.example/"),
            Some("https://games.example".to_string())
        );
    }

    #[test]
    fn required_fields_are_trimmed() {
        assert_eq!(required(Some(" a ".into()), "gameId").expect("value"), "a");
        assert!(matches!(
            required(Some("  ".into()), "gameId"),
            Err(AppError::BadRequest(msg)) if msg == "gameId is required"
        ));
    }
}
