use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kaamconnect_matcher::{
    skills::SkillSuggestion, store::TagCount, Coordinates, DistanceUnit, Job, JobId, MatcherConfig, MatchingEngine,
    MatchingError, RankingOutcome, Recommendation, SimilarJob, WorkerId,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<MatchingEngine>,
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct NearbyParams {
    lat: f64,
    lon: f64,
    /// In `unit`
    radius: Option<f64>,
    limit: Option<usize>,
    #[serde(default)]
    unit: DistanceUnit,
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct NearbyResult {
    job: Job,
    distance: f64,
}

#[derive(Debug, Serialize)]
struct NearbyResponse {
    unit: &'static str,
    results: Vec<NearbyResult>,
}

#[derive(Debug, Serialize)]
struct RetrainResponse {
    jobs: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    ranker: String,
}

/// Ranked results plus the degradation flag, so clients can tell
/// "nothing relevant" from "ranking failed"
#[derive(Debug, Serialize)]
struct RankedResponse<T> {
    results: Vec<T>,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl<T> From<RankingOutcome<T>> for RankedResponse<T> {
    fn from(outcome: RankingOutcome<T>) -> Self {
        let reason = outcome.reason().map(str::to_string);
        Self {
            degraded: reason.is_some(),
            reason,
            results: outcome.into_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matcher_server=debug,kaamconnect_matcher=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MatcherConfig::from_env()?;

    tracing::info!("🚀 Starting KaamConnect Matcher Server");
    tracing::info!("📦 Database: {}", config.database_path);
    tracing::info!("🔌 Port: {}", config.server.port);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let engine = MatchingEngine::from_config(config).await?;

    match engine.retrain_ranker().await {
        Ok(jobs) => tracing::info!("🧠 Ranker trained on {} open jobs", jobs),
        Err(e) => tracing::warn!("Ranker not trained at startup, first request will train: {}", e),
    }

    let state = AppState {
        engine: Arc::new(engine),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/workers/:id/recommendations", get(recommendations_handler))
        .route("/v1/workers/:id/skills/suggest", get(suggest_skills_handler))
        .route("/v1/jobs/:id/similar", get(similar_handler))
        .route("/v1/jobs/nearby", get(nearby_handler))
        .route("/v1/skills/top", get(top_skills_handler))
        .route("/v1/ranker/retrain", post(retrain_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("🧰 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: kaamconnect_matcher::VERSION.to_string(),
        ranker: state.engine.ranker_name().to_string(),
    })
}

async fn recommendations_handler(
    State(state): State<AppState>,
    Path(worker_id): Path<i64>,
    Query(params): Query<LimitParams>,
) -> Result<Json<RankedResponse<Recommendation>>, AppError> {
    let limit = params.limit.unwrap_or(state.engine.config().ranking.default_top_n);
    let outcome = state
        .engine
        .get_job_recommendations(WorkerId(worker_id), limit)
        .await?;

    tracing::info!(
        "✅ worker {} → {} recommendations{}",
        worker_id,
        outcome.len(),
        if outcome.is_degraded() { " (degraded)" } else { "" }
    );

    Ok(Json(outcome.into()))
}

async fn similar_handler(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Query(params): Query<LimitParams>,
) -> Result<Json<RankedResponse<SimilarJob>>, AppError> {
    let limit = params.limit.unwrap_or(state.engine.config().ranking.similar_limit);
    let outcome = state.engine.get_similar_jobs(JobId(job_id), limit).await?;
    Ok(Json(outcome.into()))
}

async fn nearby_handler(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<NearbyResponse>, AppError> {
    let defaults = &state.engine.config().location;
    let center = Coordinates::new(params.lat, params.lon)?;
    let radius_km = params
        .radius
        .map(|r| params.unit.to_km(r))
        .unwrap_or(defaults.default_radius_km);
    let limit = params.limit.unwrap_or(defaults.default_limit);

    let nearby = state.engine.nearby_jobs(center, radius_km, limit).await?;
    let results = nearby
        .into_iter()
        .map(|n| NearbyResult {
            distance: n.distance_in(params.unit),
            job: n.job,
        })
        .collect();

    Ok(Json(NearbyResponse {
        unit: params.unit.abbreviation(),
        results,
    }))
}

async fn retrain_handler(State(state): State<AppState>) -> Result<Json<RetrainResponse>, AppError> {
    let jobs = state.engine.retrain_ranker().await?;
    tracing::info!("🧠 Ranker retrained on {} open jobs", jobs);
    Ok(Json(RetrainResponse { jobs }))
}

async fn top_skills_handler(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<TagCount>>, AppError> {
    let limit = params.limit.unwrap_or(state.engine.config().skills.top_limit);
    Ok(Json(state.engine.top_skills(limit).await?))
}

async fn suggest_skills_handler(
    State(state): State<AppState>,
    Path(worker_id): Path<i64>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<Vec<SkillSuggestion>>, AppError> {
    Ok(Json(state.engine.suggest_skills(WorkerId(worker_id), &params.q).await?))
}

// Error handling
struct AppError(MatchingError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MatchingError::JobNotFound(_) | MatchingError::SkillNotFound(_) => StatusCode::NOT_FOUND,
            MatchingError::InvalidInput(_) | MatchingError::SkillExists(_) => StatusCode::BAD_REQUEST,
            MatchingError::Geocoder(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.0.to_string();

        tracing::error!("❌ Error: {} - {}", status, message);

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<MatchingError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
