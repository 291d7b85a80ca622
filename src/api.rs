//! REST API server for the destination store
//!
//! Exposes the agent tools and typed destination routes over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::AdvisorError;
use crate::models::{SearchCriteria, DEFAULT_SEARCH_RESULTS};
use crate::search::DestinationSearch;
use crate::tools::{create_destination_registry, ToolRegistry};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_search_results")]
    pub n_results: usize,
}

fn default_search_results() -> usize {
    DEFAULT_SEARCH_RESULTS
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn status_for(err: &AdvisorError) -> StatusCode {
    match err {
        AdvisorError::ToolNotFound(_) => StatusCode::NOT_FOUND,
        AdvisorError::InvalidToolInput(_) => StatusCode::BAD_REQUEST,
        AdvisorError::StoreEmpty | AdvisorError::CollectionNotFound(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AdvisorError::EmbeddingModelMismatch { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: AdvisorError) -> ApiResult {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, "Request failed");
    }
    (status, Json(ApiResponse::error(err.to_string())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub search: Arc<DestinationSearch>,
    pub registry: Arc<ToolRegistry>,
}

impl ApiState {
    pub fn new(search: Arc<DestinationSearch>) -> Self {
        let registry = Arc::new(create_destination_registry(search.clone()));
        Self { search, registry }
    }
}

/// =============================
/// Service Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn service_info(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "collection": state.search.collection_name(),
        "embedding_model": state.search.embedding_model(),
        "tools": state.registry.describe(),
    }))
}

/// =============================
/// Tool Invocation
/// =============================

async fn invoke_tool(
    State(state): State<ApiState>,
    Path(tool_name): Path<String>,
    Json(parameters): Json<serde_json::Value>,
) -> ApiResult {
    info!(tool = %tool_name, "Tool invocation");

    match state.registry.invoke(&tool_name, parameters).await {
        Ok(output) => (StatusCode::OK, Json(ApiResponse::success(output))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Destination Endpoints
/// =============================

async fn search_destinations(
    State(state): State<ApiState>,
    Json(req): Json<SearchRequest>,
) -> ApiResult {
    if req.query.trim().is_empty() {
        return failure(AdvisorError::InvalidToolInput("'query' must not be empty".into()));
    }

    match state.search.search(&req.query, req.n_results).await {
        Ok(destinations) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "query": req.query,
                "destinations": destinations,
            }))),
        ),
        Err(e) => failure(e),
    }
}

async fn destination_by_name(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult {
    match state.search.get_by_name(&name).await {
        Ok(Some(found)) => (StatusCode::OK, Json(ApiResponse::success(found))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "Destination '{}' not found in database",
                name
            ))),
        ),
        Err(e) => failure(e),
    }
}

async fn search_by_criteria(
    State(state): State<ApiState>,
    Json(criteria): Json<SearchCriteria>,
) -> ApiResult {
    match state.search.search_by_criteria(&criteria).await {
        Ok(destinations) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "search_criteria": criteria,
                "destinations": destinations,
            }))),
        ),
        Err(e) => failure(e),
    }
}

async fn database_stats(State(state): State<ApiState>) -> ApiResult {
    match state.search.stats().await {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::success(stats))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(search: Arc<DestinationSearch>) -> Router {
    let state = ApiState::new(search);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(service_info))
        .route("/tools/:tool/invoke", post(invoke_tool))
        .route("/api/destinations/search", post(search_destinations))
        .route("/api/destinations/by-name/:name", get(destination_by_name))
        .route("/api/destinations/criteria", post(search_by_criteria))
        .route("/api/destinations/stats", get(database_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    search: Arc<DestinationSearch>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(search);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
