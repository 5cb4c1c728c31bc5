//! HTTP routes for the server.
//!
//! The live-editing client posts edits to `/save` and browses the version
//! history under `/api/versions`.

use crate::{edit::from_values, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use pagedit_snapshot::{SnapshotError, ORIGIN_ID};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::PathBuf, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, Span};

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ===================
        // Global endpoints
        // ===================
        .route("/health", get(health))
        .route("/save", post(save))
        // ===================
        // Version endpoints
        // ===================
        .route("/api/versions", get(versions_list).delete(versions_delete_all))
        .route("/api/versions/baseline", post(versions_baseline))
        .route("/api/versions/reset-origin", post(versions_reset_origin))
        .route("/api/versions/current-diff", get(versions_current_diff))
        .route(
            "/api/versions/{id}",
            get(version_get).patch(version_update).delete(version_delete),
        )
        .route("/api/versions/{id}/restore", post(version_restore))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &Span| {
                    info!(
                        method = %request.method(),
                        path = %request.uri().path(),
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, _span: &Span| {
                        info!(
                            status = %response.status(),
                            latency = ?latency,
                            "response"
                        );
                    },
                ),
        )
}

/// API error response.
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    code: String,
}

impl ApiError {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    fn not_found(msg: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(msg, "NOT_FOUND")))
    }

    fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(msg, "BAD_REQUEST")))
    }

    fn internal(msg: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self::new(msg, "INTERNAL_ERROR")),
        )
    }

    fn snapshot(err: SnapshotError) -> (StatusCode, Json<Self>) {
        error!("Version store error: {}", err);
        Self::internal(err.to_string())
    }
}

fn parse_id(id: &str) -> Result<u64, (StatusCode, Json<ApiError>)> {
    id.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid version id: {}", id)))
}

// =============================================================================
// Global endpoints
// =============================================================================

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "healthy": true,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn save(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let Value::Array(items) = body else {
        return Err(ApiError::bad_request("Expected an array of edits"));
    };

    match state.saver.save(from_values(items)).await {
        Ok(outcome) => Ok(Json(serde_json::json!({
            "success": true,
            "files": outcome.files,
            "version": outcome.version,
        }))),
        Err(e) => {
            error!("Save failed: {}", e);
            Err(ApiError::internal(e.to_string()))
        }
    }
}

// =============================================================================
// Version endpoints
// =============================================================================

#[derive(Debug, Deserialize)]
struct FilesRequest {
    #[serde(default)]
    files: Vec<String>,
}

impl FilesRequest {
    fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(PathBuf::from).collect()
    }
}

#[derive(Debug, Deserialize)]
struct LabelRequest {
    label: String,
}

async fn versions_list(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    state
        .store
        .list_versions()
        .await
        .map(Json)
        .map_err(ApiError::snapshot)
}

async fn versions_delete_all(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    state
        .store
        .delete_all_versions()
        .await
        .map_err(ApiError::snapshot)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn versions_baseline(
    State(state): State<AppState>,
    Json(req): Json<FilesRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    state
        .store
        .create_baseline(&req.paths())
        .await
        .map(Json)
        .map_err(ApiError::snapshot)
}

async fn versions_reset_origin(
    State(state): State<AppState>,
    Json(req): Json<FilesRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    state
        .store
        .reset_origin(&req.paths())
        .await
        .map(Json)
        .map_err(ApiError::snapshot)
}

async fn versions_current_diff(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    state
        .store
        .current_diff()
        .await
        .map(Json)
        .map_err(ApiError::snapshot)
}

async fn version_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let id = parse_id(&id)?;
    match state.store.version_details(id).await {
        Ok(Some(details)) => Ok(Json(details)),
        Ok(None) => Err(ApiError::not_found("Version not found")),
        Err(e) => Err(ApiError::snapshot(e)),
    }
}

async fn version_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LabelRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let id = parse_id(&id)?;
    match state.store.update_label(id, &req.label).await {
        Ok(true) => Ok(Json(serde_json::json!({ "success": true }))),
        Ok(false) => Err(ApiError::not_found("Version not found")),
        Err(e) => Err(ApiError::snapshot(e)),
    }
}

async fn version_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let id = parse_id(&id)?;
    if id == ORIGIN_ID {
        return Err(ApiError::bad_request("Cannot delete the origin version"));
    }
    match state.store.delete_version(id).await {
        Ok(true) => Ok(Json(serde_json::json!({ "success": true }))),
        Ok(false) => Err(ApiError::not_found("Version not found")),
        Err(e) => Err(ApiError::snapshot(e)),
    }
}

async fn version_restore(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let id = parse_id(&id)?;
    match state.store.restore_version(id).await {
        Ok(Some(report)) => Ok(Json(report)),
        Ok(None) => Err(ApiError::not_found("Version not found")),
        Err(e) => Err(ApiError::snapshot(e)),
    }
}
