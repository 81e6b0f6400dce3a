//! The admin HTTP surface.
//!
//! Declares and dismantles canaries and exposes the Envoy state of each
//! node for inspection. Errors map onto HTTP status codes through the
//! shared taxonomy.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;

use kage_core::{names, Error};
use kage_kube::{CanaryRequest, CanaryService};
use kage_xds::{EnvoyState, SnapshotClient};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Canary lifecycle operations.
    pub canaries: CanaryService,
    /// Read access to installed Envoy states.
    pub snapshots: Arc<SnapshotClient>,
}

/// Build the admin router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/canary/:namespace", post(declare_canary).get(list_canaries))
        .route("/api/canary/:namespace/:name", delete(dismantle_canary))
        .route("/api/admin/stats", get(cache_stats))
        .route("/api/admin/:namespace/:name", get(canary_state))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn declare_canary(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(request): Json<CanaryRequest>,
) -> Result<Response, ApiError> {
    let summary = state.canaries.declare(&namespace, &request).await?;
    Ok((StatusCode::CREATED, Json(summary)).into_response())
}

async fn dismantle_canary(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let target = target_of(&name);
    state.canaries.dismantle(&namespace, target).await?;
    Ok(Json(json!({ "deleted": names::canary_name(target) })).into_response())
}

async fn list_canaries(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Json<Vec<EnvoyState>> {
    let prefix = names::node_id(&namespace, "");
    let nodes = state
        .snapshots
        .list()
        .await
        .into_iter()
        .filter(|s| s.node_id.starts_with(&prefix))
        .collect();
    Json(nodes)
}

/// The Envoy state of one canary, rendered as JSON of the control
/// plane's own state model. The protobuf resources Envoy actually
/// receives are derived from this record by the snapshot factory.
async fn canary_state(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<EnvoyState>, ApiError> {
    let envoy_state = state.canaries.state(&namespace, target_of(&name)).await?;
    Ok(Json(envoy_state))
}

async fn cache_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.snapshots.cache().stats();
    Json(json!({
        "snapshots_set": stats.snapshots_set(),
        "snapshot_hits": stats.snapshot_hits(),
        "snapshot_misses": stats.snapshot_misses(),
        "snapshots_cleared": stats.snapshots_cleared(),
        "hit_rate": stats.hit_rate(),
    }))
}

/// Accept either the target name or its canary clone's name.
fn target_of(name: &str) -> &str {
    names::canary_target(name).unwrap_or(name)
}

/// Newtype carrying the shared error taxonomy out as an HTTP response.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self.0, "admin request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_accepts_both_names() {
        assert_eq!(target_of("nginx"), "nginx");
        assert_eq!(target_of("nginx-kage"), "nginx");
    }

    #[test]
    fn test_error_statuses() {
        let resp = ApiError(Error::NotFound("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError(Error::invalid("x")).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError(Error::Timeout("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);

        let resp = ApiError(Error::internal("x")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
