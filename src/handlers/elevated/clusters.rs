// handlers/elevated/clusters.rs - Cluster connection CRUD

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{ClusterConnection, ClusterConnectionUpdate, NewClusterConnection};
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/clusters - List every stored connection (passwords omitted)
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<ClusterConnection>> {
    let connections = state.cluster_service.list_connections().await?;
    Ok(ApiResponse::success(connections))
}

/// POST /api/clusters - Store a new connection
///
/// Expected Input:
/// ```json
/// {
///   "name": "prod-eu",
///   "api_url": "https://rabbit-eu.internal:15672",
///   "username": "monitoring",
///   "password": "...",
///   "is_active": true,
///   "description": "optional"
/// }
/// ```
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewClusterConnection>,
) -> ApiResult<ClusterConnection> {
    let connection = state.cluster_service.create_connection(input).await?;
    Ok(ApiResponse::created(connection))
}

/// GET /api/clusters/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<ClusterConnection> {
    let connection = state.cluster_service.get_connection(id).await?;
    Ok(ApiResponse::success(connection))
}

/// PUT /api/clusters/:id - Partial update; evicts the pooled client
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ClusterConnectionUpdate>,
) -> ApiResult<ClusterConnection> {
    let connection = state.cluster_service.update_connection(id, update).await?;
    Ok(ApiResponse::success(connection))
}

/// DELETE /api/clusters/:id - Removes assignments and the pooled client too
pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.cluster_service.delete_connection(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/clusters/:id/test - Fetch /api/overview with the stored credential
pub async fn test(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    let overview = state.cluster_service.test_connection(id).await?;
    Ok(ApiResponse::success(overview))
}
