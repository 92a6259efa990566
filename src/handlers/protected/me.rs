// handlers/protected/me.rs - GET /api/me/clusters handler

use axum::extract::{Extension, State};

use crate::app::AppState;
use crate::database::models::ClusterConnection;
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Principal;

/// Active clusters the caller may dispatch to (every active cluster for
/// administrators)
pub async fn clusters(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<ClusterConnection>> {
    let connections = state.cluster_service.accessible_clusters(&principal).await?;
    Ok(ApiResponse::success(connections))
}
