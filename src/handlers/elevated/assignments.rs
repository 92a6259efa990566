// handlers/elevated/assignments.rs - User/cluster assignment management

use axum::extract::{Path, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/clusters/:id/users
pub async fn list(State(state): State<AppState>, Path(cluster_id): Path<Uuid>) -> ApiResult<Vec<User>> {
    let users = state.cluster_service.assigned_users(cluster_id).await?;
    Ok(ApiResponse::success(users))
}

/// PUT /api/clusters/:id/users/:user_id - Idempotent
pub async fn assign(
    State(state): State<AppState>,
    Path((cluster_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    state.cluster_service.assign_user(cluster_id, user_id).await?;
    Ok(ApiResponse::no_content())
}

/// DELETE /api/clusters/:id/users/:user_id
pub async fn unassign(
    State(state): State<AppState>,
    Path((cluster_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    state.cluster_service.unassign_user(cluster_id, user_id).await?;
    Ok(ApiResponse::no_content())
}
