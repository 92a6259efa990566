// handlers/protected/rabbitmq/queues.rs - /api/rabbitmq/:cluster/queues[/:vhost[/:name]]

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::body_or_empty;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{RelayResult, Relayed};
use crate::services::Query as UpstreamQuery;
use crate::types::RequestContext;

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQueueQuery {
    #[serde(rename = "if-empty", default)]
    pub if_empty: bool,
    #[serde(rename = "if-unused", default)]
    pub if_unused: bool,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub destination: String,
}

/// GET /api/rabbitmq/:cluster/queues
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cluster_id): Path<Uuid>,
    Query(query): Query<UpstreamQuery>,
) -> RelayResult {
    let response = state.broker.list_queues(&ctx, cluster_id, None, query).await?;
    Ok(Relayed(response))
}

/// GET /api/rabbitmq/:cluster/queues/:vhost
pub async fn list_vhost(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost)): Path<(Uuid, String)>,
    Query(query): Query<UpstreamQuery>,
) -> RelayResult {
    let response = state
        .broker
        .list_queues(&ctx, cluster_id, Some(&vhost), query)
        .await?;
    Ok(Relayed(response))
}

/// GET /api/rabbitmq/:cluster/queues/:vhost/:name
pub async fn show(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
) -> RelayResult {
    let response = state.broker.get_queue(&ctx, cluster_id, &vhost, &name).await?;
    Ok(Relayed(response))
}

/// PUT /api/rabbitmq/:cluster/queues/:vhost/:name - Body is the queue
/// definition (`durable`, `auto_delete`, `arguments`)
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
    body: Option<Json<Value>>,
) -> RelayResult {
    let response = state
        .broker
        .create_queue(&ctx, cluster_id, &vhost, &name, body_or_empty(body))
        .await?;
    Ok(Relayed(response))
}

/// DELETE /api/rabbitmq/:cluster/queues/:vhost/:name[?if-empty=true&if-unused=true]
pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
    Query(conditions): Query<DeleteQueueQuery>,
) -> RelayResult {
    let response = state
        .broker
        .delete_queue(&ctx, cluster_id, &vhost, &name, conditions.if_empty, conditions.if_unused)
        .await?;
    Ok(Relayed(response))
}

/// DELETE /api/rabbitmq/:cluster/queues/:vhost/:name/contents - Purge
pub async fn purge(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
) -> RelayResult {
    let response = state.broker.purge_queue(&ctx, cluster_id, &vhost, &name).await?;
    Ok(Relayed(response))
}

/// POST /api/rabbitmq/:cluster/queues/:vhost/:name/get - Body as the
/// management API expects (`count`, `ackmode`, `encoding`)
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
    body: Option<Json<Value>>,
) -> RelayResult {
    let response = state
        .broker
        .get_messages(&ctx, cluster_id, &vhost, &name, body_or_empty(body))
        .await?;
    Ok(Relayed(response))
}

/// POST /api/rabbitmq/:cluster/queues/:vhost/:name/publish
pub async fn publish(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
    body: Option<Json<Value>>,
) -> RelayResult {
    let response = state
        .broker
        .publish_to_queue(&ctx, cluster_id, &vhost, &name, body_or_empty(body))
        .await?;
    Ok(Relayed(response))
}

/// POST /api/rabbitmq/:cluster/queues/:vhost/:name/move - `{"destination": "queue"}`
pub async fn move_messages(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
    Json(request): Json<MoveRequest>,
) -> RelayResult {
    let destination = request.destination.trim();
    if destination.is_empty() {
        return Err(ApiError::bad_request("Destination queue is required"));
    }
    if destination == name {
        return Err(ApiError::bad_request("Destination queue must differ from the source"));
    }

    let response = state
        .broker
        .move_messages(&ctx, cluster_id, &vhost, &name, destination)
        .await?;
    Ok(Relayed(response))
}

/// GET /api/rabbitmq/:cluster/queues/:vhost/:name/bindings
pub async fn bindings(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
) -> RelayResult {
    let response = state.broker.queue_bindings(&ctx, cluster_id, &vhost, &name).await?;
    Ok(Relayed(response))
}
