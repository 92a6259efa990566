// handlers/protected/rabbitmq/bindings.rs - /api/rabbitmq/:cluster/bindings[/:vhost[/e/...]]

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use super::body_or_empty;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{RelayResult, Relayed};
use crate::proxy::DestinationType;
use crate::services::Query as UpstreamQuery;
use crate::types::RequestContext;

fn destination_type(code: &str) -> Result<DestinationType, ApiError> {
    DestinationType::from_path_code(code)
        .ok_or_else(|| ApiError::bad_request(format!("Destination type must be 'q' or 'e', got '{}'", code)))
}

/// GET /api/rabbitmq/:cluster/bindings
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cluster_id): Path<Uuid>,
    Query(query): Query<UpstreamQuery>,
) -> RelayResult {
    let response = state.broker.list_bindings(&ctx, cluster_id, None, query).await?;
    Ok(Relayed(response))
}

/// GET /api/rabbitmq/:cluster/bindings/:vhost
pub async fn list_vhost(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost)): Path<(Uuid, String)>,
    Query(query): Query<UpstreamQuery>,
) -> RelayResult {
    let response = state
        .broker
        .list_bindings(&ctx, cluster_id, Some(&vhost), query)
        .await?;
    Ok(Relayed(response))
}

/// POST /api/rabbitmq/:cluster/bindings/:vhost/e/:source/:dest_type/:dest
///
/// `dest_type` is `q` (queue) or `e` (exchange); body carries
/// `routing_key` and `arguments`.
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, source, dest_type, destination)): Path<(Uuid, String, String, String, String)>,
    body: Option<Json<Value>>,
) -> RelayResult {
    let dest_type = destination_type(&dest_type)?;
    let response = state
        .broker
        .create_binding(&ctx, cluster_id, &vhost, &source, dest_type, &destination, body_or_empty(body))
        .await?;
    Ok(Relayed(response))
}

/// DELETE /api/rabbitmq/:cluster/bindings/:vhost/e/:source/:dest_type/:dest/:props
pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, source, dest_type, destination, props)): Path<(
        Uuid,
        String,
        String,
        String,
        String,
        String,
    )>,
) -> RelayResult {
    let dest_type = destination_type(&dest_type)?;
    let response = state
        .broker
        .delete_binding(&ctx, cluster_id, &vhost, &source, dest_type, &destination, &props)
        .await?;
    Ok(Relayed(response))
}
