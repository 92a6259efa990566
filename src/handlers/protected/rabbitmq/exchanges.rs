// handlers/protected/rabbitmq/exchanges.rs - /api/rabbitmq/:cluster/exchanges[/:vhost[/:name]]

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::body_or_empty;
use crate::app::AppState;
use crate::middleware::{RelayResult, Relayed};
use crate::services::Query as UpstreamQuery;
use crate::types::RequestContext;

#[derive(Debug, Default, Deserialize)]
pub struct DeleteExchangeQuery {
    #[serde(rename = "if-unused", default)]
    pub if_unused: bool,
}

/// GET /api/rabbitmq/:cluster/exchanges
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cluster_id): Path<Uuid>,
    Query(query): Query<UpstreamQuery>,
) -> RelayResult {
    let response = state.broker.list_exchanges(&ctx, cluster_id, None, query).await?;
    Ok(Relayed(response))
}

/// GET /api/rabbitmq/:cluster/exchanges/:vhost
pub async fn list_vhost(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost)): Path<(Uuid, String)>,
    Query(query): Query<UpstreamQuery>,
) -> RelayResult {
    let response = state
        .broker
        .list_exchanges(&ctx, cluster_id, Some(&vhost), query)
        .await?;
    Ok(Relayed(response))
}

/// GET /api/rabbitmq/:cluster/exchanges/:vhost/:name
pub async fn show(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
) -> RelayResult {
    let response = state.broker.get_exchange(&ctx, cluster_id, &vhost, &name).await?;
    Ok(Relayed(response))
}

/// PUT /api/rabbitmq/:cluster/exchanges/:vhost/:name - Body is the exchange
/// definition (`type`, `durable`, `auto_delete`, `internal`, `arguments`)
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
    body: Option<Json<Value>>,
) -> RelayResult {
    let response = state
        .broker
        .create_exchange(&ctx, cluster_id, &vhost, &name, body_or_empty(body))
        .await?;
    Ok(Relayed(response))
}

/// DELETE /api/rabbitmq/:cluster/exchanges/:vhost/:name[?if-unused=true]
pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
    Query(conditions): Query<DeleteExchangeQuery>,
) -> RelayResult {
    let response = state
        .broker
        .delete_exchange(&ctx, cluster_id, &vhost, &name, conditions.if_unused)
        .await?;
    Ok(Relayed(response))
}

/// POST /api/rabbitmq/:cluster/exchanges/:vhost/:name/publish - Body as the
/// management API expects (`routing_key`, `payload`, `payload_encoding`,
/// `properties`)
pub async fn publish(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
    body: Option<Json<Value>>,
) -> RelayResult {
    let response = state
        .broker
        .publish_to_exchange(&ctx, cluster_id, &vhost, &name, body_or_empty(body))
        .await?;
    Ok(Relayed(response))
}

/// GET /api/rabbitmq/:cluster/exchanges/:vhost/:name/bindings/source
pub async fn source_bindings(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((cluster_id, vhost, name)): Path<(Uuid, String, String)>,
) -> RelayResult {
    let response = state
        .broker
        .exchange_source_bindings(&ctx, cluster_id, &vhost, &name)
        .await?;
    Ok(Relayed(response))
}
