// handlers/protected/rabbitmq/cluster.rs - Cluster-wide read endpoints

use axum::extract::{Extension, Path, Query, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::{RelayResult, Relayed};
use crate::services::Query as UpstreamQuery;
use crate::types::RequestContext;

/// GET /api/rabbitmq/:cluster/overview
pub async fn overview(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cluster_id): Path<Uuid>,
) -> RelayResult {
    Ok(state.broker.overview(&ctx, cluster_id).await?.into())
}

/// GET /api/rabbitmq/:cluster/nodes
pub async fn nodes(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cluster_id): Path<Uuid>,
) -> RelayResult {
    Ok(state.broker.nodes(&ctx, cluster_id).await?.into())
}

/// GET /api/rabbitmq/:cluster/vhosts
pub async fn vhosts(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cluster_id): Path<Uuid>,
) -> RelayResult {
    Ok(state.broker.vhosts(&ctx, cluster_id).await?.into())
}

/// GET /api/rabbitmq/:cluster/connections - Query string forwarded
pub async fn connections(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cluster_id): Path<Uuid>,
    Query(query): Query<UpstreamQuery>,
) -> RelayResult {
    let response = state.broker.connections(&ctx, cluster_id, query).await?;
    Ok(Relayed(response))
}

/// GET /api/rabbitmq/:cluster/channels - Query string forwarded
pub async fn channels(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cluster_id): Path<Uuid>,
    Query(query): Query<UpstreamQuery>,
) -> RelayResult {
    let response = state.broker.channels(&ctx, cluster_id, query).await?;
    Ok(Relayed(response))
}
