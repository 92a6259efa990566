use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{AuditMark, AuditRecorder, AuditTarget, ResourceDescriptor};
use crate::database::models::OperationType;
use crate::proxy::{rabbitmq, DenyReason, DestinationType, Dispatcher, Operation, ProxyError, UpstreamResponse};
use crate::types::{Principal, RequestContext};

/// Query string pairs forwarded to list endpoints unchanged
pub type Query = Vec<(String, String)>;

/// Typed RabbitMQ operations on top of the dispatcher. Reads go straight
/// through; every write is wrapped by the audit recorder.
pub struct BrokerService {
    dispatcher: Arc<Dispatcher>,
    recorder: Arc<AuditRecorder>,
}

fn require_principal(ctx: &RequestContext, cluster_id: Uuid) -> Result<&Principal, ProxyError> {
    ctx.principal.as_ref().ok_or(ProxyError::AccessDenied {
        cluster_id,
        reason: DenyReason::Unauthenticated,
    })
}

impl BrokerService {
    pub fn new(dispatcher: Arc<Dispatcher>, recorder: Arc<AuditRecorder>) -> Self {
        Self { dispatcher, recorder }
    }

    /// Unaudited pass-through call
    pub async fn read(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        op: Operation,
    ) -> Result<UpstreamResponse, ProxyError> {
        let principal = require_principal(ctx, cluster_id)?;
        self.dispatcher.dispatch(principal, cluster_id, &op).await
    }

    async fn write(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        mark: AuditMark,
        resource: ResourceDescriptor,
        op: Operation,
    ) -> Result<UpstreamResponse, ProxyError> {
        let principal = require_principal(ctx, cluster_id)?;

        let mut target = AuditTarget::new(cluster_id, resource);
        if let Some(body) = &op.body {
            target = target.with_params(body.clone());
        } else if !op.query.is_empty() {
            let params: serde_json::Map<String, Value> = op
                .query
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            target = target.with_params(Value::Object(params));
        }

        self.recorder
            .record(ctx, mark, target, self.dispatcher.dispatch(principal, cluster_id, &op))
            .await
    }

    // Cluster-wide reads

    pub async fn overview(&self, ctx: &RequestContext, cluster_id: Uuid) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::overview()).await
    }

    pub async fn nodes(&self, ctx: &RequestContext, cluster_id: Uuid) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::nodes()).await
    }

    pub async fn vhosts(&self, ctx: &RequestContext, cluster_id: Uuid) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::vhosts()).await
    }

    pub async fn connections(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        query: Query,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::connections().with_query(query)).await
    }

    pub async fn channels(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        query: Query,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::channels().with_query(query)).await
    }

    // Queues

    pub async fn list_queues(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: Option<&str>,
        query: Query,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::queues(vhost).with_query(query)).await
    }

    pub async fn get_queue(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::queue(vhost, name)).await
    }

    pub async fn queue_bindings(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::queue_bindings(vhost, name)).await
    }

    /// Peek at messages (POST upstream, not audited)
    pub async fn get_messages(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
        request: Value,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::get_messages(vhost, name, request)).await
    }

    pub async fn create_queue(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
        definition: Value,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::CreateQueue).capture_params(),
            ResourceDescriptor::queue(vhost, name),
            rabbitmq::create_queue(vhost, name, definition),
        )
        .await
    }

    pub async fn delete_queue(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
        if_empty: bool,
        if_unused: bool,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::DeleteQueue).capture_params(),
            ResourceDescriptor::queue(vhost, name),
            rabbitmq::delete_queue(vhost, name, if_empty, if_unused),
        )
        .await
    }

    pub async fn purge_queue(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::PurgeQueue),
            ResourceDescriptor::queue(vhost, name),
            rabbitmq::purge_queue(vhost, name),
        )
        .await
    }

    /// Publish through the default exchange. The payload is not copied
    /// into the audit record.
    pub async fn publish_to_queue(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        queue: &str,
        message: Value,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::PublishMessageQueue),
            ResourceDescriptor::message(vhost, queue, Some(queue)),
            rabbitmq::publish_to_queue(vhost, queue, message),
        )
        .await
    }

    pub async fn move_messages(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        source: &str,
        destination: &str,
    ) -> Result<UpstreamResponse, ProxyError> {
        let resource = ResourceDescriptor::queue(vhost, source).with_details(json!({
            "destination": destination,
        }));
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::MoveMessagesQueue),
            resource,
            rabbitmq::move_messages(vhost, source, destination),
        )
        .await
    }

    // Exchanges

    pub async fn list_exchanges(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: Option<&str>,
        query: Query,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::exchanges(vhost).with_query(query)).await
    }

    pub async fn get_exchange(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::exchange(vhost, name)).await
    }

    pub async fn exchange_source_bindings(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::exchange_source_bindings(vhost, name)).await
    }

    pub async fn create_exchange(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
        definition: Value,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::CreateExchange).capture_params(),
            ResourceDescriptor::exchange(vhost, name),
            rabbitmq::create_exchange(vhost, name, definition),
        )
        .await
    }

    pub async fn delete_exchange(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        name: &str,
        if_unused: bool,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::DeleteExchange).capture_params(),
            ResourceDescriptor::exchange(vhost, name),
            rabbitmq::delete_exchange(vhost, name, if_unused),
        )
        .await
    }

    pub async fn publish_to_exchange(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        exchange: &str,
        message: Value,
    ) -> Result<UpstreamResponse, ProxyError> {
        let routing_key = message
            .get("routing_key")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::PublishMessageExchange),
            ResourceDescriptor::message(vhost, exchange, routing_key.as_deref()),
            rabbitmq::publish(vhost, exchange, message),
        )
        .await
    }

    // Bindings

    pub async fn list_bindings(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: Option<&str>,
        query: Query,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.read(ctx, cluster_id, rabbitmq::bindings(vhost).with_query(query)).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_binding(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        source: &str,
        destination_type: DestinationType,
        destination: &str,
        definition: Value,
    ) -> Result<UpstreamResponse, ProxyError> {
        let operation = match destination_type {
            DestinationType::Queue => OperationType::CreateBindingQueue,
            DestinationType::Exchange => OperationType::CreateBindingExchange,
        };
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(operation).capture_params(),
            ResourceDescriptor::binding(vhost, source, destination_type, destination, None),
            rabbitmq::create_binding(vhost, source, destination_type, destination, definition),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn delete_binding(
        &self,
        ctx: &RequestContext,
        cluster_id: Uuid,
        vhost: &str,
        source: &str,
        destination_type: DestinationType,
        destination: &str,
        properties_key: &str,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.write(
            ctx,
            cluster_id,
            AuditMark::new(OperationType::DeleteBinding),
            ResourceDescriptor::binding(vhost, source, destination_type, destination, Some(properties_key)),
            rabbitmq::delete_binding(vhost, source, destination_type, destination, properties_key),
        )
        .await
    }
}
