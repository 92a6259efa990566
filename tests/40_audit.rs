mod common;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use common::{test_config, MockRabbit, TestEnv};
use rabbit_admin_api::database::models::{AuditStatus, OperationType, ResourceType};
use rabbit_admin_api::database::AuditFault;
use rabbit_admin_api::proxy::{DestinationType, ProxyError};
use rabbit_admin_api::types::Role;
use serde_json::json;

#[tokio::test]
async fn successful_write_is_recorded_with_request_context() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let user = env.user("grace", Role::User).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;
    env.assign(&user, &cluster).await;

    env.state
        .broker
        .create_queue(&env.ctx(&user), cluster.id, "/", "orders", json!({"durable": true}))
        .await?;

    let records = env.store.audit_records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.user_id, user.id);
    assert_eq!(record.username, "grace");
    assert_eq!(record.cluster_id, cluster.id);
    assert_eq!(record.cluster_name, "alpha");
    assert_eq!(record.operation, OperationType::CreateQueue);
    assert_eq!(record.resource_type, ResourceType::Queue);
    assert_eq!(record.resource_name, "orders");
    assert_eq!(record.vhost.as_deref(), Some("/"));
    assert_eq!(record.status, AuditStatus::Success);
    assert!(record.error_message.is_none());
    assert_eq!(record.client_ip.as_deref(), Some("10.0.0.7"));
    assert_eq!(record.user_agent.as_deref(), Some("integration-test"));
    assert_eq!(record.details.as_ref().unwrap()["params"], json!({"durable": true}));
    Ok(())
}

#[tokio::test]
async fn failed_write_is_recorded_and_error_returned() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;

    let err = env
        .state
        .broker
        .delete_exchange(&env.ctx(&admin), cluster.id, "/", "missing-events", false)
        .await
        .unwrap_err();
    assert_eq!(err, ProxyError::ResourceNotFound("missing-events".to_string()));

    let records = env.store.audit_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AuditStatus::Failure);
    assert_eq!(records[0].operation, OperationType::DeleteExchange);
    assert!(records[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("missing-events"));
    Ok(())
}

#[tokio::test]
async fn denied_write_is_recorded_as_failure() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let user = env.user("mallory", Role::User).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;

    let err = env
        .state
        .broker
        .purge_queue(&env.ctx(&user), cluster.id, "/", "orders")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ACCESS_DENIED");
    assert_eq!(mock.request_count(), 0);

    let records = env.store.audit_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AuditStatus::Failure);
    assert_eq!(records[0].username, "mallory");
    Ok(())
}

#[tokio::test]
async fn audit_store_failures_never_change_the_outcome() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;
    let ctx = env.ctx(&admin);

    env.store.set_audit_fault(AuditFault::Error);
    let response = env.state.broker.purge_queue(&ctx, cluster.id, "/", "orders").await?;
    assert_eq!(response.status, 204);

    env.store.set_audit_fault(AuditFault::Panic);
    let response = env.state.broker.purge_queue(&ctx, cluster.id, "/", "orders").await?;
    assert_eq!(response.status, 204);

    assert_eq!(env.store.audit_attempts(), 2);
    assert!(env.store.audit_records().await.is_empty());
    assert_eq!(mock.request_count(), 2);
    Ok(())
}

#[tokio::test]
async fn audit_store_failures_never_change_a_failed_outcome() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;
    let ctx = env.ctx(&admin);

    for fault in [AuditFault::None, AuditFault::Error, AuditFault::Panic] {
        env.store.set_audit_fault(fault);
        let err = env
            .state
            .broker
            .delete_queue(&ctx, cluster.id, "/", "missing-q1", false, false)
            .await
            .unwrap_err();
        assert_eq!(err, ProxyError::ResourceNotFound("missing-q1".to_string()), "under {:?}", fault);
    }

    assert_eq!(env.store.audit_attempts(), 3);
    let records = env.store.audit_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AuditStatus::Failure);
    assert_eq!(records[0].operation, OperationType::DeleteQueue);
    assert_eq!(records[0].resource_name, "missing-q1");
    Ok(())
}

#[tokio::test]
async fn stalled_audit_store_is_bounded_by_persist_timeout() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;
    env.store.set_audit_fault(AuditFault::Stall(Duration::from_secs(5)));

    let started = Instant::now();
    let response = env
        .state
        .broker
        .create_exchange(&env.ctx(&admin), cluster.id, "/", "events", json!({"type": "topic"}))
        .await?;

    assert_eq!(response.status, 201);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(env.store.audit_records().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn reads_are_not_audited() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;
    let ctx = env.ctx(&admin);

    env.state.broker.overview(&ctx, cluster.id).await?;
    env.state.broker.list_bindings(&ctx, cluster.id, None, Vec::new()).await?;
    env.state
        .broker
        .get_messages(&ctx, cluster.id, "/", "orders", json!({"count": 1, "ackmode": "ack_requeue_true"}))
        .await?;

    assert_eq!(env.store.audit_attempts(), 0);
    Ok(())
}

#[tokio::test]
async fn every_write_operation_leaves_one_record() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;
    let ctx = env.ctx(&admin);
    let broker = &env.state.broker;
    let id = cluster.id;

    broker.create_exchange(&ctx, id, "/", "events", json!({"type": "topic"})).await?;
    broker.delete_exchange(&ctx, id, "/", "events", true).await?;
    broker.create_queue(&ctx, id, "/", "orders", json!({})).await?;
    broker.delete_queue(&ctx, id, "/", "orders", false, false).await?;
    broker.purge_queue(&ctx, id, "/", "orders").await?;
    broker
        .create_binding(&ctx, id, "/", "events", DestinationType::Exchange, "audit", json!({}))
        .await?;
    broker
        .create_binding(&ctx, id, "/", "events", DestinationType::Queue, "orders", json!({"routing_key": "o.*"}))
        .await?;
    broker
        .delete_binding(&ctx, id, "/", "events", DestinationType::Queue, "orders", "o.*")
        .await?;
    broker
        .publish_to_exchange(&ctx, id, "/", "events", json!({"routing_key": "o.new", "payload": "secret"}))
        .await?;
    broker.publish_to_queue(&ctx, id, "/", "orders", json!({"payload": "secret"})).await?;
    broker.move_messages(&ctx, id, "/", "orders", "orders.retry").await?;

    let records = env.store.audit_records().await;
    assert_eq!(records.len(), OperationType::ALL.len());
    let seen: HashSet<OperationType> = records.iter().map(|r| r.operation).collect();
    assert_eq!(seen, OperationType::ALL.into_iter().collect::<HashSet<_>>());
    assert!(records.iter().all(|r| r.status == AuditStatus::Success));

    // Message payloads stay out of the trail
    for record in records.iter().filter(|r| r.resource_type == ResourceType::Message) {
        let details = record.details.clone().unwrap_or_default().to_string();
        assert!(!details.contains("secret"), "payload leaked: {}", details);
    }

    let binding = records
        .iter()
        .find(|r| r.operation == OperationType::CreateBindingQueue)
        .unwrap();
    assert_eq!(binding.resource_type, ResourceType::Binding);
    assert_eq!(binding.resource_name, "events -> orders");

    let moved = records
        .iter()
        .find(|r| r.operation == OperationType::MoveMessagesQueue)
        .unwrap();
    assert_eq!(moved.resource_type, ResourceType::Queue);
    assert_eq!(moved.details.as_ref().unwrap()["resource"]["destination"], "orders.retry");
    Ok(())
}

#[tokio::test]
async fn disabled_audit_logging_writes_nothing() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let mut config = test_config();
    config.security.enable_audit_logging = false;
    let env = TestEnv::with_config(config);
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env.cluster("alpha", &mock.base_url).await;

    env.state
        .broker
        .purge_queue(&env.ctx(&admin), cluster.id, "/", "orders")
        .await?;
    assert_eq!(env.store.audit_attempts(), 0);
    Ok(())
}
