mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{MockRabbit, TestEnv};
use rabbit_admin_api::database::models::ClusterConnectionUpdate;
use rabbit_admin_api::types::Role;

#[tokio::test]
async fn concurrent_misses_retain_a_single_client() -> Result<()> {
    let env = TestEnv::new();
    let cluster = env.cluster("alpha", "http://alpha.internal:15672").await;
    let pool = env.state.pool.clone();
    let cluster_id = cluster.id;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get_client(cluster_id).await })
        })
        .collect();

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await??);
    }

    let first = &clients[0];
    assert!(clients.iter().all(|c| Arc::ptr_eq(c, first)));
    assert_eq!(pool.len().await, 1);

    // Later calls take the cached path
    let built = pool.constructed();
    let again = pool.get_client(cluster_id).await?;
    assert!(Arc::ptr_eq(&again, first));
    assert_eq!(pool.constructed(), built);
    Ok(())
}

#[tokio::test]
async fn invalidation_yields_a_fresh_client() -> Result<()> {
    let env = TestEnv::new();
    let cluster = env.cluster("alpha", "http://alpha.internal:15672").await;
    let pool = &env.state.pool;

    let before = pool.get_client(cluster.id).await?;
    assert!(pool.invalidate(cluster.id).await);
    assert!(!pool.invalidate(cluster.id).await);

    let after = pool.get_client(cluster.id).await?;
    assert!(!Arc::ptr_eq(&before, &after));
    Ok(())
}

#[tokio::test]
async fn updated_url_routes_to_the_new_endpoint() -> Result<()> {
    let old = MockRabbit::start("old").await?;
    let new = MockRabbit::start("new").await?;
    let env = TestEnv::new();
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env.cluster("alpha", &old.base_url).await;
    let ctx = env.ctx(&admin);

    let response = env.state.broker.overview(&ctx, cluster.id).await?;
    assert_eq!(response.json()?["cluster_name"], "old");

    env.state
        .cluster_service
        .update_connection(
            cluster.id,
            ClusterConnectionUpdate {
                api_url: Some(new.base_url.clone()),
                ..Default::default()
            },
        )
        .await?;

    let response = env.state.broker.overview(&ctx, cluster.id).await?;
    assert_eq!(response.json()?["cluster_name"], "new");
    assert_eq!(old.request_count(), 1);
    assert_eq!(new.request_count(), 1);
    Ok(())
}

#[tokio::test]
async fn deleted_connection_leaves_the_pool() -> Result<()> {
    let env = TestEnv::new();
    let cluster = env.cluster("alpha", "http://alpha.internal:15672").await;

    env.state.pool.get_client(cluster.id).await?;
    assert!(env.state.pool.contains(cluster.id).await);

    env.state.cluster_service.delete_connection(cluster.id).await?;
    assert!(!env.state.pool.contains(cluster.id).await);

    let err = env.state.pool.get_client(cluster.id).await.unwrap_err();
    assert_eq!(err.kind(), "CLUSTER_UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn credential_change_sends_new_credentials() -> Result<()> {
    let mock = MockRabbit::start("alpha").await?;
    let env = TestEnv::new();
    let admin = env.user("root", Role::Administrator).await;
    let cluster = env
        .cluster_with_credentials("alpha", &mock.base_url, "guest", "wrong")
        .await;
    let ctx = env.ctx(&admin);

    let err = env.state.broker.overview(&ctx, cluster.id).await.unwrap_err();
    assert_eq!(err.kind(), "UPSTREAM_AUTH_REJECTED");

    env.state
        .cluster_service
        .update_connection(
            cluster.id,
            ClusterConnectionUpdate {
                password: Some("guest".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let response = env.state.broker.overview(&ctx, cluster.id).await?;
    assert_eq!(response.status, 200);

    let seen = mock.requests();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0].authorization.as_deref(), Some(common::GUEST_AUTH));
    assert_eq!(seen[1].authorization.as_deref(), Some(common::GUEST_AUTH));
    Ok(())
}
