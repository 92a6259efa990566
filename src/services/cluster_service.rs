use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{ClusterConnection, ClusterConnectionUpdate, NewClusterConnection, User};
use crate::database::{ClusterStore, StoreError, UserStore};
use crate::proxy::{management_api_root, map_response, rabbitmq, ClientPool, ProxyError};
use crate::types::Principal;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ServiceError::NotFound(msg),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Store(other),
        }
    }
}

/// Credential store administration. Every successful update or delete
/// evicts the pooled client for the connection.
pub struct ClusterService {
    clusters: Arc<dyn ClusterStore>,
    users: Arc<dyn UserStore>,
    pool: Arc<ClientPool>,
}

impl ClusterService {
    pub fn new(clusters: Arc<dyn ClusterStore>, users: Arc<dyn UserStore>, pool: Arc<ClientPool>) -> Self {
        Self { clusters, users, pool }
    }

    pub async fn list_connections(&self) -> Result<Vec<ClusterConnection>, ServiceError> {
        Ok(self.clusters.list_connections().await?)
    }

    pub async fn get_connection(&self, id: Uuid) -> Result<ClusterConnection, ServiceError> {
        self.clusters
            .get_connection(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cluster connection {} not found", id)))
    }

    pub async fn create_connection(&self, input: NewClusterConnection) -> Result<ClusterConnection, ServiceError> {
        let connection = ClusterConnection::from_new(input);
        validate_connection(&connection)?;

        self.clusters.insert_connection(&connection).await?;
        tracing::info!("Created cluster connection: {} ({})", connection.name, connection.id);
        Ok(connection)
    }

    pub async fn update_connection(
        &self,
        id: Uuid,
        update: ClusterConnectionUpdate,
    ) -> Result<ClusterConnection, ServiceError> {
        let mut connection = self.get_connection(id).await?;
        let client_affected = connection.apply(update);
        validate_connection(&connection)?;

        self.clusters.update_connection(&connection).await?;
        self.pool.invalidate(id).await;

        tracing::info!(
            "Updated cluster connection: {} (client rebuild: {})",
            connection.name,
            client_affected
        );
        Ok(connection)
    }

    /// Delete the connection together with its assignments and pooled client
    pub async fn delete_connection(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.clusters.delete_connection(id).await? {
            return Err(ServiceError::NotFound(format!("Cluster connection {} not found", id)));
        }
        self.pool.invalidate(id).await;
        tracing::info!("Deleted cluster connection: {}", id);
        Ok(())
    }

    /// Probe the management API through the pooled client
    pub async fn test_connection(&self, id: Uuid) -> Result<Value, ProxyError> {
        let op = rabbitmq::overview();
        let client = self.pool.get_client(id).await?;
        let response = map_response(id, &op, client.send(&op).await?)?;
        Ok(response.json().unwrap_or_else(|_| Value::String(response.text())))
    }

    pub async fn assigned_users(&self, cluster_id: Uuid) -> Result<Vec<User>, ServiceError> {
        self.get_connection(cluster_id).await?;

        let mut users = Vec::new();
        for user_id in self.clusters.assigned_user_ids(cluster_id).await? {
            if let Some(user) = self.users.find_user(user_id).await? {
                users.push(user);
            }
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    pub async fn assign_user(&self, cluster_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        self.get_connection(cluster_id).await?;
        if self.users.find_user(user_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }
        self.clusters.assign(user_id, cluster_id).await?;
        tracing::info!("Assigned user {} to cluster {}", user_id, cluster_id);
        Ok(())
    }

    pub async fn unassign_user(&self, cluster_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        if !self.clusters.unassign(user_id, cluster_id).await? {
            return Err(ServiceError::NotFound(format!(
                "User {} is not assigned to cluster {}",
                user_id, cluster_id
            )));
        }
        tracing::info!("Unassigned user {} from cluster {}", user_id, cluster_id);
        Ok(())
    }

    /// Active clusters the principal may dispatch to
    pub async fn accessible_clusters(&self, principal: &Principal) -> Result<Vec<ClusterConnection>, ServiceError> {
        let connections = self.clusters.list_connections().await?;
        if principal.is_admin() {
            return Ok(connections.into_iter().filter(|c| c.is_active).collect());
        }

        let assigned = self.clusters.assigned_cluster_ids(principal.id).await?;
        Ok(connections
            .into_iter()
            .filter(|c| c.is_active && assigned.contains(&c.id))
            .collect())
    }
}

/// Validate connection fields follow rules
fn validate_connection(connection: &ClusterConnection) -> Result<(), ServiceError> {
    let name = &connection.name;
    if name.len() < 2 || name.len() > 100 {
        return Err(ServiceError::Validation(
            "Cluster name must be between 2 and 100 characters".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')) {
        return Err(ServiceError::Validation(
            "Cluster name can only contain letters, numbers, spaces, dots, hyphens, and underscores".to_string(),
        ));
    }

    management_api_root(&connection.api_url).map_err(ServiceError::Validation)?;

    if connection.username.trim().is_empty() {
        return Err(ServiceError::Validation("Cluster username is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;
    use crate::types::Role;

    fn service() -> (Arc<MemoryStore>, Arc<ClientPool>, ClusterService) {
        let store = Arc::new(MemoryStore::new());
        let pool = Arc::new(ClientPool::new(store.clone(), AppConfig::development().upstream));
        let service = ClusterService::new(store.clone(), store.clone(), pool.clone());
        (store, pool, service)
    }

    fn input(name: &str) -> NewClusterConnection {
        NewClusterConnection {
            name: name.to_string(),
            api_url: "http://localhost:15672".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            is_active: true,
            description: None,
        }
    }

    #[tokio::test]
    async fn create_validates_input() {
        let (_store, _pool, service) = service();
        assert!(matches!(
            service.create_connection(input("x")).await,
            Err(ServiceError::Validation(_))
        ));

        let mut bad_url = input("prod");
        bad_url.api_url = "ftp://rabbit".to_string();
        assert!(matches!(
            service.create_connection(bad_url).await,
            Err(ServiceError::Validation(_))
        ));

        service.create_connection(input("prod")).await.unwrap();
        assert!(matches!(
            service.create_connection(input("PROD")).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_and_delete_evict_pooled_client() {
        let (_store, pool, service) = service();
        let conn = service.create_connection(input("prod")).await.unwrap();

        pool.get_client(conn.id).await.unwrap();
        let update = ClusterConnectionUpdate {
            api_url: Some("http://rabbit-2:15672".to_string()),
            ..Default::default()
        };
        service.update_connection(conn.id, update).await.unwrap();
        assert!(!pool.contains(conn.id).await);

        let rebuilt = pool.get_client(conn.id).await.unwrap();
        assert_eq!(rebuilt.api_root().as_str(), "http://rabbit-2:15672/api");

        service.delete_connection(conn.id).await.unwrap();
        assert!(!pool.contains(conn.id).await);
        assert!(matches!(
            service.delete_connection(conn.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn accessible_clusters_follow_assignments() {
        let (store, _pool, service) = service();
        let a = service.create_connection(input("alpha")).await.unwrap();
        let mut off = input("beta");
        off.is_active = false;
        let b = service.create_connection(off).await.unwrap();
        service.create_connection(input("gamma")).await.unwrap();

        let user = User::new("erin", Role::User);
        store.insert_user(user.clone()).await;
        service.assign_user(a.id, user.id).await.unwrap();
        service.assign_user(b.id, user.id).await.unwrap();

        let visible = service.accessible_clusters(&user.principal()).await.unwrap();
        assert_eq!(visible.iter().map(|c| c.id).collect::<Vec<_>>(), vec![a.id]);

        let admin = User::new("root", Role::Administrator).principal();
        assert_eq!(service.accessible_clusters(&admin).await.unwrap().len(), 2);

        let assigned = service.assigned_users(a.id).await.unwrap();
        assert_eq!(assigned.len(), 1);
        service.unassign_user(a.id, user.id).await.unwrap();
        assert!(matches!(
            service.unassign_user(a.id, user.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
