// Collaborator interfaces the proxy core depends on. Postgres and in-memory
// implementations live in sibling modules.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::{AuditFilter, AuditRecord, ClusterConnection, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Cluster connection records plus the user/cluster assignment relation.
/// The store owns the relation; neither side holds references to the other.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn list_connections(&self) -> Result<Vec<ClusterConnection>, StoreError>;

    async fn get_connection(&self, id: Uuid) -> Result<Option<ClusterConnection>, StoreError>;

    async fn insert_connection(&self, connection: &ClusterConnection) -> Result<(), StoreError>;

    async fn update_connection(&self, connection: &ClusterConnection) -> Result<(), StoreError>;

    /// Remove the connection and every assignment that references it.
    /// Returns false when no such connection existed.
    async fn delete_connection(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn assigned_cluster_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn is_assigned(&self, user_id: Uuid, cluster_id: Uuid) -> Result<bool, StoreError>;

    async fn assigned_user_ids(&self, cluster_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn assign(&self, user_id: Uuid, cluster_id: Uuid) -> Result<(), StoreError>;

    /// Returns false when the assignment did not exist
    async fn unassign(&self, user_id: Uuid, cluster_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_audit(&self, record: &AuditRecord) -> Result<(), StoreError>;

    async fn list_audits(&self, filter: &AuditFilter, max_limit: i64) -> Result<Vec<AuditRecord>, StoreError>;
}
