// In-memory store used when no DATABASE_URL is configured, and by tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{AuditFilter, AuditRecord, ClusterConnection, User};
use super::store::{AuditStore, ClusterStore, StoreError, UserStore};

/// Injected behaviour for audit inserts, so callers can exercise the
/// recorder's failure isolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditFault {
    #[default]
    None,
    /// Every insert returns an error
    Error,
    /// Every insert panics
    Panic,
    /// Every insert sleeps for the given duration before succeeding
    Stall(Duration),
}

#[derive(Default)]
pub struct MemoryStore {
    connections: RwLock<HashMap<Uuid, ClusterConnection>>,
    assignments: RwLock<HashSet<(Uuid, Uuid)>>,
    users: RwLock<HashMap<Uuid, User>>,
    audits: RwLock<Vec<AuditRecord>>,
    audit_fault: Mutex<AuditFault>,
    audit_attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn set_user_active(&self, id: Uuid, is_active: bool) {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.is_active = is_active;
        }
    }

    pub fn set_audit_fault(&self, fault: AuditFault) {
        *self.audit_fault.lock().unwrap_or_else(|e| e.into_inner()) = fault;
    }

    /// Number of insert_audit calls, including failed ones
    pub fn audit_attempts(&self) -> usize {
        self.audit_attempts.load(Ordering::SeqCst)
    }

    /// Persisted audit records in insertion order
    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.audits.read().await.clone()
    }

    fn current_fault(&self) -> AuditFault {
        *self.audit_fault.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn name_taken(
        connections: &HashMap<Uuid, ClusterConnection>,
        name: &str,
        except: Option<Uuid>,
    ) -> bool {
        connections
            .values()
            .any(|c| c.name.eq_ignore_ascii_case(name) && Some(c.id) != except)
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn list_connections(&self) -> Result<Vec<ClusterConnection>, StoreError> {
        let mut connections: Vec<ClusterConnection> =
            self.connections.read().await.values().cloned().collect();
        connections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(connections)
    }

    async fn get_connection(&self, id: Uuid) -> Result<Option<ClusterConnection>, StoreError> {
        Ok(self.connections.read().await.get(&id).cloned())
    }

    async fn insert_connection(&self, connection: &ClusterConnection) -> Result<(), StoreError> {
        let mut connections = self.connections.write().await;
        if Self::name_taken(&connections, &connection.name, None) {
            return Err(StoreError::Conflict(format!(
                "cluster connection '{}' already exists",
                connection.name
            )));
        }
        connections.insert(connection.id, connection.clone());
        Ok(())
    }

    async fn update_connection(&self, connection: &ClusterConnection) -> Result<(), StoreError> {
        let mut connections = self.connections.write().await;
        if !connections.contains_key(&connection.id) {
            return Err(StoreError::NotFound(format!("cluster connection {}", connection.id)));
        }
        if Self::name_taken(&connections, &connection.name, Some(connection.id)) {
            return Err(StoreError::Conflict(format!(
                "cluster connection '{}' already exists",
                connection.name
            )));
        }
        connections.insert(connection.id, connection.clone());
        Ok(())
    }

    async fn delete_connection(&self, id: Uuid) -> Result<bool, StoreError> {
        // Both locks taken together so no reader sees assignments to a
        // deleted cluster
        let mut connections = self.connections.write().await;
        let mut assignments = self.assignments.write().await;
        let removed = connections.remove(&id).is_some();
        assignments.retain(|(_, cluster_id)| *cluster_id != id);
        Ok(removed)
    }

    async fn assigned_cluster_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .assignments
            .read()
            .await
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, c)| *c)
            .collect())
    }

    async fn is_assigned(&self, user_id: Uuid, cluster_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.assignments.read().await.contains(&(user_id, cluster_id)))
    }

    async fn assigned_user_ids(&self, cluster_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .assignments
            .read()
            .await
            .iter()
            .filter(|(_, c)| *c == cluster_id)
            .map(|(u, _)| *u)
            .collect())
    }

    async fn assign(&self, user_id: Uuid, cluster_id: Uuid) -> Result<(), StoreError> {
        if !self.connections.read().await.contains_key(&cluster_id) {
            return Err(StoreError::NotFound(format!("cluster connection {}", cluster_id)));
        }
        if !self.users.read().await.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }
        self.assignments.write().await.insert((user_id, cluster_id));
        Ok(())
    }

    async fn unassign(&self, user_id: Uuid, cluster_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.assignments.write().await.remove(&(user_id, cluster_id)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn insert_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.audit_attempts.fetch_add(1, Ordering::SeqCst);

        match self.current_fault() {
            AuditFault::None => {}
            AuditFault::Error => {
                return Err(StoreError::Unavailable("audit store rejected write".to_string()))
            }
            AuditFault::Panic => panic!("audit store panicked while writing {}", record.id),
            AuditFault::Stall(delay) => tokio::time::sleep(delay).await,
        }

        self.audits.write().await.push(record.clone());
        Ok(())
    }

    async fn list_audits(&self, filter: &AuditFilter, max_limit: i64) -> Result<Vec<AuditRecord>, StoreError> {
        let (limit, offset) = filter.page(max_limit);
        let audits = self.audits.read().await;
        let mut matching: Vec<AuditRecord> =
            audits.iter().filter(|r| filter.matches(r)).cloned().collect();
        matching.sort_by(|a, b| b.operation_at.cmp(&a.operation_at));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewClusterConnection;
    use crate::types::Role;

    fn connection(name: &str) -> ClusterConnection {
        ClusterConnection::from_new(NewClusterConnection {
            name: name.to_string(),
            api_url: "http://localhost:15672".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            is_active: true,
            description: None,
        })
    }

    #[tokio::test]
    async fn delete_cascades_assignments() {
        let store = MemoryStore::new();
        let user = User::new("alice", Role::User);
        let a = connection("a");
        let b = connection("b");
        store.insert_user(user.clone()).await;
        store.insert_connection(&a).await.unwrap();
        store.insert_connection(&b).await.unwrap();
        store.assign(user.id, a.id).await.unwrap();
        store.assign(user.id, b.id).await.unwrap();

        assert!(store.delete_connection(a.id).await.unwrap());
        assert_eq!(store.assigned_cluster_ids(user.id).await.unwrap(), vec![b.id]);
        assert!(store.assigned_user_ids(a.id).await.unwrap().is_empty());
        assert!(!store.delete_connection(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let store = MemoryStore::new();
        store.insert_connection(&connection("main")).await.unwrap();
        let err = store.insert_connection(&connection("MAIN")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn assign_requires_existing_cluster() {
        let store = MemoryStore::new();
        let user = User::new("bob", Role::User);
        store.insert_user(user.clone()).await;
        let err = store.assign(user.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
