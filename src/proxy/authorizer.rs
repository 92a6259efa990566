use std::sync::Arc;
use uuid::Uuid;

use super::error::DenyReason;
use crate::database::{ClusterStore, StoreError};
use crate::types::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Per-call cluster authorization. Assignment and active state are read
/// from the store on every call; nothing is cached here.
pub struct Authorizer {
    store: Arc<dyn ClusterStore>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn ClusterStore>) -> Self {
        Self { store }
    }

    pub async fn authorize(&self, principal: &Principal, cluster_id: Uuid) -> Result<Decision, StoreError> {
        // Administrators reach every cluster; the pool reports missing or
        // inactive connections to them as ClusterUnavailable
        if principal.is_admin() {
            return Ok(Decision::Allow);
        }

        // Unassigned wins over everything else so nonexistent clusters
        // look the same as clusters owned by someone else
        if !self.store.is_assigned(principal.id, cluster_id).await? {
            return Ok(Decision::Deny(DenyReason::NotAssigned));
        }

        match self.store.get_connection(cluster_id).await? {
            Some(connection) if connection.is_active => Ok(Decision::Allow),
            _ => Ok(Decision::Deny(DenyReason::ClusterInactive)),
        }
    }
}
