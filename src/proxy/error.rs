use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::database::StoreError;

/// Why the authorizer refused a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    /// No authenticated principal in the request context
    Unauthenticated,
    /// The user has no assignment to the cluster
    NotAssigned,
    /// The cluster is assigned but inactive (or gone)
    ClusterInactive,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::Unauthenticated => f.write_str("not authenticated"),
            DenyReason::NotAssigned => f.write_str("cluster is not assigned to user"),
            DenyReason::ClusterInactive => f.write_str("cluster is inactive"),
        }
    }
}

/// Failure of a proxied call. Authorization and pool errors are decided
/// before any upstream traffic; the upstream kinds map HTTP outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("Access denied to cluster {cluster_id}: {reason}")]
    AccessDenied { cluster_id: Uuid, reason: DenyReason },

    #[error("Cluster {cluster_id} unavailable: {message}")]
    ClusterUnavailable { cluster_id: Uuid, message: String },

    #[error("Cluster {cluster_id} unreachable: {message}")]
    UpstreamUnreachable { cluster_id: Uuid, message: String },

    #[error("Cluster {cluster_id} rejected the stored credentials (HTTP {status})")]
    UpstreamAuthRejected { cluster_id: Uuid, status: u16 },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Upstream rejected the request (HTTP {status}): {body}")]
    UpstreamRequestError { status: u16, body: String },

    #[error("Upstream server error (HTTP {status}): {body}")]
    UpstreamServerError { status: u16, body: String },

    #[error("Store error: {0}")]
    Store(String),
}

impl ProxyError {
    /// Stable kind label for logs and client error codes
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::AccessDenied { .. } => "ACCESS_DENIED",
            ProxyError::ClusterUnavailable { .. } => "CLUSTER_UNAVAILABLE",
            ProxyError::UpstreamUnreachable { .. } => "UPSTREAM_UNREACHABLE",
            ProxyError::UpstreamAuthRejected { .. } => "UPSTREAM_AUTH_REJECTED",
            ProxyError::ResourceNotFound(_) => "NOT_FOUND",
            ProxyError::UpstreamRequestError { .. } => "UPSTREAM_REQUEST_ERROR",
            ProxyError::UpstreamServerError { .. } => "UPSTREAM_SERVER_ERROR",
            ProxyError::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    pub fn cluster_unavailable(cluster_id: Uuid, message: impl Into<String>) -> Self {
        ProxyError::ClusterUnavailable {
            cluster_id,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ProxyError {
    fn from(err: StoreError) -> Self {
        ProxyError::Store(err.to_string())
    }
}
