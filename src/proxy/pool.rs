use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::client::UpstreamClient;
use super::error::ProxyError;
use crate::config::UpstreamConfig;
use crate::database::ClusterStore;

struct PooledClient {
    fingerprint: String,
    /// `updated_at` of the connection record the client was built from
    built_from: DateTime<Utc>,
    client: Arc<UpstreamClient>,
}

/// One reusable upstream client per active cluster connection.
///
/// The map is the only shared mutable state on the proxy path. Clients are
/// built outside the lock and inserted with insert-if-absent semantics, so
/// concurrent misses for the same cluster leave exactly one retained client.
pub struct ClientPool {
    store: Arc<dyn ClusterStore>,
    config: UpstreamConfig,
    clients: RwLock<HashMap<Uuid, PooledClient>>,
    constructed: AtomicU64,
}

impl ClientPool {
    pub fn new(store: Arc<dyn ClusterStore>, config: UpstreamConfig) -> Self {
        Self {
            store,
            config,
            clients: RwLock::new(HashMap::new()),
            constructed: AtomicU64::new(0),
        }
    }

    /// Get the cached client for a cluster, building one on a miss.
    ///
    /// The connection record is re-read on every call: a missing or
    /// inactive connection evicts any cached client and fails, and a
    /// changed endpoint or credential forces a rebuild.
    pub async fn get_client(&self, cluster_id: Uuid) -> Result<Arc<UpstreamClient>, ProxyError> {
        let connection = self.store.get_connection(cluster_id).await.map_err(|e| {
            ProxyError::cluster_unavailable(cluster_id, format!("connection lookup failed: {}", e))
        })?;

        let connection = match connection {
            Some(c) if c.is_active => c,
            Some(_) => {
                self.invalidate(cluster_id).await;
                return Err(ProxyError::cluster_unavailable(cluster_id, "connection is inactive"));
            }
            None => {
                self.invalidate(cluster_id).await;
                return Err(ProxyError::cluster_unavailable(cluster_id, "connection does not exist"));
            }
        };

        let fingerprint = UpstreamClient::fingerprint_of(&connection);

        // Fast path: try read lock
        {
            let clients = self.clients.read().await;
            if let Some(pooled) = clients.get(&cluster_id) {
                if pooled.fingerprint == fingerprint {
                    return Ok(pooled.client.clone());
                }
            }
        }

        // Build outside the lock; a racing builder may win the insert below
        let fresh = Arc::new(UpstreamClient::build(&connection, &self.config)?);
        self.constructed.fetch_add(1, Ordering::Relaxed);

        let mut clients = self.clients.write().await;
        match clients.entry(cluster_id) {
            Entry::Occupied(mut entry) => {
                let current = entry.get();
                if current.fingerprint == fingerprint {
                    debug!("Discarding duplicate client for cluster: {}", cluster_id);
                    return Ok(current.client.clone());
                }
                if current.built_from > connection.updated_at {
                    // Our view of the record is older than the cached one
                    return Ok(current.client.clone());
                }
                entry.insert(PooledClient {
                    fingerprint,
                    built_from: connection.updated_at,
                    client: fresh.clone(),
                });
                info!("Rebuilt upstream client for cluster: {}", cluster_id);
            }
            Entry::Vacant(entry) => {
                entry.insert(PooledClient {
                    fingerprint,
                    built_from: connection.updated_at,
                    client: fresh.clone(),
                });
                info!(
                    "Created upstream client for cluster: {} ({})",
                    connection.name,
                    fresh.api_root()
                );
            }
        }

        Ok(fresh)
    }

    /// Evict the cached client for a cluster. Safe to call when nothing is
    /// cached; returns whether a client was removed. Connections held by
    /// the evicted client close once in-flight calls release it.
    pub async fn invalidate(&self, cluster_id: Uuid) -> bool {
        let removed = self.clients.write().await.remove(&cluster_id).is_some();
        if removed {
            info!("Evicted upstream client for cluster: {}", cluster_id);
        }
        removed
    }

    /// Drop every cached client (e.g., on shutdown)
    pub async fn invalidate_all(&self) {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        clients.clear();
        info!("Evicted {} upstream clients", count);
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    pub async fn contains(&self, cluster_id: Uuid) -> bool {
        self.clients.read().await.contains_key(&cluster_id)
    }

    /// Total clients constructed since startup, including discarded ones
    pub fn constructed(&self) -> u64 {
        self.constructed.load(Ordering::Relaxed)
    }
}
