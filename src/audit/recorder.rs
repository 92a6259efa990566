use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::descriptor::ResourceDescriptor;
use crate::config::{AppConfig, AuditDelivery};
use crate::database::models::{AuditRecord, AuditStatus, OperationType};
use crate::database::{AuditStore, ClusterStore};
use crate::types::{Principal, RequestContext};

/// Marks a call as auditable: what kind of write it is and what may be
/// copied into the record's details. The resource type comes from the
/// target's descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditMark {
    pub operation: OperationType,
    pub capture_params: bool,
    pub capture_result: bool,
}

impl AuditMark {
    pub fn new(operation: OperationType) -> Self {
        Self {
            operation,
            capture_params: false,
            capture_result: false,
        }
    }

    pub fn capture_params(mut self) -> Self {
        self.capture_params = true;
        self
    }

    pub fn capture_result(mut self) -> Self {
        self.capture_result = true;
        self
    }
}

/// Where an audited call lands and the parameters it was made with
#[derive(Debug, Clone)]
pub struct AuditTarget {
    pub cluster_id: Uuid,
    pub resource: ResourceDescriptor,
    pub params: Option<Value>,
}

impl AuditTarget {
    pub fn new(cluster_id: Uuid, resource: ResourceDescriptor) -> Self {
        Self {
            cluster_id,
            resource,
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// What happened to the audit side effect of one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditAttempt {
    Recorded,
    Skipped(String),
    Failed(String),
    Queued,
}

/// Wraps write dispatches and persists one audit record per call.
///
/// The wrapped call's result is returned exactly as produced. Anything
/// that goes wrong while writing the record (store errors, timeouts,
/// panics) is logged and dropped.
pub struct AuditRecorder {
    audits: Arc<dyn AuditStore>,
    clusters: Arc<dyn ClusterStore>,
    enabled: bool,
    delivery: AuditDelivery,
    persist_timeout: Duration,
}

impl AuditRecorder {
    pub fn new(audits: Arc<dyn AuditStore>, clusters: Arc<dyn ClusterStore>, config: &AppConfig) -> Self {
        Self {
            audits,
            clusters,
            enabled: config.security.enable_audit_logging,
            delivery: config.audit.delivery,
            persist_timeout: config.audit.persist_timeout(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn record<T, E, F>(
        &self,
        ctx: &RequestContext,
        mark: AuditMark,
        target: AuditTarget,
        call: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: Serialize,
        E: Display,
    {
        if !self.enabled {
            return call.await;
        }

        let operation_at = Utc::now();
        let outcome = call.await;

        let (status, error_message, result) = match &outcome {
            Ok(value) => {
                let result = if mark.capture_result {
                    serde_json::to_value(value).ok()
                } else {
                    None
                };
                (AuditStatus::Success, None, result)
            }
            Err(e) => (AuditStatus::Failure, Some(e.to_string()), None),
        };

        let attempt = match ctx.principal.clone() {
            Some(principal) => {
                let job = PersistJob {
                    audits: self.audits.clone(),
                    clusters: self.clusters.clone(),
                    principal,
                    client_ip: ctx.client_ip.clone(),
                    user_agent: ctx.user_agent.clone(),
                    mark,
                    target,
                    status,
                    error_message,
                    result,
                    operation_at,
                };
                self.deliver(job).await
            }
            None => {
                warn!(
                    "Skipping audit of {} on cluster {}: no authenticated principal",
                    mark.operation, target.cluster_id
                );
                AuditAttempt::Skipped("no principal".to_string())
            }
        };
        debug!("Audit attempt for {}: {:?}", mark.operation, attempt);

        outcome
    }

    async fn deliver(&self, job: PersistJob) -> AuditAttempt {
        match self.delivery {
            AuditDelivery::Inline => guarded(job, self.persist_timeout).await,
            AuditDelivery::Background => {
                let timeout = self.persist_timeout;
                tokio::spawn(async move {
                    guarded(job, timeout).await;
                });
                AuditAttempt::Queued
            }
        }
    }
}

struct PersistJob {
    audits: Arc<dyn AuditStore>,
    clusters: Arc<dyn ClusterStore>,
    principal: Principal,
    client_ip: Option<String>,
    user_agent: Option<String>,
    mark: AuditMark,
    target: AuditTarget,
    status: AuditStatus,
    error_message: Option<String>,
    result: Option<Value>,
    operation_at: DateTime<Utc>,
}

impl PersistJob {
    fn context(&self) -> String {
        format!(
            "operation={} resource={} actor={} cluster={}",
            self.mark.operation,
            self.target.resource.resource_name(),
            self.principal.username,
            self.target.cluster_id
        )
    }

    fn details(&self) -> Option<Value> {
        let mut details = Map::new();
        if let Some(extra) = &self.target.resource.details {
            details.insert("resource".to_string(), extra.clone());
        }
        if self.mark.capture_params {
            if let Some(params) = &self.target.params {
                details.insert("params".to_string(), params.clone());
            }
        }
        if let Some(result) = &self.result {
            details.insert("result".to_string(), result.clone());
        }
        if details.is_empty() {
            None
        } else {
            Some(Value::Object(details))
        }
    }

    async fn run(self) -> AuditAttempt {
        let cluster_name = match self.clusters.get_connection(self.target.cluster_id).await {
            Ok(Some(connection)) => connection.name,
            Ok(None) => {
                warn!("Skipping audit, cluster not found: {}", self.context());
                return AuditAttempt::Skipped("cluster not found".to_string());
            }
            Err(e) => {
                warn!("Skipping audit, cluster lookup failed ({}): {}", e, self.context());
                return AuditAttempt::Skipped(format!("cluster lookup failed: {}", e));
            }
        };

        let record = AuditRecord {
            id: Uuid::new_v4(),
            user_id: self.principal.id,
            username: self.principal.username.clone(),
            cluster_id: self.target.cluster_id,
            cluster_name,
            operation: self.mark.operation,
            resource_type: self.target.resource.resource_type,
            resource_name: self.target.resource.resource_name().to_string(),
            vhost: self.target.resource.vhost.clone(),
            details: self.details(),
            status: self.status,
            error_message: self.error_message.clone(),
            operation_at: self.operation_at,
            client_ip: self.client_ip.clone(),
            user_agent: self.user_agent.clone(),
            created_at: Utc::now(),
        };

        match self.audits.insert_audit(&record).await {
            Ok(()) => AuditAttempt::Recorded,
            Err(e) => {
                error!("Failed to persist audit record ({}): {}", e, self.context());
                AuditAttempt::Failed(e.to_string())
            }
        }
    }
}

/// Run one persistence attempt with a deadline, turning panics into a
/// logged failure
async fn guarded(job: PersistJob, timeout: Duration) -> AuditAttempt {
    let context = job.context();
    let attempt = AssertUnwindSafe(job.run()).catch_unwind();

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(attempt)) => attempt,
        Ok(Err(panic)) => {
            let message = panic
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Audit persistence panicked ({}): {}", message, context);
            AuditAttempt::Failed(format!("panic: {}", message))
        }
        Err(_) => {
            error!("Audit persistence timed out after {:?}: {}", timeout, context);
            AuditAttempt::Failed("timed out".to_string())
        }
    }
}
