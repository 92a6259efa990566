use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use super::authorizer::{Authorizer, Decision};
use super::error::ProxyError;
use super::operation::{Operation, UpstreamResponse};
use super::pool::ClientPool;
use crate::types::Principal;

/// Longest upstream body kept in an error value
const MAX_ERROR_BODY: usize = 8 * 1024;

/// Sole entry point for proxied calls, reads and writes alike
pub struct Dispatcher {
    authorizer: Authorizer,
    pool: Arc<ClientPool>,
}

impl Dispatcher {
    pub fn new(authorizer: Authorizer, pool: Arc<ClientPool>) -> Self {
        Self { authorizer, pool }
    }

    pub async fn dispatch(
        &self,
        principal: &Principal,
        cluster_id: Uuid,
        op: &Operation,
    ) -> Result<UpstreamResponse, ProxyError> {
        // 1. Authorization; nothing upstream happens on denial
        match self.authorizer.authorize(principal, cluster_id).await? {
            Decision::Allow => {}
            Decision::Deny(reason) => {
                warn!(
                    "Denied {} {} on cluster {} for {}: {}",
                    op.method,
                    op.display_path(),
                    cluster_id,
                    principal.username,
                    reason
                );
                return Err(ProxyError::AccessDenied { cluster_id, reason });
            }
        }

        // 2. Resolve the pooled client
        let client = self.pool.get_client(cluster_id).await?;

        // 3. Forward unchanged
        let response = client.send(op).await.map_err(|e| {
            warn!("Upstream call {} {} failed: {}", op.method, op.display_path(), e);
            e
        })?;

        // 4. Map the outcome
        map_response(cluster_id, op, response).map_err(|e| {
            match &e {
                ProxyError::UpstreamServerError { status, .. } => error!(
                    "Cluster {} answered {} {} with HTTP {}",
                    cluster_id,
                    op.method,
                    op.display_path(),
                    status
                ),
                ProxyError::UpstreamAuthRejected { status, .. } => warn!(
                    "Cluster {} rejected stored credentials (HTTP {})",
                    cluster_id, status
                ),
                _ => {}
            }
            e
        })
    }
}

/// Translate an upstream HTTP status into the proxy's outcome. Successful
/// responses pass through untouched.
pub fn map_response(
    cluster_id: Uuid,
    op: &Operation,
    response: UpstreamResponse,
) -> Result<UpstreamResponse, ProxyError> {
    match response.status {
        200..=299 => Ok(response),
        401 | 403 => Err(ProxyError::UpstreamAuthRejected {
            cluster_id,
            status: response.status,
        }),
        404 => Err(ProxyError::ResourceNotFound(
            op.resource.clone().unwrap_or_else(|| op.display_path()),
        )),
        500..=599 => Err(ProxyError::UpstreamServerError {
            status: response.status,
            body: truncated_body(&response),
        }),
        // Remaining 4xx plus 1xx/3xx, which the management API never
        // sends on purpose
        status => Err(ProxyError::UpstreamRequestError {
            status,
            body: truncated_body(&response),
        }),
    }
}

fn truncated_body(response: &UpstreamResponse) -> String {
    let text = response.text();
    if text.len() <= MAX_ERROR_BODY {
        return text;
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::operation::rabbitmq;

    fn response(status: u16, body: &str) -> UpstreamResponse {
        UpstreamResponse {
            status,
            content_type: Some("application/json".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn success_passes_through_unchanged() {
        let op = rabbitmq::overview();
        let resp = response(200, r#"{"cluster_name":"rabbit@a"}"#);
        assert_eq!(map_response(Uuid::nil(), &op, resp.clone()).unwrap(), resp);
        let resp = response(204, "");
        assert_eq!(map_response(Uuid::nil(), &op, resp.clone()).unwrap(), resp);
    }

    #[test]
    fn not_found_carries_resource_name() {
        let op = rabbitmq::delete_queue("/", "q1", false, false);
        let err = map_response(Uuid::nil(), &op, response(404, r#"{"error":"Object Not Found"}"#)).unwrap_err();
        assert_eq!(err, ProxyError::ResourceNotFound("q1".to_string()));

        let err = map_response(Uuid::nil(), &rabbitmq::nodes(), response(404, "")).unwrap_err();
        assert_eq!(err, ProxyError::ResourceNotFound("/api/nodes".to_string()));
    }

    #[test]
    fn credential_rejection_is_distinct_from_client_errors() {
        let id = Uuid::new_v4();
        let op = rabbitmq::overview();
        for status in [401, 403] {
            assert_eq!(
                map_response(id, &op, response(status, "")).unwrap_err(),
                ProxyError::UpstreamAuthRejected { cluster_id: id, status }
            );
        }
        assert_eq!(
            map_response(id, &op, response(400, "bad")).unwrap_err(),
            ProxyError::UpstreamRequestError { status: 400, body: "bad".to_string() }
        );
        assert_eq!(
            map_response(id, &op, response(409, "exists")).unwrap_err().kind(),
            "UPSTREAM_REQUEST_ERROR"
        );
        assert_eq!(
            map_response(id, &op, response(302, "")).unwrap_err().kind(),
            "UPSTREAM_REQUEST_ERROR"
        );
    }

    #[test]
    fn server_errors_keep_status_and_truncated_body() {
        let op = rabbitmq::overview();
        let huge = "x".repeat(MAX_ERROR_BODY * 2);
        match map_response(Uuid::nil(), &op, response(503, &huge)).unwrap_err() {
            ProxyError::UpstreamServerError { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body.len(), MAX_ERROR_BODY + 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
