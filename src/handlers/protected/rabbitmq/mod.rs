// handlers/protected/rabbitmq/mod.rs - Proxied management API operations
//
// Every handler resolves the cluster from the path and hands the request
// context to the broker service; responses are relayed raw. Vhost path
// segments arrive percent-decoded, so `%2F` reaches the service as `/`.

pub mod bindings;
pub mod cluster;
pub mod exchanges;
pub mod queues;

use axum::Json;
use serde_json::{json, Value};

/// Optional JSON body; a missing or unparsable body counts as `{}`
pub(crate) fn body_or_empty(body: Option<Json<Value>>) -> Value {
    body.map(|Json(value)| value).unwrap_or_else(|| json!({}))
}
