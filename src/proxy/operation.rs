// Logical operations against a RabbitMQ management API and the raw
// upstream response relayed back to callers.

use reqwest::Method;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One upstream call: method, path below `/api`, query string and body.
///
/// Path segments are kept unencoded; the client percent-encodes each one,
/// so a vhost of `/` travels as `%2F`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Name reported by `ResourceNotFound` when upstream answers 404
    pub resource: Option<String>,
}

impl Operation {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
            resource: None,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::GET, segments)
    }

    pub fn put<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::PUT, segments)
    }

    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::POST, segments)
    }

    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::DELETE, segments)
    }

    pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Readable path for logs, e.g. `/api/queues///q1`
    pub fn display_path(&self) -> String {
        format!("/api/{}", self.segments.join("/"))
    }
}

/// Upstream answer passed through without reinterpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    /// Parse the body as JSON; an empty body reads as `null`
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// Serialized form used when a caller asks the audit recorder to keep the
// return value
impl Serialize for UpstreamResponse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("UpstreamResponse", 2)?;
        state.serialize_field("status", &self.status)?;
        match self.json() {
            Ok(value) => state.serialize_field("body", &value)?,
            Err(_) => state.serialize_field("body", &self.text())?,
        }
        state.end()
    }
}

/// Binding destination kind as it appears in management API paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    Queue,
    Exchange,
}

impl DestinationType {
    pub fn path_code(&self) -> &'static str {
        match self {
            DestinationType::Queue => "q",
            DestinationType::Exchange => "e",
        }
    }

    pub fn from_path_code(code: &str) -> Option<Self> {
        match code {
            "q" => Some(DestinationType::Queue),
            "e" => Some(DestinationType::Exchange),
            _ => None,
        }
    }
}

/// Builders for the management API endpoints this service exposes
pub mod rabbitmq {
    use super::{DestinationType, Operation};
    use serde_json::{json, Value};

    /// Exchange used to publish straight to a queue by name
    pub const DEFAULT_EXCHANGE: &str = "amq.default";

    pub fn overview() -> Operation {
        Operation::get(["overview"])
    }

    pub fn nodes() -> Operation {
        Operation::get(["nodes"])
    }

    pub fn vhosts() -> Operation {
        Operation::get(["vhosts"])
    }

    pub fn connections() -> Operation {
        Operation::get(["connections"])
    }

    pub fn channels() -> Operation {
        Operation::get(["channels"])
    }

    pub fn queues(vhost: Option<&str>) -> Operation {
        match vhost {
            Some(vhost) => Operation::get(["queues", vhost]),
            None => Operation::get(["queues"]),
        }
    }

    pub fn queue(vhost: &str, name: &str) -> Operation {
        Operation::get(["queues", vhost, name]).with_resource(name)
    }

    pub fn create_queue(vhost: &str, name: &str, definition: Value) -> Operation {
        Operation::put(["queues", vhost, name])
            .with_body(definition)
            .with_resource(name)
    }

    pub fn delete_queue(vhost: &str, name: &str, if_empty: bool, if_unused: bool) -> Operation {
        let mut op = Operation::delete(["queues", vhost, name]).with_resource(name);
        if if_empty {
            op = op.with_query([("if-empty", "true")]);
        }
        if if_unused {
            op = op.with_query([("if-unused", "true")]);
        }
        op
    }

    pub fn purge_queue(vhost: &str, name: &str) -> Operation {
        Operation::delete(["queues", vhost, name, "contents"]).with_resource(name)
    }

    /// Fetch messages; the management API only offers this as a POST
    pub fn get_messages(vhost: &str, name: &str, request: Value) -> Operation {
        Operation::post(["queues", vhost, name, "get"])
            .with_body(request)
            .with_resource(name)
    }

    pub fn queue_bindings(vhost: &str, name: &str) -> Operation {
        Operation::get(["queues", vhost, name, "bindings"]).with_resource(name)
    }

    pub fn exchanges(vhost: Option<&str>) -> Operation {
        match vhost {
            Some(vhost) => Operation::get(["exchanges", vhost]),
            None => Operation::get(["exchanges"]),
        }
    }

    pub fn exchange(vhost: &str, name: &str) -> Operation {
        Operation::get(["exchanges", vhost, name]).with_resource(name)
    }

    pub fn create_exchange(vhost: &str, name: &str, definition: Value) -> Operation {
        Operation::put(["exchanges", vhost, name])
            .with_body(definition)
            .with_resource(name)
    }

    pub fn delete_exchange(vhost: &str, name: &str, if_unused: bool) -> Operation {
        let op = Operation::delete(["exchanges", vhost, name]).with_resource(name);
        if if_unused {
            op.with_query([("if-unused", "true")])
        } else {
            op
        }
    }

    pub fn exchange_source_bindings(vhost: &str, name: &str) -> Operation {
        Operation::get(["exchanges", vhost, name, "bindings", "source"]).with_resource(name)
    }

    pub fn publish(vhost: &str, exchange: &str, message: Value) -> Operation {
        Operation::post(["exchanges", vhost, exchange, "publish"])
            .with_body(message)
            .with_resource(exchange)
    }

    /// Publish through the default exchange with the queue name as routing key
    pub fn publish_to_queue(vhost: &str, queue: &str, mut message: Value) -> Operation {
        if let Value::Object(map) = &mut message {
            map.insert("routing_key".to_string(), Value::String(queue.to_string()));
            map.entry("properties").or_insert_with(|| json!({}));
            map.entry("payload_encoding")
                .or_insert_with(|| Value::String("string".to_string()));
        }
        Operation::post(["exchanges", vhost, DEFAULT_EXCHANGE, "publish"])
            .with_body(message)
            .with_resource(queue)
    }

    pub fn bindings(vhost: Option<&str>) -> Operation {
        match vhost {
            Some(vhost) => Operation::get(["bindings", vhost]),
            None => Operation::get(["bindings"]),
        }
    }

    pub fn create_binding(
        vhost: &str,
        source: &str,
        destination_type: DestinationType,
        destination: &str,
        definition: Value,
    ) -> Operation {
        Operation::post(["bindings", vhost, "e", source, destination_type.path_code(), destination])
            .with_body(definition)
            .with_resource(format!("{} -> {}", source, destination))
    }

    pub fn delete_binding(
        vhost: &str,
        source: &str,
        destination_type: DestinationType,
        destination: &str,
        properties_key: &str,
    ) -> Operation {
        Operation::delete([
            "bindings",
            vhost,
            "e",
            source,
            destination_type.path_code(),
            destination,
            properties_key,
        ])
        .with_resource(format!("{} -> {} ({})", source, destination, properties_key))
    }

    /// Move every message currently in `source` to `destination` using a
    /// dynamic shovel that deletes itself once the backlog is drained
    pub fn move_messages(vhost: &str, source: &str, destination: &str) -> Operation {
        let shovel_name = format!("Move from {}", source);
        Operation::put(["parameters", "shovel", vhost, shovel_name.as_str()])
            .with_body(json!({
                "component": "shovel",
                "vhost": vhost,
                "name": shovel_name,
                "value": {
                    "src-protocol": "amqp091",
                    "src-uri": "amqp://",
                    "src-queue": source,
                    "src-delete-after": "queue-length",
                    "dest-protocol": "amqp091",
                    "dest-uri": "amqp://",
                    "dest-queue": destination,
                    "ack-mode": "on-confirm"
                }
            }))
            .with_resource(source)
    }
}

#[cfg(test)]
mod tests {
    use super::rabbitmq;
    use super::*;
    use serde_json::json;

    #[test]
    fn delete_queue_adds_conditions_as_query() {
        let op = rabbitmq::delete_queue("/", "orders", true, false);
        assert_eq!(op.method, Method::DELETE);
        assert_eq!(op.segments, vec!["queues", "/", "orders"]);
        assert_eq!(op.query, vec![("if-empty".to_string(), "true".to_string())]);
        assert_eq!(op.resource.as_deref(), Some("orders"));
    }

    #[test]
    fn publish_to_queue_routes_through_default_exchange() {
        let op = rabbitmq::publish_to_queue("/", "jobs", json!({"payload": "hi"}));
        assert_eq!(op.segments, vec!["exchanges", "/", "amq.default", "publish"]);
        let body = op.body.unwrap();
        assert_eq!(body["routing_key"], "jobs");
        assert_eq!(body["payload_encoding"], "string");
        assert_eq!(body["properties"], json!({}));
    }

    #[test]
    fn binding_paths_use_destination_code() {
        let op = rabbitmq::create_binding("vh", "events", DestinationType::Queue, "audit", json!({}));
        assert_eq!(op.segments, vec!["bindings", "vh", "e", "events", "q", "audit"]);
        let op = rabbitmq::delete_binding("vh", "events", DestinationType::Exchange, "fanout", "~");
        assert_eq!(op.segments, vec!["bindings", "vh", "e", "events", "e", "fanout", "~"]);
    }

    #[test]
    fn move_messages_builds_self_deleting_shovel() {
        let op = rabbitmq::move_messages("/", "dead", "retry");
        assert_eq!(op.segments, vec!["parameters", "shovel", "/", "Move from dead"]);
        let body = op.body.unwrap();
        assert_eq!(body["value"]["src-queue"], "dead");
        assert_eq!(body["value"]["dest-queue"], "retry");
        assert_eq!(body["value"]["src-delete-after"], "queue-length");
    }

    #[test]
    fn upstream_response_serializes_json_or_text_body() {
        let json_resp = UpstreamResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: br#"{"routed":true}"#.to_vec(),
        };
        assert_eq!(
            serde_json::to_value(&json_resp).unwrap(),
            json!({"status": 200, "body": {"routed": true}})
        );

        let text_resp = UpstreamResponse {
            status: 201,
            content_type: None,
            body: b"created".to_vec(),
        };
        assert_eq!(serde_json::to_value(&text_resp).unwrap()["body"], "created");
        assert_eq!(UpstreamResponse { status: 204, content_type: None, body: vec![] }.json().unwrap(), Value::Null);
    }
}
