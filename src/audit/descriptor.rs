use serde::Serialize;
use serde_json::{json, Value};

use crate::database::models::ResourceType;
use crate::proxy::DestinationType;

/// Recorded when a call site could not name its target
pub const UNKNOWN_RESOURCE: &str = "<unknown>";

/// Explicit description of the broker object an audited call touches,
/// supplied by the call site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDescriptor {
    pub resource_type: ResourceType,
    pub vhost: Option<String>,
    pub name: String,
    pub details: Option<Value>,
}

impl ResourceDescriptor {
    pub fn new(resource_type: ResourceType, vhost: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            vhost: vhost.map(str::to_string),
            name: name.into(),
            details: None,
        }
    }

    pub fn queue(vhost: &str, name: &str) -> Self {
        Self::new(ResourceType::Queue, Some(vhost), name)
    }

    pub fn exchange(vhost: &str, name: &str) -> Self {
        Self::new(ResourceType::Exchange, Some(vhost), name)
    }

    /// Binding named `source -> destination`; the full routing tuple goes
    /// into details
    pub fn binding(
        vhost: &str,
        source: &str,
        destination_type: DestinationType,
        destination: &str,
        properties_key: Option<&str>,
    ) -> Self {
        let mut details = json!({
            "source": source,
            "destination": destination,
            "destination_type": destination_type,
        });
        if let Some(key) = properties_key {
            details["properties_key"] = Value::String(key.to_string());
        }
        Self::new(ResourceType::Binding, Some(vhost), format!("{} -> {}", source, destination))
            .with_details(details)
    }

    /// Published message, named after the exchange or queue it was sent to
    pub fn message(vhost: &str, target: &str, routing_key: Option<&str>) -> Self {
        let descriptor = Self::new(ResourceType::Message, Some(vhost), target);
        match routing_key {
            Some(key) => descriptor.with_details(json!({ "routing_key": key })),
            None => descriptor,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Name as stored; blank names become the placeholder
    pub fn resource_name(&self) -> &str {
        if self.name.trim().is_empty() {
            UNKNOWN_RESOURCE
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_uses_placeholder() {
        assert_eq!(ResourceDescriptor::queue("/", "  ").resource_name(), UNKNOWN_RESOURCE);
        assert_eq!(ResourceDescriptor::queue("/", "q1").resource_name(), "q1");
    }

    #[test]
    fn binding_details_carry_routing_tuple() {
        let d = ResourceDescriptor::binding("/", "events", DestinationType::Queue, "audit", Some("~"));
        assert_eq!(d.name, "events -> audit");
        let details = d.details.unwrap();
        assert_eq!(details["destination_type"], "queue");
        assert_eq!(details["properties_key"], "~");
    }
}
