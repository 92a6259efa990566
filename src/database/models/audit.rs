use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of audited write operations. The serialized names are part
/// of the stored record format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    CreateExchange,
    DeleteExchange,
    CreateQueue,
    DeleteQueue,
    PurgeQueue,
    CreateBindingExchange,
    CreateBindingQueue,
    DeleteBinding,
    PublishMessageExchange,
    PublishMessageQueue,
    MoveMessagesQueue,
}

impl OperationType {
    pub const ALL: [OperationType; 11] = [
        OperationType::CreateExchange,
        OperationType::DeleteExchange,
        OperationType::CreateQueue,
        OperationType::DeleteQueue,
        OperationType::PurgeQueue,
        OperationType::CreateBindingExchange,
        OperationType::CreateBindingQueue,
        OperationType::DeleteBinding,
        OperationType::PublishMessageExchange,
        OperationType::PublishMessageQueue,
        OperationType::MoveMessagesQueue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::CreateExchange => "CREATE_EXCHANGE",
            OperationType::DeleteExchange => "DELETE_EXCHANGE",
            OperationType::CreateQueue => "CREATE_QUEUE",
            OperationType::DeleteQueue => "DELETE_QUEUE",
            OperationType::PurgeQueue => "PURGE_QUEUE",
            OperationType::CreateBindingExchange => "CREATE_BINDING_EXCHANGE",
            OperationType::CreateBindingQueue => "CREATE_BINDING_QUEUE",
            OperationType::DeleteBinding => "DELETE_BINDING",
            OperationType::PublishMessageExchange => "PUBLISH_MESSAGE_EXCHANGE",
            OperationType::PublishMessageQueue => "PUBLISH_MESSAGE_QUEUE",
            OperationType::MoveMessagesQueue => "MOVE_MESSAGES_QUEUE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == value)
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of broker object an audited operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Exchange,
    Queue,
    Binding,
    Message,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Exchange => "EXCHANGE",
            ResourceType::Queue => "QUEUE",
            ResourceType::Binding => "BINDING",
            ResourceType::Message => "MESSAGE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "EXCHANGE" => Some(ResourceType::Exchange),
            "QUEUE" => Some(ResourceType::Queue),
            "BINDING" => Some(ResourceType::Binding),
            "MESSAGE" => Some(ResourceType::Message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failure,
    Partial,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Failure => "FAILURE",
            AuditStatus::Partial => "PARTIAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUCCESS" => Some(AuditStatus::Success),
            "FAILURE" => Some(AuditStatus::Failure),
            "PARTIAL" => Some(AuditStatus::Partial),
            _ => None,
        }
    }
}

/// Immutable record of one attempted write against a cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub cluster_id: Uuid,
    pub cluster_name: String,
    pub operation: OperationType,
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub vhost: Option<String>,
    pub details: Option<serde_json::Value>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub operation_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for listing audit records, newest first
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub user_id: Option<Uuid>,
    pub cluster_id: Option<Uuid>,
    pub operation: Option<OperationType>,
    pub status: Option<AuditStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditFilter {
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.user_id.map_or(true, |id| record.user_id == id)
            && self.cluster_id.map_or(true, |id| record.cluster_id == id)
            && self.operation.map_or(true, |op| record.operation == op)
            && self.status.map_or(true, |s| record.status == s)
            && self.since.map_or(true, |t| record.operation_at >= t)
            && self.until.map_or(true, |t| record.operation_at <= t)
    }

    /// Clamp limit and offset to sane bounds
    pub fn page(&self, max_limit: i64) -> (i64, i64) {
        let limit = self.limit.unwrap_or(max_limit).clamp(1, max_limit.max(1));
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_match_stored_format() {
        let names: Vec<String> = OperationType::ALL
            .iter()
            .map(|op| serde_json::to_value(op).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "CREATE_EXCHANGE",
                "DELETE_EXCHANGE",
                "CREATE_QUEUE",
                "DELETE_QUEUE",
                "PURGE_QUEUE",
                "CREATE_BINDING_EXCHANGE",
                "CREATE_BINDING_QUEUE",
                "DELETE_BINDING",
                "PUBLISH_MESSAGE_EXCHANGE",
                "PUBLISH_MESSAGE_QUEUE",
                "MOVE_MESSAGES_QUEUE",
            ]
        );
        for op in OperationType::ALL {
            assert_eq!(OperationType::parse(op.as_str()), Some(op));
            assert_eq!(serde_json::to_value(op).unwrap(), serde_json::json!(op.as_str()));
        }
    }

    #[test]
    fn page_clamps_limit() {
        let filter = AuditFilter {
            limit: Some(10_000),
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(filter.page(100), (100, 0));
        assert_eq!(AuditFilter::default().page(50), (50, 0));
    }
}
