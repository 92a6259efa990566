pub mod audit;
pub mod cluster;
pub mod user;

pub use audit::{AuditFilter, AuditRecord, AuditStatus, OperationType, ResourceType};
pub use cluster::{ClusterConnection, ClusterConnectionUpdate, NewClusterConnection};
pub use user::User;
