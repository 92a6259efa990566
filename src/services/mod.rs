pub mod broker_service;
pub mod cluster_service;

pub use broker_service::{BrokerService, Query};
pub use cluster_service::{ClusterService, ServiceError};
