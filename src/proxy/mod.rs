// Multi-cluster routing core: pooled upstream clients, per-call
// authorization and the dispatcher that ties them together.

pub mod authorizer;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod operation;
pub mod pool;

pub use authorizer::{Authorizer, Decision};
pub use client::{management_api_root, UpstreamClient};
pub use dispatcher::{map_response, Dispatcher};
pub use error::{DenyReason, ProxyError};
pub use operation::{rabbitmq, DestinationType, Operation, UpstreamResponse};
pub use pool::ClientPool;
