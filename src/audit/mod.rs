// Write-audit recording for mutating broker operations

pub mod descriptor;
pub mod recorder;

pub use descriptor::{ResourceDescriptor, UNKNOWN_RESOURCE};
pub use recorder::{AuditAttempt, AuditMark, AuditRecorder, AuditTarget};
