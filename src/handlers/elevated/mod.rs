// handlers/elevated/mod.rs - Administrator handlers
//
// Credential store administration, cluster assignments and the audit trail.
// Routed behind jwt_auth_middleware, validate_user_middleware and
// require_admin_middleware.

pub mod assignments; // /api/clusters/:id/users[/:user_id]
pub mod audits; // GET /api/audits
pub mod clusters; // /api/clusters[/:id]

pub use assignments::{assign as assignment_put, list as assignment_list, unassign as assignment_delete};
pub use audits::list as audit_list;
pub use clusters::{
    create as cluster_create, delete as cluster_delete, list as cluster_list, show as cluster_show,
    test as cluster_test, update as cluster_update,
};
