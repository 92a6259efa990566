// handlers/elevated/audits.rs - GET /api/audits handler

use axum::extract::{Query, State};

use crate::app::AppState;
use crate::database::models::{AuditFilter, AuditRecord};
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/audits - Newest first
///
/// Filters: `user_id`, `cluster_id`, `operation` (e.g. `DELETE_QUEUE`),
/// `status`, `since`/`until` (RFC 3339), `limit`, `offset`. The limit is
/// capped by `API_MAX_AUDIT_PAGE_SIZE`. Records written in background
/// delivery mode may show up with a short delay.
pub async fn list(State(state): State<AppState>, Query(filter): Query<AuditFilter>) -> ApiResult<Vec<AuditRecord>> {
    let records = state
        .audits
        .list_audits(&filter, state.config.api.max_audit_page_size)
        .await?;
    Ok(ApiResponse::success(records))
}
