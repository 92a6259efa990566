// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (JWT + user validation) → Elevated (administrator role)
//
// Protected handlers reach clusters only through the dispatcher, which
// re-checks the caller's assignment on every call.

pub mod elevated; // Tier 3: Administrator role required (/api/clusters/*, /api/audits)
pub mod protected; // Tier 2: JWT authentication required (/api/me/*, /api/rabbitmq/*)
pub mod public; // Tier 1: No authentication required (/, /health)
