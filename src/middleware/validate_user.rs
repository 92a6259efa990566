use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use super::auth::AuthUser;
use crate::app::AppState;
use crate::error::ApiError;
use crate::types::{Principal, RequestContext};

/// Middleware that resolves the principal behind the JWT against the user
/// store. Runs on every request so role changes and deactivation apply
/// without waiting for token expiry.
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Get AuthUser from JWT middleware
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let user = state.users.find_user(auth_user.user_id).await?.ok_or_else(|| {
        tracing::warn!(
            "User validation failed: user '{}' (ID: {}) not found",
            auth_user.username,
            auth_user.user_id
        );
        ApiError::unauthorized("User no longer exists")
    })?;

    if !user.is_active {
        tracing::warn!("User validation failed: user '{}' is inactive", user.username);
        return Err(ApiError::unauthorized("User is inactive"));
    }

    let principal = user.principal();
    let context = RequestContext {
        principal: Some(principal.clone()),
        client_ip: client_ip(request.headers(), request.extensions().get::<ConnectInfo<SocketAddr>>()),
        user_agent: request
            .headers()
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    tracing::debug!("User validation successful: {} ({})", principal.username, principal.role);

    request.extensions_mut().insert(principal);
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Reject non-administrators. Must run after `validate_user_middleware`.
pub async fn require_admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| ApiError::unauthorized("User validation required before role check"))?;

    if !principal.is_admin() {
        tracing::warn!("Administrator route refused for user '{}'", principal.username);
        return Err(ApiError::forbidden("Administrator role required"));
    }

    Ok(next.run(request).await)
}

/// First hop of X-Forwarded-For, else the socket peer
fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let peer = ConnectInfo(SocketAddr::from(([192, 168, 1, 5], 40000)));
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("192.168.1.5"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("203.0.113.9"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
