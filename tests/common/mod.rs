#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

use rabbit_admin_api::app::AppState;
use rabbit_admin_api::auth::{generate_jwt, Claims};
use rabbit_admin_api::config::{AppConfig, AuditDelivery};
use rabbit_admin_api::database::models::{ClusterConnection, NewClusterConnection, User};
use rabbit_admin_api::database::{ClusterStore, MemoryStore};
use rabbit_admin_api::types::{RequestContext, Role};

/// `guest:guest` in basic auth form
pub const GUEST_AUTH: &str = "Basic Z3Vlc3Q6Z3Vlc3Q=";

/// How long the mock sits on `/api/channels` before answering
pub const SLOW_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    /// Path exactly as received, percent-encoding intact
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

struct MockState {
    name: String,
    seen: Mutex<Vec<SeenRequest>>,
}

/// Stand-in for a RabbitMQ management API.
///
/// Only `guest:guest` is accepted. Names starting with `missing` answer 404,
/// `/api/nodes` answers 500, `/api/connections` answers 400 and
/// `/api/channels` is slower than the test request timeout.
pub struct MockRabbit {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockRabbit {
    pub async fn start(name: &str) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let state = Arc::new(MockState {
            name: name.to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let app = Router::new().fallback(mock_handler).with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
        })
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.seen.lock().unwrap().len()
    }
}

async fn mock_handler(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.seen.lock().unwrap().push(SeenRequest {
        method: method.to_string(),
        path: path.clone(),
        query: request.uri().query().map(str::to_string),
        authorization: authorization.clone(),
    });

    if authorization.as_deref() != Some(GUEST_AUTH) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "not_authorised", "reason": "Login failed"})),
        )
            .into_response();
    }

    if path.split('/').any(|segment| segment.starts_with("missing")) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Object Not Found", "reason": "Not Found"})),
        )
            .into_response();
    }

    match (method.as_str(), path.as_str()) {
        ("GET", "/api/overview") => Json(json!({
            "rabbitmq_version": "3.13.0",
            "cluster_name": state.name,
        }))
        .into_response(),
        ("GET", "/api/nodes") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "internal_error", "reason": "node down"})),
        )
            .into_response(),
        ("GET", "/api/connections") => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "bad_request", "reason": "invalid sort column"})),
        )
            .into_response(),
        ("GET", "/api/channels") => {
            tokio::time::sleep(SLOW_DELAY).await;
            Json(json!([])).into_response()
        }
        ("GET", _) => Json(json!([{"served_by": state.name, "path": path}])).into_response(),
        ("PUT", _) => StatusCode::CREATED.into_response(),
        ("DELETE", _) => StatusCode::NO_CONTENT.into_response(),
        ("POST", p) if p.ends_with("/publish") => Json(json!({"routed": true})).into_response(),
        ("POST", _) => (StatusCode::CREATED, [(header::LOCATION, "props")]).into_response(),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// Port nothing listens on
pub fn unreachable_url() -> String {
    let port = portpicker::pick_unused_port().expect("free port");
    format!("http://127.0.0.1:{}", port)
}

/// Development defaults with short upstream timeouts and inline audit writes
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.upstream.connect_timeout_ms = 500;
    config.upstream.request_timeout_ms = 1_000;
    config.audit.delivery = AuditDelivery::Inline;
    config.audit.persist_timeout_ms = 300;
    config.security.jwt_secret = "test-secret".to_string();
    config
}

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::in_memory(config, store.clone());
        Self { store, state }
    }

    pub async fn user(&self, username: &str, role: Role) -> User {
        let user = User::new(username, role);
        self.store.insert_user(user.clone()).await;
        user
    }

    pub async fn cluster(&self, name: &str, api_url: &str) -> ClusterConnection {
        self.cluster_with_credentials(name, api_url, "guest", "guest").await
    }

    pub async fn cluster_with_credentials(
        &self,
        name: &str,
        api_url: &str,
        username: &str,
        password: &str,
    ) -> ClusterConnection {
        self.state
            .cluster_service
            .create_connection(NewClusterConnection {
                name: name.to_string(),
                api_url: api_url.to_string(),
                username: username.to_string(),
                password: password.to_string(),
                is_active: true,
                description: None,
            })
            .await
            .expect("create cluster connection")
    }

    pub async fn assign(&self, user: &User, cluster: &ClusterConnection) {
        self.store.assign(user.id, cluster.id).await.expect("assign user");
    }

    pub fn ctx(&self, user: &User) -> RequestContext {
        RequestContext {
            principal: Some(user.principal()),
            client_ip: Some("10.0.0.7".to_string()),
            user_agent: Some("integration-test".to_string()),
        }
    }

    pub fn token(&self, user: &User) -> String {
        let claims = Claims::for_principal(&user.principal(), 1);
        generate_jwt(&claims, &self.state.config.security.jwt_secret).expect("sign token")
    }
}
