use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::audit::AuditRecorder;
use crate::config::AppConfig;
use crate::database::{AuditStore, ClusterStore, DatabaseError, DatabaseManager, MemoryStore, PgStore, UserStore};
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin_middleware, validate_user_middleware};
use crate::proxy::{Authorizer, ClientPool, Dispatcher};
use crate::services::{BrokerService, ClusterService};

/// Shared application context handed to every handler and middleware.
/// Built once at startup; no component reaches for global state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub clusters: Arc<dyn ClusterStore>,
    pub users: Arc<dyn UserStore>,
    pub audits: Arc<dyn AuditStore>,
    pub pool: Arc<ClientPool>,
    pub cluster_service: Arc<ClusterService>,
    pub broker: Arc<BrokerService>,
    pub database: Option<Arc<DatabaseManager>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        clusters: Arc<dyn ClusterStore>,
        users: Arc<dyn UserStore>,
        audits: Arc<dyn AuditStore>,
    ) -> Self {
        let pool = Arc::new(ClientPool::new(clusters.clone(), config.upstream.clone()));
        let dispatcher = Arc::new(Dispatcher::new(Authorizer::new(clusters.clone()), pool.clone()));
        let recorder = Arc::new(AuditRecorder::new(audits.clone(), clusters.clone(), &config));

        if !recorder.is_enabled() {
            tracing::warn!("Audit logging is disabled; writes will not be recorded");
        }

        Self {
            cluster_service: Arc::new(ClusterService::new(clusters.clone(), users.clone(), pool.clone())),
            broker: Arc::new(BrokerService::new(dispatcher, recorder)),
            config: Arc::new(config),
            clusters,
            users,
            audits,
            pool,
            database: None,
        }
    }

    /// Every store backed by one in-memory instance
    pub fn in_memory(config: AppConfig, store: Arc<MemoryStore>) -> Self {
        Self::new(config, store.clone(), store.clone(), store)
    }

    /// Stores backed by Postgres at `DATABASE_URL`
    pub async fn postgres(config: AppConfig) -> Result<Self, DatabaseError> {
        let database = Arc::new(DatabaseManager::connect(&config.database).await?);
        let store = Arc::new(PgStore::new(database.pool()));

        let mut state = Self::new(config, store.clone(), store.clone(), store);
        state.database = Some(database);
        Ok(state)
    }

    /// Name of the backing store when it is reachable
    pub async fn health_check(&self) -> Result<&'static str, DatabaseError> {
        match &self.database {
            Some(database) => database.health_check().await.map(|_| "postgres"),
            None => Ok("memory"),
        }
    }

    /// Release pooled upstream clients and database connections
    pub async fn shutdown(&self) {
        self.pool.invalidate_all().await;
        if let Some(database) = &self.database {
            database.close().await;
        }
    }
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected API
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
                .layer(cors_layer(&config)),
        );

    let app = if config.api.enable_request_logging {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    };

    app.with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    // Layers run bottom-up: JWT decode, then user validation
    Router::new()
        .route("/api/me/clusters", get(protected::me_clusters))
        .merge(rabbitmq_routes())
        .merge(elevated_routes())
        .layer(from_fn_with_state(state.clone(), validate_user_middleware))
        .layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn elevated_routes() -> Router<AppState> {
    Router::new()
        // Cluster connections
        .route("/api/clusters", get(elevated::cluster_list).post(elevated::cluster_create))
        .route(
            "/api/clusters/:id",
            get(elevated::cluster_show)
                .put(elevated::cluster_update)
                .delete(elevated::cluster_delete),
        )
        .route("/api/clusters/:id/test", post(elevated::cluster_test))
        // Assignments
        .route("/api/clusters/:id/users", get(elevated::assignment_list))
        .route(
            "/api/clusters/:id/users/:user_id",
            put(elevated::assignment_put).delete(elevated::assignment_delete),
        )
        // Audit trail
        .route("/api/audits", get(elevated::audit_list))
        .route_layer(from_fn(require_admin_middleware))
}

fn rabbitmq_routes() -> Router<AppState> {
    use axum::routing::delete;
    use protected::rabbitmq::{bindings, cluster, exchanges, queues};

    Router::new()
        // Cluster-wide reads
        .route("/api/rabbitmq/:cluster/overview", get(cluster::overview))
        .route("/api/rabbitmq/:cluster/nodes", get(cluster::nodes))
        .route("/api/rabbitmq/:cluster/vhosts", get(cluster::vhosts))
        .route("/api/rabbitmq/:cluster/connections", get(cluster::connections))
        .route("/api/rabbitmq/:cluster/channels", get(cluster::channels))
        // Queues
        .route("/api/rabbitmq/:cluster/queues", get(queues::list))
        .route("/api/rabbitmq/:cluster/queues/:vhost", get(queues::list_vhost))
        .route(
            "/api/rabbitmq/:cluster/queues/:vhost/:name",
            get(queues::show).put(queues::create).delete(queues::delete),
        )
        .route("/api/rabbitmq/:cluster/queues/:vhost/:name/contents", delete(queues::purge))
        .route("/api/rabbitmq/:cluster/queues/:vhost/:name/get", post(queues::get_messages))
        .route("/api/rabbitmq/:cluster/queues/:vhost/:name/publish", post(queues::publish))
        .route("/api/rabbitmq/:cluster/queues/:vhost/:name/move", post(queues::move_messages))
        .route("/api/rabbitmq/:cluster/queues/:vhost/:name/bindings", get(queues::bindings))
        // Exchanges
        .route("/api/rabbitmq/:cluster/exchanges", get(exchanges::list))
        .route("/api/rabbitmq/:cluster/exchanges/:vhost", get(exchanges::list_vhost))
        .route(
            "/api/rabbitmq/:cluster/exchanges/:vhost/:name",
            get(exchanges::show).put(exchanges::create).delete(exchanges::delete),
        )
        .route("/api/rabbitmq/:cluster/exchanges/:vhost/:name/publish", post(exchanges::publish))
        .route(
            "/api/rabbitmq/:cluster/exchanges/:vhost/:name/bindings/source",
            get(exchanges::source_bindings),
        )
        // Bindings
        .route("/api/rabbitmq/:cluster/bindings", get(bindings::list))
        .route("/api/rabbitmq/:cluster/bindings/:vhost", get(bindings::list_vhost))
        .route(
            "/api/rabbitmq/:cluster/bindings/:vhost/e/:source/:dest_type/:dest",
            post(bindings::create),
        )
        .route(
            "/api/rabbitmq/:cluster/bindings/:vhost/e/:source/:dest_type/:dest/:props",
            delete(bindings::delete),
        )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
