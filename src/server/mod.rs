//! Router assembly and the HTTP server loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    error_handling::HandleErrorLayer,
    http::{HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    BoxError, Extension, Router,
};
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

use crate::access::RoleTable;
use crate::auth::{AuthProvider, JwtAuthProvider, OidcAuthProvider};
use crate::config::{AppConfig, ProviderKind, ServerConfig, StoreKind};
use crate::database::{MemoryStore, PgStore, Store};
use crate::error::ApiError;
use crate::gate::AuthorizationGate;
use crate::handlers::{home, resource};
use crate::middleware::{request_id_middleware, ResourceRoute};
use crate::resource::ResourceRegistry;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthorizationGate>,
    pub registry: Arc<ResourceRegistry>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(gate: AuthorizationGate, store: Arc<dyn Store>) -> Self {
        Self {
            registry: gate.registry().clone(),
            gate: Arc::new(gate),
            store,
        }
    }
}

fn resource_routes(prefix: &str, name: &'static str) -> Router<AppState> {
    Router::new()
        .route(
            &format!("{}/{}", prefix, name),
            get(resource::list).post(resource::create),
        )
        .route(
            &format!("{}/{}/:id", prefix, name),
            get(resource::get).put(resource::update).delete(resource::delete),
        )
        .layer(Extension(ResourceRoute(name)))
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::request_timeout("request timed out")
    } else {
        tracing::error!("Unhandled middleware error: {}", err);
        ApiError::internal_server_error("An error occurred while processing your request")
    }
}

/// Build the application router: one route pair per registered resource, the
/// public index and health routes, and static files for everything else.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let prefix = config.api_prefix();

    let mut app = Router::new()
        .route(&format!("{}/", prefix), get(home::index))
        .route("/health", get(home::health));
    for name in state.registry.names() {
        app = app.merge(resource_routes(&prefix, name));
    }
    if let Some(dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    // Request id span outermost so trace and timeout events carry it.
    let mut app = app.layer(
        ServiceBuilder::new()
            .layer(from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .timeout(config.request_timeout()),
    );
    if config.enable_cors {
        app = app.layer(cors_layer(config));
    }
    app.with_state(state)
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.database.store {
        StoreKind::Memory => {
            info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Postgres => {
            let store = PgStore::connect(
                &config.database.url,
                config.database.max_connections,
                Duration::from_secs(config.database.connection_timeout),
            )
            .await
            .context("failed to connect to PostgreSQL")?;
            Arc::new(store)
        }
    };
    Ok(store)
}

fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn AuthProvider>> {
    let provider: Arc<dyn AuthProvider> = match config.auth.provider {
        ProviderKind::Jwt => {
            info!("Validating bearer tokens with the shared JWT secret");
            Arc::new(JwtAuthProvider::new(&config.auth.jwt_secret).context("RESPITE_JWT_SECRET")?)
        }
        ProviderKind::Oidc => {
            let provider = OidcAuthProvider::new(
                &config.auth.oidc_issuer_url,
                config.auth.oidc_client_id.clone(),
                config.auth.oidc_client_secret.clone(),
                Duration::from_secs(config.auth.validation_timeout_secs),
            )
            .context("OIDC_ISSUER_URL")?;
            info!("Validating bearer tokens via {}", provider.introspect_url());
            Arc::new(provider)
        }
    };
    Ok(provider)
}

/// Role table from `RESPITE_ROLE_PERMISSIONS_FILE`, or `fallback` when unset.
pub fn load_roles(config: &AppConfig, fallback: RoleTable) -> anyhow::Result<RoleTable> {
    match &config.auth.role_permissions_file {
        Some(path) => {
            let roles = RoleTable::from_file(path)?;
            info!("Loaded {} roles from {}", roles.len(), path);
            Ok(roles)
        }
        None => Ok(fallback),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Connect collaborators and serve until ctrl-c / SIGTERM.
pub async fn serve(config: &AppConfig, registry: ResourceRegistry, roles: RoleTable) -> anyhow::Result<()> {
    let store = build_store(config).await?;
    let provider = build_provider(config)?;
    let registry = Arc::new(registry);

    let gate = AuthorizationGate::new(
        provider,
        store.clone(),
        registry.clone(),
        Arc::new(roles),
        config.server.page_bounds(),
    )
    .with_validation_timeout(Duration::from_secs(config.auth.validation_timeout_secs));
    let state = AppState::new(gate, store.clone());
    let app = router(state, &config.server);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(
        "respite listening on http://{}{}/ serving {:?}",
        bind_addr,
        config.server.api_prefix(),
        registry.names()
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");
    store.close().await;
    served
}
