//! HTTP Server
//!
//! axum router over the OAuth endpoints and the block dispatcher.

pub mod routes;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::provider::google::GoogleProvider;
use crate::auth::{guard, AuthGuard, CredentialStore, MemoryCredentialStore, TokenRefresher};
use crate::blocks::BlockRegistry;
use crate::common::{create_http_client, AppError, AppResult};
use crate::config::RelayConfig;
use crate::router::BlockDispatcher;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<BlockDispatcher>,
    pub guard: Arc<AuthGuard>,
    pub refresher: Arc<TokenRefresher>,
    pub store: Arc<dyn CredentialStore>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    /// State with an in-memory credential store.
    pub fn from_config(config: RelayConfig) -> AppResult<Self> {
        let http = create_http_client(config.request_timeout_secs)?;
        Ok(Self::with_store(config, Arc::new(MemoryCredentialStore::new()), http))
    }

    pub fn with_store(
        config: RelayConfig,
        store: Arc<dyn CredentialStore>,
        http: reqwest::Client,
    ) -> Self {
        let provider = Arc::new(GoogleProvider::with_endpoint(
            http.clone(),
            config.token_endpoint.clone(),
        ));
        let refresher = Arc::new(TokenRefresher::new(store.clone(), provider));
        let guard = Arc::new(AuthGuard::new(
            store.clone(),
            refresher.clone(),
            config.token_buffer(),
            config.missing_expiry_is_expired,
        ));
        let registry = Arc::new(BlockRegistry::builtin(&config));
        let dispatcher = Arc::new(BlockDispatcher::new(registry, http));

        Self {
            dispatcher,
            guard,
            refresher,
            store,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let session = Router::new()
        .route("/oauth/session", get(routes::session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_session,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .route("/blocks", get(routes::list_blocks))
        .route("/oauth/callback", post(routes::callback))
        .route("/oauth/refresh", post(routes::refresh))
        .route("/oauth/logout", post(routes::logout))
        .route("/block/execute", post(routes::execute))
        .merge(session)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: RelayConfig) -> AppResult<()> {
    let addr = config.listen_addr.clone();
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    info!("blockrelay listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))
}
