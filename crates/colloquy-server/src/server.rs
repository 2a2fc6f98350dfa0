//! `ColloquyServer` — axum HTTP server wiring store, coordinator, and routes.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use colloquy_runtime::{ReasoningEngine, RunCoordinator};
use colloquy_store::SessionStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::handlers::{runs, sessions};
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session store and event log.
    pub store: Arc<SessionStore>,
    /// Run coordinator.
    pub coordinator: Arc<RunCoordinator>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: ServerConfig,
}

/// The main server.
pub struct ColloquyServer {
    config: ServerConfig,
    store: Arc<SessionStore>,
    coordinator: Arc<RunCoordinator>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl ColloquyServer {
    /// Create a new server over the given store and reasoning engine.
    pub fn new(
        config: ServerConfig,
        store: Arc<SessionStore>,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Self {
        let coordinator = Arc::new(RunCoordinator::new(Arc::clone(&store), engine));
        Self {
            config,
            store,
            coordinator,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            store: Arc::clone(&self.store),
            coordinator: Arc::clone(&self.coordinator),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            config: self.config.clone(),
        };

        let mut router = Router::new()
            .route(
                "/apps/{app_name}/users/{user_id}/sessions/{session_id}",
                post(sessions::create_session)
                    .get(sessions::get_session)
                    .delete(sessions::delete_session),
            )
            .route(
                "/apps/{app_name}/users/{user_id}/sessions",
                get(sessions::list_sessions),
            )
            .route("/run", post(runs::run_batch))
            .route("/run_sse", post(runs::run_sse))
            .route("/health", get(health_handler))
            .layer(TraceLayer::new_for_http());

        if self.config.cors {
            router = router.layer(CorsLayer::permissive());
        }

        router.with_state(state)
    }

    /// Bind and serve until the shutdown token fires.
    pub async fn serve(&self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening");

        let token = self.shutdown.token();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(token.cancelled_owned())
            .await
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the session store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Get the run coordinator.
    pub fn coordinator(&self) -> &Arc<RunCoordinator> {
        &self.coordinator
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let sessions = state.store.session_count().unwrap_or(0);
    let resp = health::health_check(state.start_time, state.coordinator.active_runs(), sessions);
    Json(resp)
}
