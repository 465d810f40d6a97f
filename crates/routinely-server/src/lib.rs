//! routinely-server: HTTP API for tasks, chat, and scheduler control.
//!
//! Routes:
//! - GET /health
//! - GET|POST /api/tasks, GET|PUT|DELETE /api/tasks/{id}
//! - POST /api/tasks/{id}/complete
//! - POST /api/parse (natural language in, created task out)
//! - POST /api/chat
//! - POST /api/scheduler/start|stop|refresh, GET /api/scheduler/status
//! - Bearer token authentication on /api routes

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use routinely_assistant::Assistant;
use routinely_scheduler::Scheduler;
use routinely_storage::TaskStore;

/// Shared server state.
pub struct AppState {
    pub store: Arc<TaskStore>,
    pub scheduler: Arc<Scheduler>,
    pub assistant: Arc<Assistant>,
    pub auth_token: Option<String>,
}

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route(
            "/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/tasks/{id}/complete", post(handlers::complete_task))
        .route("/parse", post(handlers::parse_task))
        .route("/chat", post(handlers::chat))
        .route("/scheduler/start", post(handlers::scheduler_start))
        .route("/scheduler/stop", post(handlers::scheduler_stop))
        .route("/scheduler/refresh", post(handlers::scheduler_refresh))
        .route("/scheduler/status", get(handlers::scheduler_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Server listening on {addr}");
    info!("  API:    http://{addr}/api");
    info!("  Health: http://{addr}/health");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Reject /api requests lacking the configured bearer token.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.auth_token {
        match extract_bearer_token(request.headers()) {
            Some(token) if token == expected => {}
            _ => {
                tracing::warn!("API authentication failed");
                return StatusCode::UNAUTHORIZED.into_response();
            }
        }
    }
    next.run(request).await
}

/// Extract bearer token from Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
