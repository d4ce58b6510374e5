//! Control surface routes.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use herald_outreach::Outreach;

use crate::{StatusResponse, WebError};

/// Shared state for the control surface.
pub struct AppState {
    pub outreach: Arc<Outreach>,
}

impl AppState {
    pub fn new(outreach: Arc<Outreach>) -> Self {
        Self { outreach }
    }
}

/// Create the control surface router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/trigger", post(handle_trigger))
        .route("/reset", post(handle_reset))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(state.outreach.status().await.into())
}

/// Run one attempt now, bypassing spacing and the daily target.
///
/// The attempt runs in its own task so a panicking collaborator surfaces as a
/// 500 instead of tearing down the connection.
async fn handle_trigger(State(state): State<Arc<AppState>>) -> Response {
    let outreach = Arc::clone(&state.outreach);
    match tokio::spawn(async move { outreach.trigger().await }).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            error!(error = %e, "triggered attempt did not complete");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "attempt did not complete" })),
            )
                .into_response()
        }
    }
}

/// Clear today's counter. The provider cap and ledger are untouched.
async fn handle_reset(State(state): State<Arc<AppState>>) -> Response {
    match state.outreach.reset_daily().await {
        Ok(()) => {
            info!("daily counter reset via control surface");
            (StatusCode::OK, Json(json!({ "status": "reset", "daily_count": 0 }))).into_response()
        }
        Err(denial) => (StatusCode::CONFLICT, Json(denial)).into_response(),
    }
}

async fn handle_health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })),
    )
}

/// Serve the control surface on `port` until `shutdown` resolves.
pub async fn run_server(
    state: Arc<AppState>,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), WebError> {
    let router = create_router(state);
    let addr = format!("0.0.0.0:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| WebError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!("control surface listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
