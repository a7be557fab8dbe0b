//! Liveness and readiness routes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::instrument;

use crate::state::AppState;

/// Liveness page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub store_name: String,
    pub version: &'static str,
}

/// Display the liveness page.
#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> HomeTemplate {
    HomeTemplate {
        store_name: state.config().store_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness endpoint reporting the pending-order backlog.
#[instrument(skip(state))]
pub async fn ready(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ready",
        "pendingOrders": state.pending().len().await,
        "emailTransport": state.notifier().transport_name(),
    }))
}
