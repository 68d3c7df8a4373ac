//! HTTP router for the relying party.

use std::sync::Arc;

use axum::{Json, Router, response::IntoResponse, routing::get};
use tower_http::trace::TraceLayer;

use super::oauth::OidcFlow;

/// Create the full application router: login, callback and health check.
pub fn create_router(flow: Arc<OidcFlow>) -> Router {
    let router = Router::new().route("/health", get(health_check));

    flow.install(router).layer(TraceLayer::new_for_http())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
