//! Router assembly.
//!
//! `GET /health` answers keepalive probes with a plain `OK`; every other
//! path upgrades to the whiteboard WebSocket protocol.

pub mod ws;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .fallback(get(ws::handle_ws))
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "OK")
}
