//! Liveness and readiness probes.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct Liveness {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct Readiness {
    status: &'static str,
    uptime_secs: u64,
    access_bindings: usize,
    stored_resources: usize,
}

pub async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(Liveness { status: "ok" }))
}

pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = Readiness {
        status: "ready",
        uptime_secs: state.uptime().as_secs(),
        access_bindings: state.bindings().len(),
        stored_resources: state.stored_resource_count(),
    };
    (StatusCode::OK, Json(body))
}
