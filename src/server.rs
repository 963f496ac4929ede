//! Router assembly.
//!
//! Full-path routes cover every valid identifier shape; the fallback turns
//! paths that stop short of (or run past) a module's shape into the
//! structured 400 the identifier resolver defines, so a client always gets
//! a machine-parseable reason instead of a bare 404.

use crate::endpoints::{cdrs, commands, locations, sessions, tariffs, tokens};
use crate::envelope::{self, Envelope};
use crate::error::OcpiStatus;
use crate::ident::PathError;
use crate::model::ModuleId;
use crate::state::AppState;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::str::FromStr;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/locations/{cc}/{pid}",
            get(locations::list).options(locations::collection_options),
        )
        .route(
            "/locations/{cc}/{pid}/{location_id}",
            get(locations::get)
                .put(locations::put)
                .patch(locations::patch)
                .options(locations::resource_options),
        )
        .route(
            "/locations/{cc}/{pid}/{location_id}/{evse_uid}",
            get(locations::get_evse)
                .put(locations::put_evse)
                .patch(locations::patch_evse)
                .options(locations::resource_options),
        )
        .route(
            "/locations/{cc}/{pid}/{location_id}/{evse_uid}/{connector_id}",
            get(locations::get_connector)
                .put(locations::put_connector)
                .patch(locations::patch_connector)
                .options(locations::resource_options),
        )
        .route(
            "/tariffs/{cc}/{pid}",
            get(tariffs::list).options(tariffs::collection_options),
        )
        .route(
            "/tariffs/{cc}/{pid}/{tariff_id}",
            get(tariffs::get)
                .put(tariffs::put)
                .patch(tariffs::patch)
                .delete(tariffs::delete)
                .options(tariffs::resource_options),
        )
        .route(
            "/sessions/{cc}/{pid}",
            get(sessions::list).options(sessions::collection_options),
        )
        .route(
            "/sessions/{cc}/{pid}/{session_id}",
            get(sessions::get)
                .put(sessions::put)
                .patch(sessions::patch)
                .options(sessions::resource_options),
        )
        .route(
            "/cdrs/{cc}/{pid}",
            get(cdrs::list).options(cdrs::collection_options),
        )
        .route(
            "/cdrs/{cc}/{pid}/{cdr_id}",
            get(cdrs::get)
                .put(cdrs::put)
                .patch(cdrs::patch)
                .options(cdrs::resource_options),
        )
        .route(
            "/tokens/{token_uid}",
            get(tokens::get_legacy).options(tokens::legacy_options),
        )
        .route(
            "/tokens/{cc}/{pid}",
            get(tokens::list).options(tokens::collection_options),
        )
        .route(
            "/tokens/{cc}/{pid}/{token_uid}",
            get(tokens::get)
                .put(tokens::put)
                .patch(tokens::patch)
                .delete(tokens::delete)
                .options(tokens::resource_options),
        )
        .route(
            "/commands/{command_type}",
            post(commands::post).options(commands::options),
        )
        .route("/health", get(crate::health::liveness_handler))
        .route("/ready", get(crate::health::readiness_handler))
        .route("/metrics", get(metrics_handler))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(path_fallback)
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> (StatusCode, String) {
    let metrics_text = crate::metrics::METRICS.encode();
    (StatusCode::OK, metrics_text)
}

async fn method_not_allowed() -> Response {
    envelope::method_not_allowed("OPTIONS, GET, PUT, PATCH, DELETE, POST")
}

/// Valid post-module segment counts per module.
fn arity_bounds(module: ModuleId) -> (usize, usize) {
    match module {
        ModuleId::Locations => (2, 5),
        ModuleId::Tariffs | ModuleId::Sessions | ModuleId::Cdrs => (2, 3),
        ModuleId::Tokens => (1, 3),
        ModuleId::Commands => (1, 1),
    }
}

async fn path_fallback(uri: Uri) -> Response {
    let segments: Vec<&str> = uri
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let Some((module_raw, rest)) = segments.split_first() else {
        return unknown_path();
    };
    let Ok(module) = ModuleId::from_str(&module_raw.to_ascii_lowercase()) else {
        return unknown_path();
    };

    let (min, max) = arity_bounds(module);
    let error = if rest.len() < min {
        PathError::Insufficient {
            expected: min,
            found: rest.len(),
        }
    } else {
        PathError::Trailing {
            expected: max,
            found: rest.len(),
        }
    };
    crate::error::OcpiError::from(error).into_response()
}

fn unknown_path() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(Envelope::error(OcpiStatus::UnknownResource, "unknown path")),
    )
        .into_response()
}
