//! Session module.

use super::{ListParams, WriteParams};
use crate::envelope;
use crate::error::OcpiResult;
use crate::ident;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::Value;
use std::sync::Arc;

pub const COLLECTION_ALLOW: &str = "OPTIONS, GET";
pub const RESOURCE_ALLOW: &str = "OPTIONS, GET, PUT, PATCH";

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path((cc, pid)): Path<(String, String)>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let party = ident::party_ref(&cc, &pid)?;
    let path = format!("/sessions/{}/{}", party.country_code, party.party_id);
    super::list_collection(
        &state,
        state.sessions(),
        &headers,
        &party,
        &params,
        &path,
        |_| true,
    )
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let (party, id) = ident::session_address(&cc, &pid, &id)?;
    super::get_one(&state, state.sessions(), &headers, &party, &id)
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, id)): Path<(String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let (party, id) = ident::session_address(&cc, &pid, &id)?;
    super::put_one(&state, state.sessions(), &headers, &party, &id, super::json_body(body)?, &params)
}

pub async fn patch(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, id)): Path<(String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let (party, id) = ident::session_address(&cc, &pid, &id)?;
    super::patch_one(&state, state.sessions(), &headers, &party, &id, super::json_body(body)?, &params)
}

pub async fn collection_options() -> Response {
    envelope::options(COLLECTION_ALLOW)
}

pub async fn resource_options() -> Response {
    envelope::options(RESOURCE_ALLOW)
}
