//! Token module: driver tokens pushed by eMSP parties, plus the legacy
//! unscoped lookup by uid alone.

use super::{ListParams, WriteParams, auth_lookup};
use crate::auth;
use crate::envelope;
use crate::error::{OcpiError, OcpiResult};
use crate::ident;
use crate::model::{ModuleId, TokenType};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

pub const COLLECTION_ALLOW: &str = "OPTIONS, GET";
pub const RESOURCE_ALLOW: &str = "OPTIONS, GET, PUT, PATCH, DELETE";
pub const LEGACY_ALLOW: &str = "OPTIONS, GET";

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path((cc, pid)): Path<(String, String)>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let party = ident::party_ref(&cc, &pid)?;
    let path = format!("/tokens/{}/{}", party.country_code, party.party_id);

    let type_filter = params
        .type_filter
        .as_deref()
        .map(|raw| {
            TokenType::from_str(raw).map_err(|_| OcpiError::InvalidQuery {
                name: "type",
                detail: format!("unknown token type {raw:?}"),
            })
        })
        .transpose()?;

    super::list_collection(
        &state,
        state.tokens(),
        &headers,
        &party,
        &params,
        &path,
        move |token| type_filter.is_none_or(|wanted| token.token_type == wanted),
    )
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, uid)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let (party, uid) = ident::token_address(&cc, &pid, &uid)?;
    super::get_one(&state, state.tokens(), &headers, &party, &uid)
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, uid)): Path<(String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let (party, uid) = ident::token_address(&cc, &pid, &uid)?;
    super::put_one(&state, state.tokens(), &headers, &party, &uid, super::json_body(body)?, &params)
}

pub async fn patch(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, uid)): Path<(String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let (party, uid) = ident::token_address(&cc, &pid, &uid)?;
    super::patch_one(&state, state.tokens(), &headers, &party, &uid, super::json_body(body)?, &params)
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, uid)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let (party, uid) = ident::token_address(&cc, &pid, &uid)?;
    super::delete_one(&state, state.tokens(), &headers, &party, &uid)
}

/// Legacy lookup by uid alone. Any trusted peer may resolve a token; the
/// owning party is only known once the record is found.
pub async fn get_legacy(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let uid = ident::bare_token_uid(&uid)?;
    let lookup = auth_lookup(&state, &headers);
    auth::require_known_peer(&lookup)?;

    let stored = state
        .tokens()
        .find(|token| token.uid == uid)
        .ok_or_else(|| OcpiError::not_found(ModuleId::Tokens, &uid))?;

    crate::metrics::METRICS.record_request(ModuleId::Tokens, "success");
    let last_updated = stored.resource.last_updated;
    Ok(envelope::resource(stored.resource, &stored.etag, last_updated))
}

pub async fn collection_options() -> Response {
    envelope::options(COLLECTION_ALLOW)
}

pub async fn resource_options() -> Response {
    envelope::options(RESOURCE_ALLOW)
}

pub async fn legacy_options() -> Response {
    envelope::options(LEGACY_ALLOW)
}
