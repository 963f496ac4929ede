//! Per-module HTTP handlers.
//!
//! Every handler composes the same pipeline: resolve identifiers, pass the
//! access gate, then hand off to the query or upsert engine. A component
//! that fails produces the terminal envelope response; only full success
//! reaches the next stage.

pub mod cdrs;
pub mod commands;
pub mod locations;
pub mod sessions;
pub mod tariffs;
pub mod tokens;

use crate::auth::{self, TokenLookup};
use crate::envelope;
use crate::error::{OcpiError, OcpiResult};
use crate::model::{ModuleResource, PartyRef};
use crate::query::{self, ListQuery};
use crate::state::AppState;
use crate::store::ModuleStore;
use crate::upsert;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Raw query parameters. Everything arrives as a string and is parsed
/// explicitly so a malformed value is answered with the envelope, not a
/// transport-level rejection; absent and malformed stay distinct.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "match")]
    pub match_text: Option<String>,
    /// Role-specific filter, only honored by the tokens collection.
    #[serde(rename = "type")]
    pub type_filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    pub allow_downgrades: Option<String>,
}

pub(crate) fn auth_lookup(state: &AppState, headers: &HeaderMap) -> TokenLookup {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    state.bindings().resolve(header)
}

pub(crate) fn json_body(body: Result<axum::Json<Value>, JsonRejection>) -> OcpiResult<Value> {
    body.map(|json| json.0)
        .map_err(|rejection| OcpiError::invalid_body(rejection.body_text()))
}

fn parse_date(name: &'static str, raw: &str) -> OcpiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OcpiError::InvalidQuery {
            name,
            detail: e.to_string(),
        })
}

fn parse_count(name: &'static str, raw: &str) -> OcpiResult<usize> {
    raw.parse().map_err(|_| OcpiError::InvalidQuery {
        name,
        detail: format!("expected a non-negative integer, got {raw:?}"),
    })
}

pub(crate) fn parse_allow_downgrades(params: &WriteParams) -> OcpiResult<Option<bool>> {
    params
        .allow_downgrades
        .as_deref()
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(OcpiError::InvalidQuery {
                name: "allow_downgrades",
                detail: format!("expected true or false, got {other:?}"),
            }),
        })
        .transpose()
}

pub(crate) fn build_query(state: &AppState, params: &ListParams) -> OcpiResult<ListQuery> {
    let date_from = params
        .date_from
        .as_deref()
        .map(|raw| parse_date("date_from", raw))
        .transpose()?;
    let date_to = params
        .date_to
        .as_deref()
        .map(|raw| parse_date("date_to", raw))
        .transpose()?;
    let offset = params
        .offset
        .as_deref()
        .map(|raw| parse_count("offset", raw))
        .transpose()?;
    let limit = params
        .limit
        .as_deref()
        .map(|raw| parse_count("limit", raw))
        .transpose()?;

    Ok(ListQuery {
        text: params.match_text.clone(),
        date_from,
        date_to,
        offset,
        limit: state.config().clamp_limit(limit),
    })
}

/// Collection GET: gate narrows visibility, then the query engine runs over
/// the snapshot of the path party's resources.
pub(crate) fn list_collection<R, F>(
    state: &AppState,
    store: &ModuleStore<R>,
    headers: &HeaderMap,
    party: &PartyRef,
    params: &ListParams,
    path: &str,
    extra: F,
) -> OcpiResult<Response>
where
    R: ModuleResource,
    F: Fn(&R) -> bool,
{
    let lookup = auth_lookup(state, headers);
    let open = state.config().is_open_module(R::MODULE);
    let scope = auth::list_scope(&lookup, R::MODULE.required_role(), open)?;

    let snapshot = store.snapshot(|owner| owner == party && scope.allows(owner));
    let query = build_query(state, params)?;
    let cancel = state.request_token();
    let page = query::apply_with(snapshot, &query, &cancel, extra)?;

    crate::metrics::METRICS.record_request(R::MODULE, "success");
    Ok(envelope::list(path, &query, page))
}

/// Single-resource GET. The gate runs before the existence check so an
/// unauthorized caller cannot distinguish present from absent.
pub(crate) fn get_one<R>(
    state: &AppState,
    store: &ModuleStore<R>,
    headers: &HeaderMap,
    party: &PartyRef,
    id: &R::Id,
) -> OcpiResult<Response>
where
    R: ModuleResource,
{
    let lookup = auth_lookup(state, headers);
    let open = state.config().is_open_module(R::MODULE);
    auth::require_resource_access(&lookup, R::MODULE.required_role(), party, open)?;

    let stored = store
        .get(party, id)
        .ok_or_else(|| OcpiError::not_found(R::MODULE, id))?;

    crate::metrics::METRICS.record_request(R::MODULE, "success");
    Ok(envelope::resource(
        stored.resource.clone(),
        &stored.etag,
        stored.resource.last_updated(),
    ))
}

pub(crate) fn put_one<R>(
    state: &AppState,
    store: &ModuleStore<R>,
    headers: &HeaderMap,
    party: &PartyRef,
    id: &R::Id,
    body: Value,
    params: &WriteParams,
) -> OcpiResult<Response>
where
    R: ModuleResource + DeserializeOwned,
{
    let lookup = auth_lookup(state, headers);
    auth::require_resource_access(&lookup, R::MODULE.required_role(), party, false)?;

    let candidate: R = serde_json::from_value(body).map_err(OcpiError::invalid_body)?;
    let allow = state.allow_downgrades(parse_allow_downgrades(params)?);
    let cancel = state.request_token();
    let (outcome, _) = upsert::put(store, party, id, candidate, allow, &cancel)?;

    crate::metrics::METRICS.record_request(R::MODULE, "success");
    Ok(envelope::upserted(outcome.is_created()))
}

pub(crate) fn patch_one<R>(
    state: &AppState,
    store: &ModuleStore<R>,
    headers: &HeaderMap,
    party: &PartyRef,
    id: &R::Id,
    body: Value,
    params: &WriteParams,
) -> OcpiResult<Response>
where
    R: ModuleResource + DeserializeOwned,
{
    let lookup = auth_lookup(state, headers);
    auth::require_resource_access(&lookup, R::MODULE.required_role(), party, false)?;

    let allow = state.allow_downgrades(parse_allow_downgrades(params)?);
    let cancel = state.request_token();
    upsert::patch(store, party, id, body, allow, &cancel)?;

    crate::metrics::METRICS.record_request(R::MODULE, "success");
    Ok(envelope::updated())
}

pub(crate) fn delete_one<R>(
    state: &AppState,
    store: &ModuleStore<R>,
    headers: &HeaderMap,
    party: &PartyRef,
    id: &R::Id,
) -> OcpiResult<Response>
where
    R: ModuleResource,
{
    let lookup = auth_lookup(state, headers);
    auth::require_resource_access(&lookup, R::MODULE.required_role(), party, false)?;

    upsert::delete(store, party, id)?;

    crate::metrics::METRICS.record_request(R::MODULE, "success");
    Ok(envelope::updated())
}
