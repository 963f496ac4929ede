//! Location module: the party's charging sites, with EVSEs and connectors
//! addressed through their parent chain.

use super::{ListParams, WriteParams, auth_lookup};
use crate::auth;
use crate::envelope;
use crate::error::{OcpiError, OcpiResult};
use crate::ident;
use crate::model::{Connector, Evse, ModuleId};
use crate::state::AppState;
use crate::utils::content_fingerprint;
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
    let path = format!("/locations/{}/{}", party.country_code, party.party_id);
    super::list_collection(
        &state,
        state.locations(),
        &headers,
        &party,
        &params,
        &path,
        |_| true,
    )
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let addr = ident::location_address(&cc, &pid, &loc)?;
    super::get_one(
        &state,
        state.locations(),
        &headers,
        &addr.party,
        &addr.location_id,
    )
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc)): Path<(String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let addr = ident::location_address(&cc, &pid, &loc)?;
    super::put_one(
        &state,
        state.locations(),
        &headers,
        &addr.party,
        &addr.location_id,
        super::json_body(body)?,
        &params,
    )
}

pub async fn patch(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc)): Path<(String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let addr = ident::location_address(&cc, &pid, &loc)?;
    super::patch_one(
        &state,
        state.locations(),
        &headers,
        &addr.party,
        &addr.location_id,
        super::json_body(body)?,
        &params,
    )
}

pub async fn get_evse(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc, evse)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let addr = ident::evse_address(&cc, &pid, &loc, &evse)?;
    let lookup = auth_lookup(&state, &headers);
    let open = state.config().is_open_module(ModuleId::Locations);
    auth::require_resource_access(
        &lookup,
        ModuleId::Locations.required_role(),
        &addr.location.party,
        open,
    )?;

    let stored = state
        .locations()
        .get(&addr.location.party, &addr.location.location_id)
        .ok_or_else(|| OcpiError::not_found(ModuleId::Locations, &addr.location.location_id))?;
    let evse = stored
        .resource
        .evse(&addr.evse_uid)
        .ok_or_else(|| OcpiError::not_found(ModuleId::Locations, &addr.evse_uid))?;

    crate::metrics::METRICS.record_request(ModuleId::Locations, "success");
    let etag = content_fingerprint(evse);
    Ok(envelope::resource(evse.clone(), &etag, evse.last_updated))
}

pub async fn put_evse(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc, evse)): Path<(String, String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let addr = ident::evse_address(&cc, &pid, &loc, &evse)?;
    let lookup = auth_lookup(&state, &headers);
    auth::require_resource_access(
        &lookup,
        ModuleId::Locations.required_role(),
        &addr.location.party,
        false,
    )?;

    let candidate: Evse = serde_json::from_value(super::json_body(body)?).map_err(OcpiError::invalid_body)?;
    let allow = state.allow_downgrades(super::parse_allow_downgrades(&params)?);
    let cancel = state.request_token();
    let outcome = crate::upsert::put_evse(state.locations(), &addr, candidate, allow, &cancel)?;

    crate::metrics::METRICS.record_request(ModuleId::Locations, "success");
    Ok(envelope::upserted(outcome.is_created()))
}

pub async fn patch_evse(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc, evse)): Path<(String, String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let addr = ident::evse_address(&cc, &pid, &loc, &evse)?;
    let lookup = auth_lookup(&state, &headers);
    auth::require_resource_access(
        &lookup,
        ModuleId::Locations.required_role(),
        &addr.location.party,
        false,
    )?;

    let allow = state.allow_downgrades(super::parse_allow_downgrades(&params)?);
    let cancel = state.request_token();
    crate::upsert::patch_evse(state.locations(), &addr, super::json_body(body)?, allow, &cancel)?;

    crate::metrics::METRICS.record_request(ModuleId::Locations, "success");
    Ok(envelope::updated())
}

pub async fn get_connector(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc, evse, conn)): Path<(String, String, String, String, String)>,
    headers: HeaderMap,
) -> OcpiResult<Response> {
    let addr = ident::connector_address(&cc, &pid, &loc, &evse, &conn)?;
    let lookup = auth_lookup(&state, &headers);
    let open = state.config().is_open_module(ModuleId::Locations);
    auth::require_resource_access(
        &lookup,
        ModuleId::Locations.required_role(),
        &addr.evse.location.party,
        open,
    )?;

    let stored = state
        .locations()
        .get(&addr.evse.location.party, &addr.evse.location.location_id)
        .ok_or_else(|| {
            OcpiError::not_found(ModuleId::Locations, &addr.evse.location.location_id)
        })?;
    let connector = stored
        .resource
        .evse(&addr.evse.evse_uid)
        .and_then(|e| e.connector(&addr.connector_id))
        .ok_or_else(|| OcpiError::not_found(ModuleId::Locations, &addr.connector_id))?;

    crate::metrics::METRICS.record_request(ModuleId::Locations, "success");
    let etag = content_fingerprint(connector);
    Ok(envelope::resource(
        connector.clone(),
        &etag,
        connector.last_updated,
    ))
}

pub async fn put_connector(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc, evse, conn)): Path<(String, String, String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let addr = ident::connector_address(&cc, &pid, &loc, &evse, &conn)?;
    let lookup = auth_lookup(&state, &headers);
    auth::require_resource_access(
        &lookup,
        ModuleId::Locations.required_role(),
        &addr.evse.location.party,
        false,
    )?;

    let candidate: Connector =
        serde_json::from_value(super::json_body(body)?).map_err(OcpiError::invalid_body)?;
    let allow = state.allow_downgrades(super::parse_allow_downgrades(&params)?);
    let cancel = state.request_token();
    let outcome =
        crate::upsert::put_connector(state.locations(), &addr, candidate, allow, &cancel)?;

    crate::metrics::METRICS.record_request(ModuleId::Locations, "success");
    Ok(envelope::upserted(outcome.is_created()))
}

pub async fn patch_connector(
    State(state): State<Arc<AppState>>,
    Path((cc, pid, loc, evse, conn)): Path<(String, String, String, String, String)>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let addr = ident::connector_address(&cc, &pid, &loc, &evse, &conn)?;
    let lookup = auth_lookup(&state, &headers);
    auth::require_resource_access(
        &lookup,
        ModuleId::Locations.required_role(),
        &addr.evse.location.party,
        false,
    )?;

    let allow = state.allow_downgrades(super::parse_allow_downgrades(&params)?);
    let cancel = state.request_token();
    crate::upsert::patch_connector(state.locations(), &addr, super::json_body(body)?, allow, &cancel)?;

    crate::metrics::METRICS.record_request(ModuleId::Locations, "success");
    Ok(envelope::updated())
}

pub async fn collection_options() -> Response {
    envelope::options(COLLECTION_ALLOW)
}

pub async fn resource_options() -> Response {
    envelope::options(RESOURCE_ALLOW)
}
