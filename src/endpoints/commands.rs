//! Command endpoint. No resource addressing: the path names the command
//! type, the body carries the type-specific payload, and the dispatcher
//! always answers promptly whether or not anything downstream reacts.

use super::{auth_lookup, json_body};
use crate::auth;
use crate::commands::{Command, CommandType};
use crate::envelope;
use crate::error::OcpiResult;
use crate::ident::PathError;
use crate::model::ModuleId;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

pub const ALLOW: &str = "OPTIONS, POST";

pub async fn post(
    State(state): State<Arc<AppState>>,
    Path(command_type): Path<String>,
    headers: HeaderMap,
    body: Result<axum::Json<Value>, JsonRejection>,
) -> OcpiResult<Response> {
    let command_type =
        CommandType::from_str(&command_type).map_err(|_| PathError::Malformed {
            segment: "command_type",
            index: 1,
            reason: format!("unknown command type {command_type:?}"),
        })?;

    let lookup = auth_lookup(&state, &headers);
    let from = auth::require_party(&lookup, ModuleId::Commands.required_role())?;

    // Any parse failure, body-level or payload-level, answers REJECTED with
    // the diagnostic; nothing is dispatched.
    let parsed = json_body(body)
        .map_err(|e| e.public_message())
        .and_then(|value| Command::parse(command_type, value));
    let response = match parsed {
        Ok(command) => state.dispatcher().dispatch(command, from).await,
        Err(diagnostic) => state.dispatcher().rejected(diagnostic),
    };

    crate::metrics::METRICS.record_request(ModuleId::Commands, "success");
    Ok(envelope::ok(response))
}

pub async fn options() -> Response {
    envelope::options(ALLOW)
}
