//! Protocol error taxonomy.
//!
//! Every failure a request can hit maps to exactly one `OcpiError` variant,
//! which carries the OCPI status code, the HTTP status, and a category label
//! for metrics. Authorization failures are deliberately uniform toward the
//! caller: a missing token, an unknown token, a blocked token, and an
//! out-of-scope token all produce the same 403 body, and only the server log
//! records which one it was.

use crate::envelope::Envelope;
use crate::ident::PathError;
use crate::model::ModuleId;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// OCPI response status codes. Distinct from the HTTP status they ride on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum OcpiStatus {
    /// Request processed as expected
    Success = 1000,
    /// Generic client error
    GenericClientError = 2000,
    /// Invalid or missing parameters (bad path segment, bad body, bad query)
    InvalidParameters = 2001,
    /// Not enough information (well-formed but incomplete request)
    NotEnoughInformation = 2002,
    /// Unknown resource at a valid address
    UnknownResource = 2003,
    /// Write rejected because the submitted `last_updated` is older than the
    /// stored one
    StaleWriteConflict = 2004,
    /// Generic server error
    GenericServerError = 3000,
}

impl OcpiStatus {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Category label used for the error counter.
    pub fn category(&self) -> &'static str {
        match self {
            OcpiStatus::Success => "success",
            OcpiStatus::GenericClientError => "client_error",
            OcpiStatus::InvalidParameters => "invalid_parameters",
            OcpiStatus::NotEnoughInformation => "incomplete_request",
            OcpiStatus::UnknownResource => "not_found",
            OcpiStatus::StaleWriteConflict => "stale_write",
            OcpiStatus::GenericServerError => "server_error",
        }
    }
}

impl fmt::Display for OcpiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Why an authorization decision came out DENY. Logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingToken,
    UnknownToken,
    BlockedToken,
    OutOfScope,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MissingToken => write!(f, "no access token presented"),
            DenyReason::UnknownToken => write!(f, "access token not registered"),
            DenyReason::BlockedToken => write!(f, "access token is blocked"),
            DenyReason::OutOfScope => write!(f, "token not scoped to the owning party"),
        }
    }
}

#[derive(Debug, Error)]
pub enum OcpiError {
    #[error("{0}")]
    MalformedPath(#[from] PathError),

    #[error("invalid request body: {detail}")]
    InvalidBody { detail: String },

    #[error("invalid query parameter {name}: {detail}")]
    InvalidQuery { name: &'static str, detail: String },

    #[error("forbidden")]
    Forbidden { reason: DenyReason },

    #[error("unknown {module} resource {id}")]
    NotFound { module: ModuleId, id: String },

    #[error(
        "stale write: submitted last_updated {submitted} is older than stored {stored}"
    )]
    StaleWrite {
        submitted: chrono::DateTime<chrono::Utc>,
        stored: chrono::DateTime<chrono::Utc>,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OcpiError {
    pub fn status(&self) -> OcpiStatus {
        match self {
            OcpiError::MalformedPath(_)
            | OcpiError::InvalidBody { .. }
            | OcpiError::InvalidQuery { .. } => OcpiStatus::InvalidParameters,
            OcpiError::Forbidden { .. } => OcpiStatus::GenericClientError,
            OcpiError::NotFound { .. } => OcpiStatus::UnknownResource,
            OcpiError::StaleWrite { .. } => OcpiStatus::StaleWriteConflict,
            OcpiError::Cancelled | OcpiError::Internal(_) => OcpiStatus::GenericServerError,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            OcpiError::MalformedPath(_)
            | OcpiError::InvalidBody { .. }
            | OcpiError::InvalidQuery { .. }
            | OcpiError::StaleWrite { .. } => StatusCode::BAD_REQUEST,
            OcpiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            OcpiError::NotFound { .. } => StatusCode::NOT_FOUND,
            OcpiError::Cancelled | OcpiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message placed in the response envelope. Uniform for every
    /// authorization failure so the status never leaks which validation
    /// step rejected the token.
    pub fn public_message(&self) -> String {
        match self {
            OcpiError::Forbidden { .. } => "forbidden".to_string(),
            OcpiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn forbidden(reason: DenyReason) -> Self {
        OcpiError::Forbidden { reason }
    }

    pub fn not_found(module: ModuleId, id: impl fmt::Display) -> Self {
        OcpiError::NotFound {
            module,
            id: id.to_string(),
        }
    }

    pub fn invalid_body(detail: impl fmt::Display) -> Self {
        OcpiError::InvalidBody {
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for OcpiError {
    fn into_response(self) -> Response {
        let status = self.status();
        crate::metrics::METRICS.record_error(status.category());

        match &self {
            OcpiError::Forbidden { reason } => {
                tracing::warn!(reason = %reason, "request denied");
            }
            OcpiError::Internal(error) => {
                tracing::error!(?error, "request failed");
            }
            OcpiError::StaleWrite { submitted, stored } => {
                tracing::debug!(%submitted, %stored, "stale write rejected");
            }
            other => {
                tracing::debug!(error = %other, "request rejected");
            }
        }

        let body = Envelope::<()>::error(status, self.public_message());
        (self.http_status(), Json(body)).into_response()
    }
}

pub type OcpiResult<T> = Result<T, OcpiError>;
