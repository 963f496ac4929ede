//! OCPI response envelope and HTTP metadata plumbing.
//!
//! Every response body is wrapped in the envelope; pagination counts, the
//! content fingerprint, and CORS headers ride alongside as plain HTTP
//! headers.

use crate::error::OcpiStatus;
use crate::query::{ListQuery, Page};
use axum::Json;
use axum::http::header::{ALLOW, ETAG, LAST_MODIFIED, LINK};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub static X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");
pub static X_FILTERED_COUNT: HeaderName = HeaderName::from_static("x-filtered-count");
pub static X_LIMIT: HeaderName = HeaderName::from_static("x-limit");

const CORS_METHODS: &str = "OPTIONS, GET, PUT, PATCH, DELETE, POST";
const CORS_HEADERS: &str = "Authorization, Content-Type";

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub status_code: u16,
    pub status_message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status_code: OcpiStatus::Success.code(),
            status_message: "Success".to_string(),
            timestamp: Utc::now(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    pub fn success_empty() -> Self {
        Self {
            status_code: OcpiStatus::Success.code(),
            status_message: "Success".to_string(),
            timestamp: Utc::now(),
            data: None,
        }
    }

    pub fn error(status: OcpiStatus, message: impl Into<String>) -> Self {
        Self {
            status_code: status.code(),
            status_message: message.into(),
            timestamp: Utc::now(),
            data: None,
        }
    }
}

/// 200 envelope around `data`.
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(Envelope::success(data))).into_response()
}

/// 200 or 201 depending on whether the upsert created the resource. Write
/// acknowledgements carry no data payload.
pub fn upserted(created: bool) -> Response {
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(Envelope::success_empty())).into_response()
}

/// 200 acknowledgement for PATCH and DELETE.
pub fn updated() -> Response {
    (StatusCode::OK, Json(Envelope::success_empty())).into_response()
}

/// Single-resource GET: envelope plus `ETag` and `Last-Modified`.
pub fn resource<T: Serialize>(data: T, etag: &str, last_updated: DateTime<Utc>) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
        headers.insert(ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&http_date(last_updated)) {
        headers.insert(LAST_MODIFIED, value);
    }
    (StatusCode::OK, headers, Json(Envelope::success(data))).into_response()
}

/// List GET: envelope around the page items plus the count headers and, when
/// the engine produced a continuation, a `Link: ...; rel="next"` header.
pub fn list<T: Serialize>(path: &str, query: &ListQuery, page: Page<T>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        X_TOTAL_COUNT.clone(),
        HeaderValue::from(page.total_count as u64),
    );
    headers.insert(
        X_FILTERED_COUNT.clone(),
        HeaderValue::from(page.filtered_count as u64),
    );
    if let Some(limit) = query.limit {
        headers.insert(X_LIMIT.clone(), HeaderValue::from(limit as u64));
    }
    if let Some(next) = &page.next {
        let target = format!("<{}{}>; rel=\"next\"", path, query.continuation_query(next));
        if let Ok(value) = HeaderValue::from_str(&target) {
            headers.insert(LINK, value);
        }
    }
    (
        StatusCode::OK,
        headers,
        Json(Envelope::success(page.items)),
    )
        .into_response()
}

/// OPTIONS response: `Allow` plus CORS headers, no store access.
pub fn options(allow: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(ALLOW, HeaderValue::from_static(allow));
    apply_cors(&mut headers);
    (StatusCode::OK, headers).into_response()
}

pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static(CORS_METHODS),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static(CORS_HEADERS),
    );
}

pub fn method_not_allowed(allow: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(ALLOW, HeaderValue::from_static(allow));
    let body = Envelope::error(OcpiStatus::GenericClientError, "method not allowed");
    (StatusCode::METHOD_NOT_ALLOWED, headers, Json(body)).into_response()
}

fn http_date(when: DateTime<Utc>) -> String {
    when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
