//! List query engine.
//!
//! Input is an access-filtered snapshot; the engine applies the free-text
//! match, the date window over `last_updated`, a `created`-ascending sort,
//! and the offset/limit slice, and reports the counts and continuation the
//! HTTP layer turns into headers.
//!
//! The date window is exclusive at `date_from` and inclusive at `date_to`:
//! a client that resumes polling from the `last_updated` of the newest item
//! it already holds never re-fetches that item, while a bounded historical
//! query still includes its upper bound. Sorting by `created` keeps
//! pagination append-friendly: a resource inserted mid-pagination lands at
//! the end and cannot shift already-seen pages.

use crate::error::{OcpiError, OcpiResult};
use crate::model::ModuleResource;
use crate::store::Stored;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// How many records to scan between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Free-text substring match (`match` query parameter).
    pub text: Option<String>,
    /// Exclusive lower bound on `last_updated`.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `last_updated`.
    pub date_to: Option<DateTime<Utc>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Count after filtering, before slicing (`X-Filtered-Count`).
    pub filtered_count: usize,
    /// Count before filtering (`X-Total-Count`).
    pub total_count: usize,
    pub next: Option<Continuation>,
}

impl ListQuery {
    /// Query string for the follow-up request a continuation describes:
    /// same window and match, advanced offset.
    pub fn continuation_query(&self, next: &Continuation) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(from) = self.date_from {
            params.push(format!(
                "date_from={}",
                crate::utils::rfc3339_millis(from)
            ));
        }
        if let Some(to) = self.date_to {
            params.push(format!("date_to={}", crate::utils::rfc3339_millis(to)));
        }
        if let Some(text) = &self.text {
            params.push(format!("match={}", percent_encode(text)));
        }
        params.push(format!("offset={}", next.offset));
        params.push(format!("limit={}", next.limit));
        format!("?{}", params.join("&"))
    }

    fn window_contains(&self, last_updated: DateTime<Utc>) -> bool {
        if let Some(from) = self.date_from
            && last_updated <= from
        {
            return false;
        }
        if let Some(to) = self.date_to
            && last_updated > to
        {
            return false;
        }
        true
    }
}

/// Run the full pipeline over an access-filtered snapshot.
pub fn apply<R: ModuleResource>(
    snapshot: Vec<Stored<R>>,
    query: &ListQuery,
    cancel: &CancellationToken,
) -> OcpiResult<Page<R>> {
    apply_with(snapshot, query, cancel, |_| true)
}

/// Like [`apply`], with an extra role-specific predicate (e.g. the token
/// `type` filter) that counts as filtering but not toward the total.
pub fn apply_with<R, F>(
    snapshot: Vec<Stored<R>>,
    query: &ListQuery,
    cancel: &CancellationToken,
    extra: F,
) -> OcpiResult<Page<R>>
where
    R: ModuleResource,
    F: Fn(&R) -> bool,
{
    if cancel.is_cancelled() {
        return Err(OcpiError::Cancelled);
    }

    let total_count = snapshot.len();
    let needle = query.text.as_deref().map(str::to_ascii_lowercase);

    let mut matched: Vec<Stored<R>> = Vec::new();
    for (scanned, stored) in snapshot.into_iter().enumerate() {
        if scanned % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(OcpiError::Cancelled);
        }
        if let Some(needle) = &needle
            && !stored.resource.matches_text(needle)
        {
            continue;
        }
        if !query.window_contains(stored.resource.last_updated()) {
            continue;
        }
        if !extra(&stored.resource) {
            continue;
        }
        matched.push(stored);
    }

    matched.sort_by_key(|stored| stored.created);
    let filtered_count = matched.len();

    let offset = query.offset.unwrap_or(0);
    let items: Vec<R> = matched
        .into_iter()
        .skip(offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .map(|stored| stored.resource)
        .collect();

    let next = match query.limit {
        Some(limit) if offset + limit < filtered_count => Some(Continuation {
            offset: offset + limit,
            limit,
        }),
        _ => None,
    };

    Ok(Page {
        items,
        filtered_count,
        total_count,
        next,
    })
}

fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
