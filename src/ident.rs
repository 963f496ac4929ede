//! Identifier resolution for composite resource paths.
//!
//! Turns raw URL path segments into typed identifiers. Resolution is purely
//! syntactic: the store is never consulted, existence is the caller's
//! problem. Arity is checked before any per-segment parse so a short path
//! fails with one clear error instead of a misleading format complaint, and
//! segments are parsed left to right with the first failure winning.

use crate::model::{
    CdrId, ConnectorId, CountryCode, EvseUid, LocationId, PartyId, PartyRef, SessionId, TariffId,
    TokenUid,
};
use thiserror::Error;

const MAX_ID_LEN: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    CountryCode,
    PartyId,
    LocationId,
    EvseUid,
    ConnectorId,
    TariffId,
    SessionId,
    CdrId,
    TokenUid,
}

impl SegmentKind {
    pub fn name(&self) -> &'static str {
        match self {
            SegmentKind::CountryCode => "country_code",
            SegmentKind::PartyId => "party_id",
            SegmentKind::LocationId => "location_id",
            SegmentKind::EvseUid => "evse_uid",
            SegmentKind::ConnectorId => "connector_id",
            SegmentKind::TariffId => "tariff_id",
            SegmentKind::SessionId => "session_id",
            SegmentKind::CdrId => "cdr_id",
            SegmentKind::TokenUid => "token_uid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("insufficient path segments: expected {expected}, got {found}")]
    Insufficient { expected: usize, found: usize },
    #[error("unexpected trailing path segments: expected {expected}, got {found}")]
    Trailing { expected: usize, found: usize },
    #[error("malformed {segment} at segment {index}: {reason}")]
    Malformed {
        segment: &'static str,
        index: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    CountryCode(CountryCode),
    PartyId(PartyId),
    LocationId(LocationId),
    EvseUid(EvseUid),
    ConnectorId(ConnectorId),
    TariffId(TariffId),
    SessionId(SessionId),
    CdrId(CdrId),
    TokenUid(TokenUid),
}

/// Resolve `raw` against an expected shape. Arity first, then each segment
/// in order; segments to the right of the first failure are not evaluated.
pub fn resolve(shape: &[SegmentKind], raw: &[&str]) -> Result<Vec<Segment>, PathError> {
    if raw.len() < shape.len() {
        return Err(PathError::Insufficient {
            expected: shape.len(),
            found: raw.len(),
        });
    }
    if raw.len() > shape.len() {
        return Err(PathError::Trailing {
            expected: shape.len(),
            found: raw.len(),
        });
    }

    shape
        .iter()
        .zip(raw.iter())
        .enumerate()
        .map(|(index, (kind, value))| parse_segment(*kind, value, index))
        .collect()
}

fn parse_segment(kind: SegmentKind, raw: &str, index: usize) -> Result<Segment, PathError> {
    let malformed = |reason: String| PathError::Malformed {
        segment: kind.name(),
        index,
        reason,
    };

    match kind {
        SegmentKind::CountryCode => {
            if raw.len() != 2 || !raw.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(malformed(format!(
                    "expected a 2-letter alpha country code, got {raw:?}"
                )));
            }
            Ok(Segment::CountryCode(CountryCode(raw.to_ascii_uppercase())))
        }
        SegmentKind::PartyId => {
            if raw.len() != 3 || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(malformed(format!(
                    "expected a 3-character alphanumeric party id, got {raw:?}"
                )));
            }
            Ok(Segment::PartyId(PartyId(raw.to_ascii_uppercase())))
        }
        _ => {
            let value = ci_string(kind, raw, index)?;
            Ok(match kind {
                SegmentKind::LocationId => Segment::LocationId(LocationId(value)),
                SegmentKind::EvseUid => Segment::EvseUid(EvseUid(value)),
                SegmentKind::ConnectorId => Segment::ConnectorId(ConnectorId(value)),
                SegmentKind::TariffId => Segment::TariffId(TariffId(value)),
                SegmentKind::SessionId => Segment::SessionId(SessionId(value)),
                SegmentKind::CdrId => Segment::CdrId(CdrId(value)),
                SegmentKind::TokenUid => Segment::TokenUid(TokenUid(value)),
                SegmentKind::CountryCode | SegmentKind::PartyId => unreachable!(),
            })
        }
    }
}

fn ci_string(kind: SegmentKind, raw: &str, index: usize) -> Result<String, PathError> {
    let malformed = |reason: String| PathError::Malformed {
        segment: kind.name(),
        index,
        reason,
    };

    if raw.is_empty() {
        return Err(malformed("identifier must not be empty".to_string()));
    }
    if raw.len() > MAX_ID_LEN {
        return Err(malformed(format!(
            "identifier exceeds {MAX_ID_LEN} characters"
        )));
    }
    if let Some(bad) = raw
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '*' | ':')))
    {
        return Err(malformed(format!("invalid character {bad:?} in identifier")));
    }
    Ok(raw.to_string())
}

// Typed composite addresses. A child id has meaning only under its full
// parent chain, so the nested addresses carry the whole chain.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationAddress {
    pub party: PartyRef,
    pub location_id: LocationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvseAddress {
    pub location: LocationAddress,
    pub evse_uid: EvseUid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorAddress {
    pub evse: EvseAddress,
    pub connector_id: ConnectorId,
}

pub fn party_ref(cc: &str, pid: &str) -> Result<PartyRef, PathError> {
    let parsed = resolve(&[SegmentKind::CountryCode, SegmentKind::PartyId], &[cc, pid])?;
    let [Segment::CountryCode(country_code), Segment::PartyId(party_id)] = parsed.as_slice() else {
        unreachable!()
    };
    Ok(PartyRef::new(country_code.clone(), party_id.clone()))
}

pub fn location_address(cc: &str, pid: &str, loc: &str) -> Result<LocationAddress, PathError> {
    let parsed = resolve(
        &[
            SegmentKind::CountryCode,
            SegmentKind::PartyId,
            SegmentKind::LocationId,
        ],
        &[cc, pid, loc],
    )?;
    let [
        Segment::CountryCode(country_code),
        Segment::PartyId(party_id),
        Segment::LocationId(location_id),
    ] = parsed.as_slice()
    else {
        unreachable!()
    };
    Ok(LocationAddress {
        party: PartyRef::new(country_code.clone(), party_id.clone()),
        location_id: location_id.clone(),
    })
}

pub fn evse_address(
    cc: &str,
    pid: &str,
    loc: &str,
    evse: &str,
) -> Result<EvseAddress, PathError> {
    let parsed = resolve(
        &[
            SegmentKind::CountryCode,
            SegmentKind::PartyId,
            SegmentKind::LocationId,
            SegmentKind::EvseUid,
        ],
        &[cc, pid, loc, evse],
    )?;
    let [
        Segment::CountryCode(country_code),
        Segment::PartyId(party_id),
        Segment::LocationId(location_id),
        Segment::EvseUid(evse_uid),
    ] = parsed.as_slice()
    else {
        unreachable!()
    };
    Ok(EvseAddress {
        location: LocationAddress {
            party: PartyRef::new(country_code.clone(), party_id.clone()),
            location_id: location_id.clone(),
        },
        evse_uid: evse_uid.clone(),
    })
}

pub fn connector_address(
    cc: &str,
    pid: &str,
    loc: &str,
    evse: &str,
    connector: &str,
) -> Result<ConnectorAddress, PathError> {
    let parsed = resolve(
        &[
            SegmentKind::CountryCode,
            SegmentKind::PartyId,
            SegmentKind::LocationId,
            SegmentKind::EvseUid,
            SegmentKind::ConnectorId,
        ],
        &[cc, pid, loc, evse, connector],
    )?;
    let [
        Segment::CountryCode(country_code),
        Segment::PartyId(party_id),
        Segment::LocationId(location_id),
        Segment::EvseUid(evse_uid),
        Segment::ConnectorId(connector_id),
    ] = parsed.as_slice()
    else {
        unreachable!()
    };
    Ok(ConnectorAddress {
        evse: EvseAddress {
            location: LocationAddress {
                party: PartyRef::new(country_code.clone(), party_id.clone()),
                location_id: location_id.clone(),
            },
            evse_uid: evse_uid.clone(),
        },
        connector_id: connector_id.clone(),
    })
}

macro_rules! scoped_address {
    ($fn_name:ident, $kind:expr, $segment:path, $id:ty) => {
        pub fn $fn_name(cc: &str, pid: &str, id: &str) -> Result<(PartyRef, $id), PathError> {
            let parsed = resolve(
                &[SegmentKind::CountryCode, SegmentKind::PartyId, $kind],
                &[cc, pid, id],
            )?;
            let [Segment::CountryCode(country_code), Segment::PartyId(party_id), $segment(id)] =
                parsed.as_slice()
            else {
                unreachable!()
            };
            Ok((
                PartyRef::new(country_code.clone(), party_id.clone()),
                id.clone(),
            ))
        }
    };
}

scoped_address!(tariff_address, SegmentKind::TariffId, Segment::TariffId, TariffId);
scoped_address!(session_address, SegmentKind::SessionId, Segment::SessionId, SessionId);
scoped_address!(cdr_address, SegmentKind::CdrId, Segment::CdrId, CdrId);
scoped_address!(token_address, SegmentKind::TokenUid, Segment::TokenUid, TokenUid);

/// Legacy variant: a token uid addressed without its owning party.
pub fn bare_token_uid(raw: &str) -> Result<TokenUid, PathError> {
    let parsed = resolve(&[SegmentKind::TokenUid], &[raw])?;
    let [Segment::TokenUid(uid)] = parsed.as_slice() else {
        unreachable!()
    };
    Ok(uid.clone())
}
