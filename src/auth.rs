//! Access control gate.
//!
//! Peer platforms authenticate with opaque access tokens provisioned by the
//! credentials handshake (out of scope here; bindings load from a file at
//! startup or are inserted programmatically). A binding maps a token to a
//! status and a set of `(party, role)` tuples; a request may only touch a
//! resource whose owning party appears in that set under the role the
//! endpoint requires.
//!
//! Denials are uniform toward the caller. Whether the token was absent,
//! unknown, blocked, or merely scoped to other parties only shows up in the
//! server log, so a probing client cannot learn which validation step fired.

use crate::error::{DenyReason, OcpiError, OcpiResult};
use crate::model::{CountryCode, PartyId, PartyRef, Role};
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingStatus {
    Allowed,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRole {
    pub country_code: CountryCode,
    pub party_id: PartyId,
    pub role: Role,
}

impl PartyRole {
    pub fn party(&self) -> PartyRef {
        PartyRef::new(self.country_code.clone(), self.party_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessBinding {
    pub token: String,
    pub status: BindingStatus,
    pub parties: Vec<PartyRole>,
}

impl AccessBinding {
    fn grants(&self, party: &PartyRef, role: Role) -> bool {
        self.parties
            .iter()
            .any(|tuple| tuple.role == role && &tuple.party() == party)
    }

    fn parties_with_role(&self, role: Role) -> AHashSet<PartyRef> {
        self.parties
            .iter()
            .filter(|tuple| tuple.role == role)
            .map(PartyRole::party)
            .collect()
    }
}

/// Outcome of resolving the `Authorization` header against the registry.
/// `Missing` and `Unknown` both end in the same DENY; they exist separately
/// for the diagnostics only.
#[derive(Debug, Clone)]
pub enum TokenLookup {
    Missing,
    Unknown,
    Found(AccessBinding),
}

#[derive(Debug, Default, Deserialize)]
struct BindingsFile {
    bindings: Vec<AccessBinding>,
}

#[derive(Default)]
pub struct TokenRegistry {
    bindings: RwLock<AHashMap<String, AccessBinding>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read tokens file {:?}", path))?;
        let ext = path
            .extension()
            .and_then(|os| os.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let parsed: BindingsFile = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse YAML tokens file {:?}", path))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse JSON tokens file {:?}", path))?,
            other => anyhow::bail!("unsupported tokens file extension: {other}"),
        };

        let registry = Self::new();
        for binding in parsed.bindings {
            registry.insert(binding);
        }
        Ok(registry)
    }

    pub fn insert(&self, binding: AccessBinding) {
        let mut bindings = self.bindings.write();
        bindings.insert(binding.token.clone(), binding);
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    /// Resolve the raw `Authorization` header value. The scheme is
    /// `Token <key>`; anything else resolves to `Unknown`.
    pub fn resolve(&self, header: Option<&str>) -> TokenLookup {
        let Some(header) = header else {
            return TokenLookup::Missing;
        };
        let Some(key) = header
            .strip_prefix("Token ")
            .or_else(|| header.strip_prefix("token "))
        else {
            return TokenLookup::Unknown;
        };
        let bindings = self.bindings.read();
        match bindings.get(key.trim()) {
            Some(binding) => TokenLookup::Found(binding.clone()),
            None => TokenLookup::Unknown,
        }
    }
}

/// Narrowing applied to a list enumeration.
#[derive(Debug, Clone)]
pub enum ListScope {
    /// Open-data read: no narrowing beyond the path.
    Unrestricted,
    /// Only resources owned by one of these parties are visible. An empty
    /// set is a valid scope and yields an empty list, not a 403.
    Parties(AHashSet<PartyRef>),
}

impl ListScope {
    pub fn allows(&self, party: &PartyRef) -> bool {
        match self {
            ListScope::Unrestricted => true,
            ListScope::Parties(parties) => parties.contains(party),
        }
    }
}

fn deny(lookup: &TokenLookup) -> DenyReason {
    match lookup {
        TokenLookup::Missing => DenyReason::MissingToken,
        TokenLookup::Unknown => DenyReason::UnknownToken,
        TokenLookup::Found(_) => DenyReason::BlockedToken,
    }
}

fn allowed_binding<'a>(lookup: &'a TokenLookup) -> OcpiResult<&'a AccessBinding> {
    match lookup {
        TokenLookup::Found(binding) if binding.status == BindingStatus::Allowed => Ok(binding),
        other => Err(OcpiError::forbidden(deny(other))),
    }
}

/// Single-resource path: DENY unless the binding is ALLOWED and grants the
/// required role for the owning party, or the operation is an open-data
/// read.
pub fn require_resource_access(
    lookup: &TokenLookup,
    required: Role,
    owner: &PartyRef,
    open_read: bool,
) -> OcpiResult<()> {
    if open_read {
        return Ok(());
    }
    let binding = allowed_binding(lookup)?;
    if binding.grants(owner, required) {
        Ok(())
    } else {
        Err(OcpiError::forbidden(DenyReason::OutOfScope))
    }
}

/// List path: compute the visible party set. An ALLOWED binding with zero
/// matching tuples narrows to nothing rather than failing.
pub fn list_scope(
    lookup: &TokenLookup,
    required: Role,
    open_read: bool,
) -> OcpiResult<ListScope> {
    if open_read && matches!(lookup, TokenLookup::Missing) {
        return Ok(ListScope::Unrestricted);
    }
    let binding = allowed_binding(lookup)?;
    Ok(ListScope::Parties(binding.parties_with_role(required)))
}

/// Legacy unscoped lookup path: any ALLOWED binding qualifies, since the
/// owning party is not known until the resource is fetched.
pub fn require_known_peer(lookup: &TokenLookup) -> OcpiResult<()> {
    allowed_binding(lookup).map(|_| ())
}

/// Command path: the caller must hold the required role for at least one
/// party; that party becomes the originating identity handed to the
/// command handler.
pub fn require_party(lookup: &TokenLookup, required: Role) -> OcpiResult<PartyRef> {
    let binding = allowed_binding(lookup)?;
    binding
        .parties
        .iter()
        .find(|tuple| tuple.role == required)
        .map(PartyRole::party)
        .ok_or_else(|| OcpiError::forbidden(DenyReason::OutOfScope))
}
