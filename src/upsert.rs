//! Upsert and merge engine.
//!
//! PUT is a full replace, PATCH a JSON merge-patch (RFC 7396: present
//! fields apply, explicit nulls remove, absent fields stay, nested objects
//! merge recursively, arrays replace wholesale). Both run their downgrade
//! check inside the store's partition lock: a candidate whose
//! `last_updated` is older than the stored value is rejected and the store
//! left untouched, unless downgrades were explicitly allowed for the call.
//! This is the convergence guarantee that lets two independently-operated
//! stores synchronize by replaying snapshots in any order.
//!
//! EVSEs and connectors live inside their Location aggregate, so their
//! writes run under the Location's lock and refresh the parent clock
//! atomically with the child write.

use crate::error::{OcpiError, OcpiResult};
use crate::ident::{ConnectorAddress, EvseAddress};
use crate::model::{
    Connector, Evse, Location, ModuleId, ModuleResource, PartyRef, VersionedResource,
};
use crate::store::{ModuleStore, Stored, UpsertOutcome};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

const LAST_UPDATED_FIELD: &str = "last_updated";

/// Full replace. Creation vs update is reported so the boundary can pick
/// 201 vs 200.
pub fn put<R>(
    store: &ModuleStore<R>,
    party: &PartyRef,
    id: &R::Id,
    candidate: R,
    allow_downgrades: bool,
    cancel: &CancellationToken,
) -> OcpiResult<(UpsertOutcome, Stored<R>)>
where
    R: ModuleResource,
{
    if cancel.is_cancelled() {
        return Err(OcpiError::Cancelled);
    }
    ensure_identity(&candidate, party, id)?;

    store.update_with(party, id, |existing| {
        if let Some(existing) = existing {
            check_downgrade(
                candidate.last_updated(),
                existing.resource.last_updated(),
                allow_downgrades,
            )?;
        }
        Ok(candidate)
    })
}

/// Partial merge. The target must exist; PATCH never creates.
pub fn patch<R>(
    store: &ModuleStore<R>,
    party: &PartyRef,
    id: &R::Id,
    patch: Value,
    allow_downgrades: bool,
    cancel: &CancellationToken,
) -> OcpiResult<Stored<R>>
where
    R: ModuleResource + DeserializeOwned,
{
    if cancel.is_cancelled() {
        return Err(OcpiError::Cancelled);
    }
    if !patch.is_object() {
        return Err(OcpiError::invalid_body("merge-patch document must be an object"));
    }

    let (_, stored) = store.update_with(party, id, |existing| {
        let Some(existing) = existing else {
            return Err(OcpiError::not_found(R::MODULE, id));
        };
        let candidate: R = merged_candidate(&existing.resource, &patch)?;
        ensure_identity(&candidate, party, id)
            .map_err(|_| OcpiError::invalid_body("identity fields are immutable"))?;
        check_downgrade(
            candidate.last_updated(),
            existing.resource.last_updated(),
            allow_downgrades,
        )?;
        Ok(candidate)
    })?;
    Ok(stored)
}

pub fn delete<R>(store: &ModuleStore<R>, party: &PartyRef, id: &R::Id) -> OcpiResult<Stored<R>>
where
    R: ModuleResource,
{
    store
        .remove(party, id)
        .ok_or_else(|| OcpiError::not_found(R::MODULE, id))
}

/// Upsert one EVSE inside its Location aggregate. The Location must exist;
/// the downgrade check compares against the current EVSE with the same uid.
pub fn put_evse(
    store: &ModuleStore<Location>,
    addr: &EvseAddress,
    candidate: Evse,
    allow_downgrades: bool,
    cancel: &CancellationToken,
) -> OcpiResult<UpsertOutcome> {
    if cancel.is_cancelled() {
        return Err(OcpiError::Cancelled);
    }
    if candidate.uid != addr.evse_uid {
        return Err(OcpiError::invalid_body("evse uid does not match the URL"));
    }

    let mut child_outcome = UpsertOutcome::Updated;
    store.update_with(
        &addr.location.party,
        &addr.location.location_id,
        |existing| {
            let Some(existing) = existing else {
                return Err(OcpiError::not_found(
                    ModuleId::Locations,
                    &addr.location.location_id,
                ));
            };
            let mut location = existing.resource.clone();
            child_outcome = replace_evse(&mut location, candidate, allow_downgrades)?;
            Ok(location)
        },
    )?;
    Ok(child_outcome)
}

pub fn patch_evse(
    store: &ModuleStore<Location>,
    addr: &EvseAddress,
    patch: Value,
    allow_downgrades: bool,
    cancel: &CancellationToken,
) -> OcpiResult<()> {
    if cancel.is_cancelled() {
        return Err(OcpiError::Cancelled);
    }
    if !patch.is_object() {
        return Err(OcpiError::invalid_body("merge-patch document must be an object"));
    }

    store.update_with(
        &addr.location.party,
        &addr.location.location_id,
        |existing| {
            let Some(existing) = existing else {
                return Err(OcpiError::not_found(
                    ModuleId::Locations,
                    &addr.location.location_id,
                ));
            };
            let mut location = existing.resource.clone();
            let current = location
                .evse(&addr.evse_uid)
                .ok_or_else(|| OcpiError::not_found(ModuleId::Locations, &addr.evse_uid))?;
            let candidate: Evse = merged_candidate(current, &patch)?;
            if candidate.uid != addr.evse_uid {
                return Err(OcpiError::invalid_body("identity fields are immutable"));
            }
            replace_evse(&mut location, candidate, allow_downgrades)?;
            Ok(location)
        },
    )?;
    Ok(())
}

/// Upsert one connector, resolved through the full Location → EVSE chain.
pub fn put_connector(
    store: &ModuleStore<Location>,
    addr: &ConnectorAddress,
    candidate: Connector,
    allow_downgrades: bool,
    cancel: &CancellationToken,
) -> OcpiResult<UpsertOutcome> {
    if cancel.is_cancelled() {
        return Err(OcpiError::Cancelled);
    }
    if candidate.id != addr.connector_id {
        return Err(OcpiError::invalid_body("connector id does not match the URL"));
    }

    let mut child_outcome = UpsertOutcome::Updated;
    store.update_with(
        &addr.evse.location.party,
        &addr.evse.location.location_id,
        |existing| {
            let Some(existing) = existing else {
                return Err(OcpiError::not_found(
                    ModuleId::Locations,
                    &addr.evse.location.location_id,
                ));
            };
            let mut location = existing.resource.clone();
            child_outcome = replace_connector(&mut location, addr, candidate, allow_downgrades)?;
            Ok(location)
        },
    )?;
    Ok(child_outcome)
}

pub fn patch_connector(
    store: &ModuleStore<Location>,
    addr: &ConnectorAddress,
    patch: Value,
    allow_downgrades: bool,
    cancel: &CancellationToken,
) -> OcpiResult<()> {
    if cancel.is_cancelled() {
        return Err(OcpiError::Cancelled);
    }
    if !patch.is_object() {
        return Err(OcpiError::invalid_body("merge-patch document must be an object"));
    }

    store.update_with(
        &addr.evse.location.party,
        &addr.evse.location.location_id,
        |existing| {
            let Some(existing) = existing else {
                return Err(OcpiError::not_found(
                    ModuleId::Locations,
                    &addr.evse.location.location_id,
                ));
            };
            let mut location = existing.resource.clone();
            let evse = location
                .evse(&addr.evse.evse_uid)
                .ok_or_else(|| OcpiError::not_found(ModuleId::Locations, &addr.evse.evse_uid))?;
            let current = evse
                .connector(&addr.connector_id)
                .ok_or_else(|| OcpiError::not_found(ModuleId::Locations, &addr.connector_id))?;
            let candidate: Connector = merged_candidate(current, &patch)?;
            if candidate.id != addr.connector_id {
                return Err(OcpiError::invalid_body("identity fields are immutable"));
            }
            replace_connector(&mut location, addr, candidate, allow_downgrades)?;
            Ok(location)
        },
    )?;
    Ok(())
}

fn replace_evse(
    location: &mut Location,
    candidate: Evse,
    allow_downgrades: bool,
) -> OcpiResult<UpsertOutcome> {
    let outcome = match location.evses.iter_mut().find(|e| e.uid == candidate.uid) {
        Some(slot) => {
            check_downgrade(
                candidate.last_updated,
                slot.last_updated,
                allow_downgrades,
            )?;
            *slot = candidate;
            UpsertOutcome::Updated
        }
        None => {
            location.evses.push(candidate);
            UpsertOutcome::Created
        }
    };
    refresh_parent_clock(location);
    Ok(outcome)
}

fn replace_connector(
    location: &mut Location,
    addr: &ConnectorAddress,
    candidate: Connector,
    allow_downgrades: bool,
) -> OcpiResult<UpsertOutcome> {
    let evse = location
        .evses
        .iter_mut()
        .find(|e| e.uid == addr.evse.evse_uid)
        .ok_or_else(|| OcpiError::not_found(ModuleId::Locations, &addr.evse.evse_uid))?;

    let outcome = match evse.connectors.iter_mut().find(|c| c.id == candidate.id) {
        Some(slot) => {
            check_downgrade(
                candidate.last_updated,
                slot.last_updated,
                allow_downgrades,
            )?;
            *slot = candidate;
            UpsertOutcome::Updated
        }
        None => {
            evse.connectors.push(candidate);
            UpsertOutcome::Created
        }
    };
    if let Some(newest) = evse.connectors.iter().map(|c| c.last_updated).max()
        && newest > evse.last_updated
    {
        evse.last_updated = newest;
    }
    refresh_parent_clock(location);
    Ok(outcome)
}

fn refresh_parent_clock(location: &mut Location) {
    if let Some(newest) = location.evses.iter().map(|e| e.last_updated).max()
        && newest > location.last_updated
    {
        location.last_updated = newest;
    }
}

fn check_downgrade(
    submitted: DateTime<Utc>,
    stored: DateTime<Utc>,
    allow_downgrades: bool,
) -> OcpiResult<()> {
    if submitted < stored && !allow_downgrades {
        return Err(OcpiError::StaleWrite { submitted, stored });
    }
    Ok(())
}

fn ensure_identity<R: ModuleResource>(
    candidate: &R,
    party: &PartyRef,
    id: &R::Id,
) -> OcpiResult<()> {
    if &candidate.party() != party {
        return Err(OcpiError::invalid_body(
            "resource owner does not match the URL party",
        ));
    }
    if candidate.id() != id {
        return Err(OcpiError::invalid_body("resource id does not match the URL"));
    }
    Ok(())
}

/// Apply an RFC 7396 merge-patch to the current resource and deserialize
/// the result. A patch without `last_updated` is stamped with the merge
/// time so a bare field fix still advances the conflict clock.
fn merged_candidate<T>(current: &T, patch: &Value) -> OcpiResult<T>
where
    T: serde::Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(current)
        .map_err(|e| OcpiError::Internal(anyhow::anyhow!("serializing stored resource: {e}")))?;
    merge_patch(&mut merged, patch);

    if patch.get(LAST_UPDATED_FIELD).is_none()
        && let Some(obj) = merged.as_object_mut()
    {
        obj.insert(
            LAST_UPDATED_FIELD.to_string(),
            Value::String(crate::utils::rfc3339_millis(Utc::now())),
        );
    }

    serde_json::from_value(merged).map_err(|e| OcpiError::invalid_body(e))
}

/// RFC 7396. Nested objects merge recursively; arrays and scalars replace;
/// explicit `null` removes the field.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_map) => {
            if !target.is_object() {
                *target = Value::Object(serde_json::Map::new());
            }
            let target_map = target.as_object_mut().expect("object ensured above");
            for (key, patch_value) in patch_map {
                if patch_value.is_null() {
                    target_map.remove(key);
                } else {
                    merge_patch(
                        target_map.entry(key.clone()).or_insert(Value::Null),
                        patch_value,
                    );
                }
            }
        }
        other => *target = other.clone(),
    }
}
