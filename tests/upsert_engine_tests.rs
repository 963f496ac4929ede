//! Upsert/merge engine contract tests: convergence under replay, the
//! downgrade rule, merge-patch semantics, and nested aggregate writes.

mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use common::{evse, location, party, tariff, ts};
use ocpi_node::OcpiError;
use ocpi_node::ident::{EvseAddress, LocationAddress};
use ocpi_node::model::{EvseStatus, EvseUid, LocationId, TariffId, VersionedResource};
use ocpi_node::store::{ModuleStore, UpsertOutcome};
use ocpi_node::upsert;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

#[test]
fn put_creates_then_updates() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = TariffId("T1".into());
    let t0 = ts("2024-01-01T00:00:00Z");

    let (outcome, _) = upsert::put(
        &store,
        &owner,
        &id,
        tariff("DE", "ABC", "T1", t0),
        false,
        &cancel(),
    )
    .unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    let (outcome, _) = upsert::put(
        &store,
        &owner,
        &id,
        tariff("DE", "ABC", "T1", t0 + Duration::hours(1)),
        false,
        &cancel(),
    )
    .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
}

#[test]
fn put_is_idempotent_for_unchanged_last_updated() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = TariffId("T1".into());
    let t0 = ts("2024-01-01T00:00:00Z");

    upsert::put(&store, &owner, &id, tariff("DE", "ABC", "T1", t0), false, &cancel()).unwrap();
    let first = store.get(&owner, &id).unwrap();

    // Same last_updated replays as a no-op update, never a conflict.
    let (outcome, _) =
        upsert::put(&store, &owner, &id, tariff("DE", "ABC", "T1", t0), false, &cancel())
            .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let second = store.get(&owner, &id).unwrap();
    assert_eq!(first.etag, second.etag);
    assert_eq!(first.created, second.created);
    assert_eq!(first.resource, second.resource);
}

#[test]
fn stale_put_is_rejected_and_store_untouched() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = LocationId("LOC1".into());
    let t0 = ts("2024-01-01T00:00:00Z");

    upsert::put(
        &store,
        &owner,
        &id,
        location("DE", "ABC", "LOC1", t0),
        false,
        &cancel(),
    )
    .unwrap();

    let stale = location("DE", "ABC", "LOC1", ts("2023-12-31T23:59:59Z"));
    let err = upsert::put(&store, &owner, &id, stale.clone(), false, &cancel()).unwrap_err();
    assert_matches!(err, OcpiError::StaleWrite { .. });
    assert_eq!(store.get(&owner, &id).unwrap().resource.last_updated(), t0);

    // The only override is the explicit downgrade flag.
    upsert::put(&store, &owner, &id, stale, true, &cancel()).unwrap();
    assert_eq!(
        store.get(&owner, &id).unwrap().resource.last_updated(),
        ts("2023-12-31T23:59:59Z")
    );
}

#[test]
fn patch_requires_existing_resource() {
    let store: ModuleStore<ocpi_node::model::Tariff> = ModuleStore::new();
    let err = upsert::patch(
        &store,
        &party("DE", "ABC"),
        &TariffId("T404".into()),
        json!({"currency": "SEK"}),
        false,
        &cancel(),
    )
    .unwrap_err();
    assert_matches!(err, OcpiError::NotFound { .. });
    assert!(store.is_empty());
}

#[test]
fn patch_merges_fields_and_replaces_arrays() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = LocationId("LOC1".into());
    let t0 = ts("2024-01-01T00:00:00Z");
    let mut loc = location("DE", "ABC", "LOC1", t0);
    loc.evses = vec![evse("LOC1-E1", t0), evse("LOC1-E2", t0)];
    upsert::put(&store, &owner, &id, loc, false, &cancel()).unwrap();

    let patched_evse = serde_json::to_value(evse("LOC1-E9", t0)).unwrap();
    upsert::patch(
        &store,
        &owner,
        &id,
        json!({
            "city": "Amsterdam",
            "name": null,
            "evses": [patched_evse],
            "last_updated": "2024-01-02T00:00:00Z",
        }),
        false,
        &cancel(),
    )
    .unwrap();

    let stored = store.get(&owner, &id).unwrap().resource;
    assert_eq!(stored.city, "Amsterdam");
    assert_eq!(stored.name, None);
    // Arrays replace wholesale, never element-merge.
    assert_eq!(stored.evses.len(), 1);
    assert_eq!(stored.evses[0].uid, EvseUid("LOC1-E9".into()));
    assert_eq!(stored.last_updated, ts("2024-01-02T00:00:00Z"));
    assert_eq!(stored.address, "Stationsplein 1");
}

#[test]
fn patch_without_last_updated_advances_the_clock() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = TariffId("T1".into());
    let t0 = ts("2024-01-01T00:00:00Z");
    upsert::put(&store, &owner, &id, tariff("DE", "ABC", "T1", t0), false, &cancel()).unwrap();

    upsert::patch(&store, &owner, &id, json!({"currency": "SEK"}), false, &cancel()).unwrap();

    let stored = store.get(&owner, &id).unwrap().resource;
    assert_eq!(stored.currency, "SEK");
    assert!(stored.last_updated > t0);
}

#[test]
fn stale_patch_is_rejected() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = TariffId("T1".into());
    upsert::put(
        &store,
        &owner,
        &id,
        tariff("DE", "ABC", "T1", ts("2024-06-01T00:00:00Z")),
        false,
        &cancel(),
    )
    .unwrap();

    let err = upsert::patch(
        &store,
        &owner,
        &id,
        json!({"currency": "SEK", "last_updated": "2024-01-01T00:00:00Z"}),
        false,
        &cancel(),
    )
    .unwrap_err();
    assert_matches!(err, OcpiError::StaleWrite { .. });
    assert_eq!(store.get(&owner, &id).unwrap().resource.currency, "EUR");
}

#[test]
fn patch_cannot_move_a_resource_between_parties() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = TariffId("T1".into());
    upsert::put(
        &store,
        &owner,
        &id,
        tariff("DE", "ABC", "T1", ts("2024-01-01T00:00:00Z")),
        false,
        &cancel(),
    )
    .unwrap();

    let err = upsert::patch(
        &store,
        &owner,
        &id,
        json!({"party_id": "XYZ", "last_updated": "2024-02-01T00:00:00Z"}),
        false,
        &cancel(),
    )
    .unwrap_err();
    assert_matches!(err, OcpiError::InvalidBody { .. });
}

fn evse_addr(cc: &str, pid: &str, loc: &str, uid: &str) -> EvseAddress {
    EvseAddress {
        location: LocationAddress {
            party: party(cc, pid),
            location_id: LocationId(loc.into()),
        },
        evse_uid: EvseUid(uid.into()),
    }
}

#[test]
fn evse_put_applies_the_same_downgrade_rule() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = LocationId("LOC1".into());
    let t0 = ts("2024-01-01T00:00:00Z");
    upsert::put(
        &store,
        &owner,
        &id,
        location("DE", "ABC", "LOC1", t0),
        false,
        &cancel(),
    )
    .unwrap();

    let addr = evse_addr("DE", "ABC", "LOC1", "LOC1-E1");
    let stale = evse("LOC1-E1", t0 - Duration::hours(1));
    let err = upsert::put_evse(&store, &addr, stale, false, &cancel()).unwrap_err();
    assert_matches!(err, OcpiError::StaleWrite { .. });

    let fresh = evse("LOC1-E1", t0 + Duration::hours(1));
    let outcome = upsert::put_evse(&store, &addr, fresh, false, &cancel()).unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    // The parent clock follows the newest child.
    let stored = store.get(&owner, &id).unwrap().resource;
    assert_eq!(stored.last_updated, t0 + Duration::hours(1));
}

#[test]
fn evse_put_against_missing_location_is_not_found() {
    let store: ModuleStore<ocpi_node::model::Location> = ModuleStore::new();
    let addr = evse_addr("DE", "ABC", "NOPE", "E1");
    let err = upsert::put_evse(
        &store,
        &addr,
        evse("E1", ts("2024-01-01T00:00:00Z")),
        false,
        &cancel(),
    )
    .unwrap_err();
    assert_matches!(err, OcpiError::NotFound { .. });
}

#[test]
fn new_evse_uid_is_a_child_creation() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = LocationId("LOC1".into());
    let t0 = ts("2024-01-01T00:00:00Z");
    upsert::put(
        &store,
        &owner,
        &id,
        location("DE", "ABC", "LOC1", t0),
        false,
        &cancel(),
    )
    .unwrap();

    let addr = evse_addr("DE", "ABC", "LOC1", "LOC1-E2");
    let outcome =
        upsert::put_evse(&store, &addr, evse("LOC1-E2", t0), false, &cancel()).unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);
    assert_eq!(store.get(&owner, &id).unwrap().resource.evses.len(), 2);
}

#[test]
fn evse_patch_merges_within_the_aggregate() {
    let store = ModuleStore::new();
    let owner = party("DE", "ABC");
    let id = LocationId("LOC1".into());
    let t0 = ts("2024-01-01T00:00:00Z");
    upsert::put(
        &store,
        &owner,
        &id,
        location("DE", "ABC", "LOC1", t0),
        false,
        &cancel(),
    )
    .unwrap();

    let addr = evse_addr("DE", "ABC", "LOC1", "LOC1-E1");
    upsert::patch_evse(
        &store,
        &addr,
        json!({"status": "CHARGING", "last_updated": "2024-01-02T00:00:00Z"}),
        false,
        &cancel(),
    )
    .unwrap();

    let stored = store.get(&owner, &id).unwrap().resource;
    let patched = stored.evse(&EvseUid("LOC1-E1".into())).unwrap();
    assert_eq!(patched.status, EvseStatus::Charging);
    assert_eq!(patched.connectors.len(), 1);
}

#[test]
fn concurrent_puts_to_one_id_serialize_newest_wins() {
    use std::sync::Arc;

    let store = Arc::new(ModuleStore::new());
    let owner = party("DE", "ABC");
    let id = TariffId("T1".into());
    let older = ts("2024-01-01T00:00:00Z");
    let newer = ts("2024-06-01T00:00:00Z");

    for _ in 0..50 {
        store.remove(&owner, &id);
        let handles: Vec<_> = [older, newer]
            .into_iter()
            .map(|stamp| {
                let store = store.clone();
                let owner = owner.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    let _ = upsert::put(
                        &store,
                        &owner,
                        &id,
                        tariff("DE", "ABC", "T1", stamp),
                        false,
                        &CancellationToken::new(),
                    );
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Whatever the arrival order, the later-stamped write is live.
        assert_eq!(
            store.get(&owner, &id).unwrap().resource.last_updated(),
            newer
        );
    }
}
