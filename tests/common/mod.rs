#![allow(dead_code)]

use chrono::{DateTime, Utc};
use ocpi_node::auth::{AccessBinding, BindingStatus, PartyRole};
use ocpi_node::model::{
    Cdr, CdrId, Connector, ConnectorFormat, ConnectorId, ConnectorStandard, CountryCode, Evse,
    EvseStatus, EvseUid, GeoLocation, Location, LocationId, PartyId, PartyRef, PowerType, Role,
    Session, SessionId, SessionStatus, Tariff, TariffId, Token, TokenType, TokenUid,
    WhitelistType,
};
use ocpi_node::{AppState, ServerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid test timestamp")
        .with_timezone(&Utc)
}

pub fn party(cc: &str, pid: &str) -> PartyRef {
    PartyRef::new(CountryCode(cc.into()), PartyId(pid.into()))
}

pub fn state() -> Arc<AppState> {
    state_with(|_| {})
}

pub fn state_with(customize: impl FnOnce(&mut ServerConfig)) -> Arc<AppState> {
    let mut config = ServerConfig::default();
    customize(&mut config);
    Arc::new(AppState::new(Arc::new(config), CancellationToken::new()).expect("state builds"))
}

pub fn binding(token: &str, cc: &str, pid: &str, role: Role) -> AccessBinding {
    AccessBinding {
        token: token.into(),
        status: BindingStatus::Allowed,
        parties: vec![PartyRole {
            country_code: CountryCode(cc.into()),
            party_id: PartyId(pid.into()),
            role,
        }],
    }
}

pub fn blocked_binding(token: &str, cc: &str, pid: &str, role: Role) -> AccessBinding {
    AccessBinding {
        status: BindingStatus::Blocked,
        ..binding(token, cc, pid, role)
    }
}

pub fn connector(id: &str, last_updated: DateTime<Utc>) -> Connector {
    Connector {
        id: ConnectorId(id.into()),
        standard: ConnectorStandard::Iec62196T2,
        format: ConnectorFormat::Socket,
        power_type: PowerType::Ac3Phase,
        max_voltage: 400,
        max_amperage: 32,
        tariff_id: None,
        last_updated,
    }
}

pub fn evse(uid: &str, last_updated: DateTime<Utc>) -> Evse {
    Evse {
        uid: EvseUid(uid.into()),
        evse_id: None,
        status: EvseStatus::Available,
        connectors: vec![connector("1", last_updated)],
        coordinates: None,
        last_updated,
    }
}

pub fn location(cc: &str, pid: &str, id: &str, last_updated: DateTime<Utc>) -> Location {
    Location {
        country_code: CountryCode(cc.into()),
        party_id: PartyId(pid.into()),
        id: LocationId(id.into()),
        name: Some(format!("Site {id}")),
        address: "Stationsplein 1".into(),
        city: "Utrecht".into(),
        postal_code: Some("3511 ED".into()),
        country: "NLD".into(),
        coordinates: GeoLocation {
            latitude: "52.0894".into(),
            longitude: "5.1077".into(),
        },
        evses: vec![evse(&format!("{id}-E1"), last_updated)],
        time_zone: Some("Europe/Amsterdam".into()),
        last_updated,
    }
}

pub fn tariff(cc: &str, pid: &str, id: &str, last_updated: DateTime<Utc>) -> Tariff {
    Tariff {
        country_code: CountryCode(cc.into()),
        party_id: PartyId(pid.into()),
        id: TariffId(id.into()),
        currency: "EUR".into(),
        elements: vec![],
        last_updated,
    }
}

pub fn session(cc: &str, pid: &str, id: &str, last_updated: DateTime<Utc>) -> Session {
    Session {
        country_code: CountryCode(cc.into()),
        party_id: PartyId(pid.into()),
        id: SessionId(id.into()),
        start_date_time: last_updated,
        end_date_time: None,
        kwh: 7.5,
        token_uid: TokenUid("TOK1".into()),
        location_id: LocationId("LOC1".into()),
        evse_uid: None,
        currency: "EUR".into(),
        total_cost: None,
        status: SessionStatus::Active,
        last_updated,
    }
}

pub fn cdr(cc: &str, pid: &str, id: &str, last_updated: DateTime<Utc>) -> Cdr {
    Cdr {
        country_code: CountryCode(cc.into()),
        party_id: PartyId(pid.into()),
        id: CdrId(id.into()),
        start_date_time: last_updated,
        end_date_time: last_updated,
        session_id: None,
        total_energy: 12.3,
        total_cost: 4.56,
        currency: "EUR".into(),
        last_updated,
    }
}

pub fn driver_token(cc: &str, pid: &str, uid: &str, last_updated: DateTime<Utc>) -> Token {
    Token {
        country_code: CountryCode(cc.into()),
        party_id: PartyId(pid.into()),
        uid: TokenUid(uid.into()),
        token_type: TokenType::Rfid,
        contract_id: format!("{cc}-{pid}-{uid}"),
        visual_number: None,
        issuer: "Example eMSP".into(),
        valid: true,
        whitelist: WhitelistType::Allowed,
        last_updated,
    }
}

/// Seed a resource through the engine path so `created`/`etag` bookkeeping
/// is realistic.
pub fn seed<R>(store: &ocpi_node::store::ModuleStore<R>, resource: R)
where
    R: ocpi_node::model::ModuleResource,
{
    let party = resource.party();
    let id = resource.id().clone();
    store
        .update_with::<std::convert::Infallible, _>(&party, &id, |_| Ok(resource))
        .expect("seed upsert");
}
