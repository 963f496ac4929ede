use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(pub String);

impl CountryCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub String);

impl PartyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The tenant-scoping unit: every addressable resource belongs to exactly
/// one `(country_code, party_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyRef {
    pub country_code: CountryCode,
    pub party_id: PartyId,
}

impl PartyRef {
    pub fn new(country_code: CountryCode, party_id: PartyId) -> Self {
        Self {
            country_code,
            party_id,
        }
    }
}

impl fmt::Display for PartyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.country_code, self.party_id)
    }
}

macro_rules! ci_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ci_id!(LocationId);
ci_id!(EvseUid);
ci_id!(ConnectorId);
ci_id!(TariffId);
ci_id!(SessionId);
ci_id!(CdrId);
ci_id!(TokenUid);

/// The capacity under which an access token is authorized for a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Cpo,
    Emsp,
    Hub,
    Nsp,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModuleId {
    Locations,
    Tariffs,
    Sessions,
    Cdrs,
    Tokens,
    Commands,
}

impl ModuleId {
    /// The role a caller must hold (for the owning party) to touch this
    /// module's resources.
    pub fn required_role(&self) -> Role {
        match self {
            ModuleId::Locations | ModuleId::Tariffs | ModuleId::Sessions | ModuleId::Cdrs => {
                Role::Cpo
            }
            ModuleId::Tokens => Role::Emsp,
            ModuleId::Commands => Role::Emsp,
        }
    }
}

/// A stored entity carrying the conflict-resolution clock.
pub trait VersionedResource {
    fn last_updated(&self) -> DateTime<Utc>;
}

/// A top-level resource addressable as `/{module}/{cc}/{pid}/{id}`.
pub trait ModuleResource: VersionedResource + Clone + Serialize {
    type Id: Clone + Eq + std::hash::Hash + fmt::Display;

    const MODULE: ModuleId;

    fn party(&self) -> PartyRef;
    fn id(&self) -> &Self::Id;

    /// Substring match over the fixed text fields of this resource type.
    /// The needle arrives lowercased.
    fn matches_text(&self, needle: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvseStatus {
    Available,
    Blocked,
    Charging,
    Inoperative,
    OutOfOrder,
    Planned,
    Removed,
    Reserved,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorStandard {
    #[serde(rename = "IEC_62196_T2")]
    Iec62196T2,
    #[serde(rename = "IEC_62196_T2_COMBO")]
    Iec62196T2Combo,
    #[serde(rename = "CHADEMO")]
    Chademo,
    #[serde(rename = "DOMESTIC_F")]
    DomesticF,
    #[serde(rename = "TESLA_S")]
    TeslaS,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorFormat {
    #[serde(rename = "SOCKET")]
    Socket,
    #[serde(rename = "CABLE")]
    Cable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerType {
    #[serde(rename = "AC_1_PHASE")]
    Ac1Phase,
    #[serde(rename = "AC_3_PHASE")]
    Ac3Phase,
    #[serde(rename = "DC")]
    Dc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub standard: ConnectorStandard,
    pub format: ConnectorFormat,
    pub power_type: PowerType,
    pub max_voltage: i32,
    pub max_amperage: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_id: Option<TariffId>,
    pub last_updated: DateTime<Utc>,
}

impl VersionedResource for Connector {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evse {
    pub uid: EvseUid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse_id: Option<String>,
    pub status: EvseStatus,
    pub connectors: Vec<Connector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoLocation>,
    pub last_updated: DateTime<Utc>,
}

impl VersionedResource for Evse {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

impl Evse {
    pub fn connector(&self, id: &ConnectorId) -> Option<&Connector> {
        self.connectors.iter().find(|c| &c.id == id)
    }
}

/// A charging site owned by one CPO party. EVSEs and connectors live inside
/// the aggregate; a child id is resolvable only through its parent chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub country_code: CountryCode,
    pub party_id: PartyId,
    pub id: LocationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
    pub coordinates: GeoLocation,
    pub evses: Vec<Evse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl Location {
    pub fn evse(&self, uid: &EvseUid) -> Option<&Evse> {
        self.evses.iter().find(|e| &e.uid == uid)
    }
}

impl VersionedResource for Location {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

impl ModuleResource for Location {
    type Id = LocationId;

    const MODULE: ModuleId = ModuleId::Locations;

    fn party(&self) -> PartyRef {
        PartyRef::new(self.country_code.clone(), self.party_id.clone())
    }

    fn id(&self) -> &LocationId {
        &self.id
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.id.as_str().to_ascii_lowercase().contains(needle)
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.to_ascii_lowercase().contains(needle))
            || self.address.to_ascii_lowercase().contains(needle)
            || self.city.to_ascii_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TariffDimension {
    Energy,
    Flat,
    ParkingTime,
    Time,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComponent {
    #[serde(rename = "type")]
    pub component_type: TariffDimension,
    pub price: f64,
    pub step_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffElement {
    pub price_components: Vec<PriceComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub country_code: CountryCode,
    pub party_id: PartyId,
    pub id: TariffId,
    pub currency: String,
    pub elements: Vec<TariffElement>,
    pub last_updated: DateTime<Utc>,
}

impl VersionedResource for Tariff {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

impl ModuleResource for Tariff {
    type Id = TariffId;

    const MODULE: ModuleId = ModuleId::Tariffs;

    fn party(&self) -> PartyRef {
        PartyRef::new(self.country_code.clone(), self.party_id.clone())
    }

    fn id(&self) -> &TariffId {
        &self.id
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.id.as_str().to_ascii_lowercase().contains(needle)
            || self.currency.to_ascii_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Invalid,
    Pending,
    Reservation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub country_code: CountryCode,
    pub party_id: PartyId,
    pub id: SessionId,
    pub start_date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
    pub kwh: f64,
    pub token_uid: TokenUid,
    pub location_id: LocationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse_uid: Option<EvseUid>,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    pub status: SessionStatus,
    pub last_updated: DateTime<Utc>,
}

impl VersionedResource for Session {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

impl ModuleResource for Session {
    type Id = SessionId;

    const MODULE: ModuleId = ModuleId::Sessions;

    fn party(&self) -> PartyRef {
        PartyRef::new(self.country_code.clone(), self.party_id.clone())
    }

    fn id(&self) -> &SessionId {
        &self.id
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.id.as_str().to_ascii_lowercase().contains(needle)
            || self
                .location_id
                .as_str()
                .to_ascii_lowercase()
                .contains(needle)
            || self.token_uid.as_str().to_ascii_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cdr {
    pub country_code: CountryCode,
    pub party_id: PartyId,
    pub id: CdrId,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub total_energy: f64,
    pub total_cost: f64,
    pub currency: String,
    pub last_updated: DateTime<Utc>,
}

impl VersionedResource for Cdr {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

impl ModuleResource for Cdr {
    type Id = CdrId;

    const MODULE: ModuleId = ModuleId::Cdrs;

    fn party(&self) -> PartyRef {
        PartyRef::new(self.country_code.clone(), self.party_id.clone())
    }

    fn id(&self) -> &CdrId {
        &self.id
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.id.as_str().to_ascii_lowercase().contains(needle)
            || self
                .session_id
                .as_ref()
                .is_some_and(|s| s.as_str().to_ascii_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    AdHocUser,
    AppUser,
    Other,
    Rfid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhitelistType {
    Always,
    Allowed,
    AllowedOffline,
    Never,
}

/// A driver-facing authorization token issued by an eMSP party. Not to be
/// confused with the peer access tokens handled by the access control gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub country_code: CountryCode,
    pub party_id: PartyId,
    pub uid: TokenUid,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub contract_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_number: Option<String>,
    pub issuer: String,
    pub valid: bool,
    pub whitelist: WhitelistType,
    pub last_updated: DateTime<Utc>,
}

impl VersionedResource for Token {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

impl ModuleResource for Token {
    type Id = TokenUid;

    const MODULE: ModuleId = ModuleId::Tokens;

    fn party(&self) -> PartyRef {
        PartyRef::new(self.country_code.clone(), self.party_id.clone())
    }

    fn id(&self) -> &TokenUid {
        &self.uid
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.uid.as_str().to_ascii_lowercase().contains(needle)
            || self.contract_id.to_ascii_lowercase().contains(needle)
            || self
                .visual_number
                .as_deref()
                .is_some_and(|v| v.to_ascii_lowercase().contains(needle))
    }
}
