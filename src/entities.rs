use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::symbols;

pub type PortalId = i64;
pub type ResonatorId = i64;
pub type UserId = i64;

/// Number of resonator slots on every portal, numbered from 1.
pub const SLOTS: u8 = 8;
/// Highest resonator level the game knows about.
pub const MAX_LEVEL: u8 = 8;
/// Largest capacity a single resonator may have, a full portal still fits in a `u32`.
pub const MAX_CAPACITY: u32 = u32::MAX / SLOTS as u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub u32);

impl FactionId {
    pub const ENLIGHTENED: FactionId = FactionId(1);
    pub const RESISTANCE: FactionId = FactionId(2);
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FactionId::ENLIGHTENED => write!(f, "{}", symbols::GREEN),
            FactionId::RESISTANCE => write!(f, "{}", symbols::BLUE),
            _ => write!(f, "{}", symbols::PURPLE),
        }
    }
}

/// The reference client sends `0` for "no faction", we keep that as `None`.
pub(crate) fn neutral_as_none<'de, D>(deserializer: D) -> Result<Option<FactionId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.filter(|id| *id != 0).map(FactionId))
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Acting user, as handed over by the session layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub user_id: UserId,
    #[serde(default, deserialize_with = "neutral_as_none")]
    pub faction_id: Option<FactionId>,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub role: Role,
}

impl Agent {
    pub fn new(user_id: UserId, faction: FactionId) -> Self {
        Agent { user_id, faction_id: Some(faction), is_banned: false, role: Role::User }
    }

    pub fn admin(user_id: UserId) -> Self {
        Agent { user_id, faction_id: None, is_banned: false, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Bounding box used by map queries, bounds are inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct Area {
    #[serde(rename = "minLat")]
    pub min_lat: f64,
    #[serde(rename = "minLon")]
    pub min_lon: f64,
    #[serde(rename = "maxLat")]
    pub max_lat: f64,
    #[serde(rename = "maxLon")]
    pub max_lon: f64,
}

impl Area {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&coordinate.latitude)
            && (self.min_lon..=self.max_lon).contains(&coordinate.longitude)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resonator {
    pub(crate) id: ResonatorId,
    pub(crate) location_id: PortalId,
    pub(crate) deployer_user_id: UserId,
    pub(crate) slot_number: u8,
    pub(crate) level: u8,
    pub(crate) health: u32,
    pub(crate) max_health: u32,
    pub(crate) deployed_at: DateTime<Utc>,
}

impl Resonator {
    pub fn id(&self) -> ResonatorId {
        self.id
    }

    pub fn location_id(&self) -> PortalId {
        self.location_id
    }

    pub fn deployer_user_id(&self) -> UserId {
        self.deployer_user_id
    }

    pub fn slot_number(&self) -> u8 {
        self.slot_number
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    pub fn deployed_at(&self) -> DateTime<Utc> {
        self.deployed_at
    }
}

/// Canonical portal state. Aggregates are always computed from the resonators.
#[derive(Clone, Debug, PartialEq)]
pub struct Portal {
    pub(crate) id: PortalId,
    pub(crate) name: String,
    pub(crate) coordinate: Coordinate,
    pub(crate) owner: Option<FactionId>,
    pub(crate) resonators: BTreeMap<u8, Resonator>,
    pub(crate) last_attack_at: Option<DateTime<Utc>>,
}

impl Portal {
    pub fn new(id: PortalId, name: impl Into<String>, coordinate: Coordinate) -> Self {
        Portal {
            id,
            name: name.into(),
            coordinate,
            owner: None,
            resonators: BTreeMap::new(),
            last_attack_at: None,
        }
    }

    pub fn id(&self) -> PortalId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn owner(&self) -> Option<FactionId> {
        self.owner
    }

    pub fn is_neutral(&self) -> bool {
        self.owner.is_none()
    }

    /// Live resonators in ascending slot order.
    pub fn resonators(&self) -> impl Iterator<Item = &Resonator> {
        self.resonators.values()
    }

    pub fn resonator(&self, slot: u8) -> Option<&Resonator> {
        self.resonators.get(&slot)
    }

    pub fn last_attack_at(&self) -> Option<DateTime<Utc>> {
        self.last_attack_at
    }

    pub fn total_health(&self) -> u32 {
        self.resonators.values().map(|reso| reso.health).sum()
    }

    pub fn max_health(&self) -> u32 {
        self.resonators.values().map(|reso| reso.max_health).sum()
    }

    pub fn view(&self) -> PortalView {
        PortalView {
            id: self.id,
            name: self.name.clone(),
            coordinate: self.coordinate,
            owner_faction_id: self.owner,
            resonators: self.resonators.values().cloned().collect(),
            total_health: self.total_health(),
            max_health: self.max_health(),
        }
    }

    /// An attack accepted less than `window` before `now` marks the portal as under attack.
    pub fn status(&self, now: DateTime<Utc>, window: TimeDelta) -> PortalStatus {
        PortalStatus {
            portal_id: self.id,
            owner_faction_id: self.owner,
            total_health: self.total_health(),
            max_health: self.max_health(),
            resonators: self.resonators.values().cloned().collect(),
            is_under_attack: self.last_attack_at.is_some_and(|at| now - at < window),
            last_attack_time: self.last_attack_at,
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            Some(faction) => write!(f, "{} {}", faction, self.name),
            None => write!(f, "{} {}", symbols::WHITE, self.name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalView {
    pub id: PortalId,
    pub name: String,
    pub coordinate: Coordinate,
    pub owner_faction_id: Option<FactionId>,
    pub resonators: Vec<Resonator>,
    pub total_health: u32,
    /// Sum of live capacities, 0 with no resonators so clients must guard the ratio.
    pub max_health: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalStatus {
    pub portal_id: PortalId,
    pub owner_faction_id: Option<FactionId>,
    pub total_health: u32,
    /// 0 on an empty portal, same as [`PortalView::max_health`].
    pub max_health: u32,
    pub resonators: Vec<Resonator>,
    pub is_under_attack: bool,
    pub last_attack_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackResult {
    pub success: bool,
    pub damage_dealt: u32,
    /// Slots whose resonator was destroyed, ascending.
    pub destroyed_resonators: Vec<u8>,
    pub new_owner_faction_id: Option<FactionId>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairResult {
    pub success: bool,
    pub repaired_amount: u32,
    pub resonator_health: u32,
    pub message: String,
}

/// Committed transitions, published on the engine feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Deployed { user_id: UserId, faction: FactionId, portal: String, slot: u8, level: u8 },
    Destroyed { faction: FactionId, portal: String, slot: u8 },
    Captured { faction: FactionId, portal: String },
    Repaired { user_id: UserId, faction: FactionId, portal: String, slot: u8, amount: u32 },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Deployed { user_id, faction, portal, slot, level } => write!(
                f,
                "{} agent {} {}deployed a L{} Resonator on {} slot {}",
                faction,
                user_id,
                symbols::BRICK,
                level,
                portal,
                slot
            ),
            Event::Destroyed { faction, portal, slot } => {
                write!(f, "{} {}destroyed the Resonator on {} slot {}", faction, symbols::EXPLOSION, portal, slot)
            }
            Event::Captured { faction, portal } => {
                write!(f, "{} {}captured {}", faction, symbols::GOLF, portal)
            }
            Event::Repaired { user_id, faction, portal, slot, amount } => write!(
                f,
                "{} agent {} {}repaired {} slot {} by {}",
                faction,
                user_id,
                symbols::WRENCH,
                portal,
                slot,
                amount
            ),
        }
    }
}
