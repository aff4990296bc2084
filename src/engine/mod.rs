use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use chrono::{TimeDelta, Utc};
use sea_orm::DbErr;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error};

use crate::{
    config::Rules,
    entities::{
        Agent, Area, AttackResult, Coordinate, Event, FactionId, Portal, PortalId, PortalStatus, PortalView,
        RepairResult, Resonator, UserId,
    },
};

mod attack;
mod deploy;
mod repair;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Portal {0} not found")]
    PortalNotFound(PortalId),
    #[error("Slot {0} is empty")]
    SlotEmpty(u8),
    #[error("Invalid slot {0}, slots go from 1 to 8")]
    InvalidSlot(u8),
    #[error("Invalid level {level}, levels go from 1 to {max}")]
    InvalidLevel { level: u8, max: u8 },
    #[error("Invalid damage {0}")]
    InvalidDamage(u32),
    #[error("Invalid repair amount {0}")]
    InvalidAmount(u32),
    #[error("Invalid coordinate {0}, {1}")]
    InvalidCoordinate(f64, f64),
    #[error("Slot {0} is already occupied")]
    SlotOccupied(u8),
    #[error("Faction {0} can't act on this portal")]
    ForbiddenFaction(FactionId),
    #[error("Faction {0} can't attack its own portal")]
    SelfAttackForbidden(FactionId),
    #[error("Agent {0} is banned")]
    Banned(UserId),
    #[error("Agent {0} has no faction")]
    NoFaction(UserId),
    #[error("Agent {0} isn't an admin")]
    AdminRequired(UserId),
    #[error("Level {level} resonators can't hold {capacity} health")]
    InvalidCapacity { level: u8, capacity: u32 },
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Forbidden,
    Conflict,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PortalNotFound(_) | Error::SlotEmpty(_) => ErrorKind::NotFound,
            Error::InvalidSlot(_)
            | Error::InvalidLevel { .. }
            | Error::InvalidDamage(_)
            | Error::InvalidAmount(_)
            | Error::InvalidCoordinate(..) => ErrorKind::Validation,
            Error::ForbiddenFaction(_)
            | Error::SelfAttackForbidden(_)
            | Error::Banned(_)
            | Error::NoFaction(_)
            | Error::AdminRequired(_) => ErrorKind::Forbidden,
            Error::SlotOccupied(_) => ErrorKind::Conflict,
            Error::InvalidCapacity { .. } | Error::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Per-slot capacity of a freshly deployed resonator, deploys fail outside `1..=MAX_CAPACITY`.
pub trait LevelPolicy: Send + Sync {
    fn max_health(&self, level: u8) -> u32;
}

/// Same capacity at every level.
#[derive(Copy, Clone, Debug)]
pub struct FlatHealth(pub u32);

impl LevelPolicy for FlatHealth {
    fn max_health(&self, _level: u8) -> u32 {
        self.0
    }
}

/// Where committed portals end up. The unit store keeps everything in memory.
pub trait Store: Send + Sync {
    fn save(&self, portal: &Portal) -> impl Future<Output = Result<(), DbErr>> + Send;
}

impl Store for () {
    async fn save(&self, _portal: &Portal) -> Result<(), DbErr> {
        Ok(())
    }
}

fn acting_faction(agent: &Agent) -> Result<FactionId, Error> {
    if agent.is_banned {
        return Err(Error::Banned(agent.user_id));
    }
    agent.faction_id.ok_or(Error::NoFaction(agent.user_id))
}

/// Authoritative portal state.
///
/// Every portal sits behind its own lock, so commands on the same portal are applied one at a time
/// while different portals never wait on each other. A command works on a copy that replaces the
/// live portal only once the store accepted it.
pub struct PortalEngine<S = ()> {
    portals: RwLock<HashMap<PortalId, Arc<Mutex<Portal>>>>,
    store: S,
    policy: Arc<dyn LevelPolicy>,
    max_level: u8,
    under_attack: TimeDelta,
    next_portal_id: AtomicI64,
    next_resonator_id: AtomicI64,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl<S: Store> PortalEngine<S> {
    pub fn new(store: S, rules: &Rules) -> Self {
        PortalEngine {
            portals: RwLock::new(HashMap::new()),
            store,
            policy: Arc::new(FlatHealth(rules.resonator_health())),
            max_level: rules.max_level(),
            under_attack: rules.under_attack_window(),
            next_portal_id: AtomicI64::new(1),
            next_resonator_id: AtomicI64::new(1),
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: impl LevelPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Loads already persisted portals, ids keep growing from the highest one seen.
    pub fn with_portals(mut self, portals: impl IntoIterator<Item = Portal>) -> Self {
        let map = self.portals.get_mut();
        for portal in portals {
            let max_reso = portal.resonators().map(Resonator::id).max().unwrap_or_default();
            self.next_portal_id.fetch_max(portal.id + 1, Ordering::Relaxed);
            self.next_resonator_id.fetch_max(max_reso + 1, Ordering::Relaxed);
            map.insert(portal.id, Arc::new(Mutex::new(portal)));
        }
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn len(&self) -> usize {
        self.portals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.portals.read().await.is_empty()
    }

    /// Admin command, the new portal starts neutral.
    pub async fn create_portal(&self, agent: &Agent, name: &str, coordinate: Coordinate) -> Result<PortalView, Error> {
        if !agent.is_admin() {
            return Err(Error::AdminRequired(agent.user_id));
        }
        self.insert_portal(name, coordinate).await
    }

    /// Creates a portal without checking who asked, used for config seeds.
    pub async fn insert_portal(&self, name: &str, coordinate: Coordinate) -> Result<PortalView, Error> {
        if !coordinate.is_valid() {
            return Err(Error::InvalidCoordinate(coordinate.latitude, coordinate.longitude));
        }
        let mut portals = self.portals.write().await;
        let portal = Portal::new(self.next_portal_id.fetch_add(1, Ordering::Relaxed), name, coordinate);
        self.store.save(&portal).await.inspect_err(|err| error!("Portal {} not saved: {err}", portal.id))?;
        debug!("Created portal {} {:?}", portal.id, portal.name);
        let view = portal.view();
        portals.insert(portal.id, Arc::new(Mutex::new(portal)));
        Ok(view)
    }

    async fn entry(&self, id: PortalId) -> Result<Arc<Mutex<Portal>>, Error> {
        self.portals.read().await.get(&id).cloned().ok_or(Error::PortalNotFound(id))
    }

    async fn read<T>(&self, id: PortalId, f: impl FnOnce(&Portal) -> T) -> Result<T, Error> {
        let entry = self.entry(id).await?;
        let portal = entry.lock().await;
        Ok(f(&portal))
    }

    /// Runs `f` on a copy of the portal, persists it and swaps it in.
    async fn mutate<T, F>(&self, id: PortalId, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Portal) -> Result<T, Error> + Send,
        T: Send,
    {
        let entry = self.entry(id).await?;
        let mut portal = entry.lock().await;
        let mut next = portal.clone();
        let out = f(&mut next)?;
        self.store.save(&next).await.inspect_err(|err| error!("Portal {id} not saved: {err}"))?;
        *portal = next;
        Ok(out)
    }

    fn publish(&self, events: impl IntoIterator<Item = Event>) {
        let Some(tx) = &self.events else {
            return;
        };
        for event in events {
            if let Err(err) = tx.send(event) {
                error!("Event feed error: {err}");
            }
        }
    }

    pub async fn portal(&self, id: PortalId) -> Result<PortalView, Error> {
        self.read(id, Portal::view).await
    }

    pub async fn resonators(&self, id: PortalId) -> Result<Vec<Resonator>, Error> {
        self.read(id, |portal| portal.resonators().cloned().collect()).await
    }

    pub async fn status(&self, id: PortalId) -> Result<PortalStatus, Error> {
        let window = self.under_attack;
        self.read(id, |portal| portal.status(Utc::now(), window)).await
    }

    /// Portals inside `area`, ordered by id.
    pub async fn locations(&self, area: &Area) -> Vec<PortalView> {
        let entries = self.portals.read().await.values().cloned().collect::<Vec<_>>();
        let mut views = Vec::new();
        for entry in entries {
            let portal = entry.lock().await;
            if area.contains(&portal.coordinate) {
                views.push(portal.view());
            }
        }
        views.sort_by_key(|view| view.id);
        views
    }

    pub async fn deploy(&self, portal_id: PortalId, slot: u8, level: u8, agent: &Agent) -> Result<Resonator, Error> {
        let (resonator, event) = self
            .mutate(portal_id, |portal| {
                deploy::Deploy {
                    slot,
                    level,
                    agent,
                    max_level: self.max_level,
                    policy: self.policy.as_ref(),
                    now: Utc::now(),
                }
                .apply(portal, || self.next_resonator_id.fetch_add(1, Ordering::Relaxed))
            })
            .await?;
        debug!("Agent {} deployed resonator {} on portal {portal_id} slot {slot}", agent.user_id, resonator.id);
        self.publish([event]);
        Ok(resonator)
    }

    pub async fn attack(&self, portal_id: PortalId, damage: u32, agent: &Agent) -> Result<AttackResult, Error> {
        let (result, events) = self.mutate(portal_id, |portal| attack::apply(portal, damage, agent, Utc::now())).await?;
        debug!(
            "Agent {} attacked portal {portal_id}: {} damage, destroyed {:?}",
            agent.user_id, result.damage_dealt, result.destroyed_resonators
        );
        self.publish(events);
        Ok(result)
    }

    pub async fn repair(
        &self,
        portal_id: PortalId,
        slot: u8,
        amount: u32,
        agent: &Agent,
    ) -> Result<RepairResult, Error> {
        let (result, event) = self.mutate(portal_id, |portal| repair::apply(portal, slot, amount, agent)).await?;
        debug!("Agent {} repaired portal {portal_id} slot {slot} by {}", agent.user_id, result.repaired_amount);
        self.publish(event);
        Ok(result)
    }
}
