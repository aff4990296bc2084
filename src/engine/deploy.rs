use chrono::{DateTime, Utc};

use super::{acting_faction, Error, LevelPolicy};

use crate::entities::{Agent, Event, Portal, Resonator, ResonatorId, MAX_CAPACITY, SLOTS};

pub(super) struct Deploy<'a> {
    pub slot: u8,
    pub level: u8,
    pub agent: &'a Agent,
    pub max_level: u8,
    pub policy: &'a dyn LevelPolicy,
    pub now: DateTime<Utc>,
}

impl Deploy<'_> {
    /// `next_id` is only called once every check passed.
    pub(super) fn apply(
        self,
        portal: &mut Portal,
        next_id: impl FnOnce() -> ResonatorId,
    ) -> Result<(Resonator, Event), Error> {
        let Deploy { slot, level, agent, max_level, policy, now } = self;

        if !(1..=SLOTS).contains(&slot) {
            return Err(Error::InvalidSlot(slot));
        }
        if !(1..=max_level).contains(&level) {
            return Err(Error::InvalidLevel { level, max: max_level });
        }
        let faction = acting_faction(agent)?;
        if portal.owner.is_some_and(|owner| owner != faction) {
            return Err(Error::ForbiddenFaction(faction));
        }
        if portal.resonators.contains_key(&slot) {
            return Err(Error::SlotOccupied(slot));
        }
        let max_health = policy.max_health(level);
        if !(1..=MAX_CAPACITY).contains(&max_health) {
            return Err(Error::InvalidCapacity { level, capacity: max_health });
        }

        let resonator = Resonator {
            id: next_id(),
            location_id: portal.id,
            deployer_user_id: agent.user_id,
            slot_number: slot,
            level,
            health: max_health,
            max_health,
            deployed_at: now,
        };
        portal.resonators.insert(slot, resonator.clone());
        // first resonator on a neutral portal claims it
        if portal.owner.is_none() {
            portal.owner = Some(faction);
        }

        let event = Event::Deployed { user_id: agent.user_id, faction, portal: portal.name.clone(), slot, level };
        Ok((resonator, event))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::Deploy;

    use crate::{
        engine::{Error, FlatHealth, LevelPolicy},
        entities::{Agent, Coordinate, FactionId, Portal, MAX_CAPACITY},
    };

    struct Scaled;

    impl LevelPolicy for Scaled {
        fn max_health(&self, level: u8) -> u32 {
            u32::from(level) * 1000
        }
    }

    fn deploy(portal: &mut Portal, slot: u8, level: u8, agent: &Agent) -> Result<u32, Error> {
        Deploy { slot, level, agent, max_level: 8, policy: &FlatHealth(100), now: Utc::now() }
            .apply(portal, || i64::from(slot))
            .map(|(reso, _)| reso.health())
    }

    fn portal() -> Portal {
        Portal::new(1, "Fontana", Coordinate::new(45.0, 12.0))
    }

    #[test]
    fn neutral_portal_is_claimed() {
        let mut portal = portal();
        let agent = Agent::new(10, FactionId::ENLIGHTENED);
        assert_eq!(deploy(&mut portal, 1, 5, &agent).unwrap(), 100);
        assert_eq!(portal.owner(), Some(FactionId::ENLIGHTENED));
        assert_eq!(portal.total_health(), 100);
        let reso = portal.resonator(1).unwrap();
        assert_eq!(reso.level(), 5);
        assert_eq!(reso.deployer_user_id(), 10);
        assert_eq!(reso.location_id(), 1);
    }

    #[test]
    fn occupied_slot_is_not_overwritten() {
        let mut portal = portal();
        let agent = Agent::new(10, FactionId::ENLIGHTENED);
        for slot in 1..=8 {
            deploy(&mut portal, slot, 1, &agent).unwrap();
        }
        for slot in 1..=8 {
            assert!(matches!(deploy(&mut portal, slot, 8, &agent), Err(Error::SlotOccupied(s)) if s == slot));
        }
        assert!(portal.resonators().all(|reso| reso.level() == 1));
        assert_eq!(portal.total_health(), 800);
    }

    #[test]
    fn hostile_portal_is_rejected() {
        let mut portal = portal();
        deploy(&mut portal, 1, 1, &Agent::new(10, FactionId::ENLIGHTENED)).unwrap();
        let res = deploy(&mut portal, 2, 1, &Agent::new(20, FactionId::RESISTANCE));
        assert!(matches!(res, Err(Error::ForbiddenFaction(FactionId::RESISTANCE))));
        assert!(portal.resonator(2).is_none());
    }

    #[test]
    fn ranges_and_agents() {
        let mut portal = portal();
        let agent = Agent::new(10, FactionId::ENLIGHTENED);
        assert!(matches!(deploy(&mut portal, 0, 1, &agent), Err(Error::InvalidSlot(0))));
        assert!(matches!(deploy(&mut portal, 9, 1, &agent), Err(Error::InvalidSlot(9))));
        assert!(matches!(deploy(&mut portal, 1, 0, &agent), Err(Error::InvalidLevel { level: 0, max: 8 })));
        assert!(matches!(deploy(&mut portal, 1, 9, &agent), Err(Error::InvalidLevel { level: 9, max: 8 })));

        let banned = Agent { is_banned: true, ..agent.clone() };
        assert!(matches!(deploy(&mut portal, 1, 1, &banned), Err(Error::Banned(10))));
        let factionless = Agent { faction_id: None, ..agent };
        assert!(matches!(deploy(&mut portal, 1, 1, &factionless), Err(Error::NoFaction(10))));

        assert!(portal.is_neutral());
        assert_eq!(portal.resonators().count(), 0);
    }

    #[test]
    fn policy_sets_capacity() {
        let mut portal = portal();
        let agent = Agent::new(10, FactionId::RESISTANCE);
        let (reso, _) = Deploy { slot: 3, level: 4, agent: &agent, max_level: 8, policy: &Scaled, now: Utc::now() }
            .apply(&mut portal, || 1)
            .unwrap();
        assert_eq!(reso.health(), 4000);
        assert_eq!(reso.max_health(), 4000);
        assert_eq!(portal.max_health(), 4000);
    }

    #[test]
    fn capacity_out_of_bounds() {
        let mut portal = portal();
        let agent = Agent::new(10, FactionId::RESISTANCE);
        for capacity in [0, MAX_CAPACITY + 1] {
            let policy = FlatHealth(capacity);
            let res = Deploy { slot: 1, level: 2, agent: &agent, max_level: 8, policy: &policy, now: Utc::now() }
                .apply(&mut portal, || 1);
            assert!(matches!(res, Err(Error::InvalidCapacity { level: 2, capacity: c }) if c == capacity));
        }
        assert!(portal.is_neutral());
        assert_eq!(portal.resonators().count(), 0);
    }

    #[test]
    fn id_is_drawn_on_success_only() {
        let mut portal = portal();
        let agent = Agent::new(10, FactionId::RESISTANCE);
        let mut drawn = 0;
        let res = Deploy { slot: 9, level: 1, agent: &agent, max_level: 8, policy: &FlatHealth(100), now: Utc::now() }
            .apply(&mut portal, || {
                drawn += 1;
                1
            });
        assert!(res.is_err());
        assert_eq!(drawn, 0);
    }
}
