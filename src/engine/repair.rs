use super::{acting_faction, Error};

use crate::entities::{Agent, Event, Portal, RepairResult, SLOTS};

pub(super) fn apply(
    portal: &mut Portal,
    slot: u8,
    amount: u32,
    agent: &Agent,
) -> Result<(RepairResult, Option<Event>), Error> {
    if amount == 0 {
        return Err(Error::InvalidAmount(amount));
    }
    if !(1..=SLOTS).contains(&slot) {
        return Err(Error::InvalidSlot(slot));
    }
    let faction = acting_faction(agent)?;
    if portal.owner != Some(faction) {
        return Err(Error::ForbiddenFaction(faction));
    }
    let reso = portal.resonators.get_mut(&slot).ok_or(Error::SlotEmpty(slot))?;

    let before = reso.health;
    reso.health = reso.health.saturating_add(amount).min(reso.max_health);
    let repaired = reso.health - before;

    let (message, event) = if repaired == 0 {
        (String::from("Resonator already at full health"), None)
    } else {
        let event =
            Event::Repaired { user_id: agent.user_id, faction, portal: portal.name.clone(), slot, amount: repaired };
        (format!("Repaired {repaired} health on slot {slot}"), Some(event))
    };

    Ok((RepairResult { success: true, repaired_amount: repaired, resonator_health: reso.health, message }, event))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::{
        engine::Error,
        entities::{Agent, Coordinate, FactionId, Portal, Resonator},
    };

    fn portal(health: u32) -> Portal {
        let mut portal = Portal::new(1, "Fontana", Coordinate::new(45.0, 12.0));
        portal.owner = Some(FactionId::ENLIGHTENED);
        portal.resonators.insert(
            3,
            Resonator {
                id: 1,
                location_id: 1,
                deployer_user_id: 1,
                slot_number: 3,
                level: 2,
                health,
                max_health: 100,
                deployed_at: Utc::now(),
            },
        );
        portal
    }

    fn owner() -> Agent {
        Agent::new(1, FactionId::ENLIGHTENED)
    }

    #[test]
    fn repair_is_capped() {
        let mut portal = portal(70);
        let (res, event) = super::apply(&mut portal, 3, 50, &owner()).unwrap();
        assert!(res.success);
        assert_eq!(res.repaired_amount, 30);
        assert_eq!(res.resonator_health, 100);
        assert_eq!(portal.total_health(), 100);
        assert!(event.is_some());
    }

    #[test]
    fn full_resonator_reports_zero() {
        let mut portal = portal(100);
        let (res, event) = super::apply(&mut portal, 3, 25, &owner()).unwrap();
        assert!(res.success);
        assert_eq!(res.repaired_amount, 0);
        assert_eq!(res.resonator_health, 100);
        assert!(event.is_none());
    }

    #[test]
    fn huge_amount_does_not_overflow() {
        let mut portal = portal(1);
        let (res, _) = super::apply(&mut portal, 3, u32::MAX, &owner()).unwrap();
        assert_eq!(res.repaired_amount, 99);
    }

    #[test]
    fn enemy_faction_is_rejected() {
        let mut portal = portal(40);
        let res = super::apply(&mut portal, 3, 10, &Agent::new(2, FactionId::RESISTANCE));
        assert!(matches!(res, Err(Error::ForbiddenFaction(FactionId::RESISTANCE))));
        assert_eq!(portal.total_health(), 40);
    }

    #[test]
    fn neutral_portal_is_rejected() {
        let mut portal = Portal::new(1, "Fontana", Coordinate::new(45.0, 12.0));
        assert!(matches!(super::apply(&mut portal, 1, 10, &owner()), Err(Error::ForbiddenFaction(_))));
    }

    #[test]
    fn empty_slot_and_ranges() {
        let mut portal = portal(40);
        assert!(matches!(super::apply(&mut portal, 4, 10, &owner()), Err(Error::SlotEmpty(4))));
        assert!(matches!(super::apply(&mut portal, 9, 10, &owner()), Err(Error::InvalidSlot(9))));
        assert!(matches!(super::apply(&mut portal, 3, 0, &owner()), Err(Error::InvalidAmount(0))));
        let banned = Agent { is_banned: true, ..owner() };
        assert!(matches!(super::apply(&mut portal, 3, 10, &banned), Err(Error::Banned(1))));
        assert_eq!(portal.total_health(), 40);
    }
}
