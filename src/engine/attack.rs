use chrono::{DateTime, Utc};

use super::{acting_faction, Error};

use crate::entities::{Agent, AttackResult, Event, Portal};

/// Spreads `damage` over the live resonators in ascending slot order.
///
/// Every slot soaks up to its own health before the remainder moves on, destroyed resonators are
/// dropped right away. An owned portal left without resonators goes to the attacker.
pub(super) fn apply(
    portal: &mut Portal,
    damage: u32,
    agent: &Agent,
    now: DateTime<Utc>,
) -> Result<(AttackResult, Vec<Event>), Error> {
    if damage == 0 {
        return Err(Error::InvalidDamage(damage));
    }
    let faction = acting_faction(agent)?;
    if portal.owner == Some(faction) {
        return Err(Error::SelfAttackForbidden(faction));
    }

    let mut remaining = damage;
    let mut destroyed = Vec::new();
    for (slot, reso) in portal.resonators.iter_mut() {
        if remaining == 0 {
            break;
        }
        let hit = remaining.min(reso.health);
        reso.health -= hit;
        remaining -= hit;
        if reso.health == 0 {
            destroyed.push(*slot);
        }
    }
    for slot in &destroyed {
        portal.resonators.remove(slot);
    }
    portal.last_attack_at = Some(now);

    let new_owner = if portal.resonators.is_empty() && portal.owner.is_some() {
        portal.owner = Some(faction);
        Some(faction)
    } else {
        None
    };

    let mut events = destroyed
        .iter()
        .map(|slot| Event::Destroyed { faction, portal: portal.name.clone(), slot: *slot })
        .collect::<Vec<_>>();
    if new_owner.is_some() {
        events.push(Event::Captured { faction, portal: portal.name.clone() });
    }

    let damage_dealt = damage - remaining;
    let message = match (new_owner, destroyed.len()) {
        (Some(_), _) => format!("Dealt {damage_dealt} damage, portal captured"),
        (None, 0) if portal.is_neutral() => String::from("Portal is neutral, nothing to attack"),
        (None, 0) => format!("Dealt {damage_dealt} damage"),
        (None, n) => format!("Dealt {damage_dealt} damage, destroyed {n} resonators"),
    };

    Ok((
        AttackResult {
            success: true,
            damage_dealt,
            destroyed_resonators: destroyed,
            new_owner_faction_id: new_owner,
            message,
        },
        events,
    ))
}
