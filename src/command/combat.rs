use super::{Error, Response};

use crate::{
    engine::{PortalEngine, Store},
    entities::{Agent, PortalId},
};

pub async fn deploy<S: Store>(
    engine: &PortalEngine<S>,
    agent: &Agent,
    portal_id: PortalId,
    slot: u8,
    level: u8,
) -> Result<Response, Error> {
    let resonator = engine.deploy(portal_id, slot, level, agent).await?;
    Ok(Response::ok(format!("Resonator deployed on slot {slot}"), resonator))
}

pub async fn attack<S: Store>(
    engine: &PortalEngine<S>,
    agent: &Agent,
    portal_id: PortalId,
    damage: u32,
) -> Result<Response, Error> {
    let result = engine.attack(portal_id, damage, agent).await?;
    Ok(Response::ok(result.message.clone(), result))
}

pub async fn repair<S: Store>(
    engine: &PortalEngine<S>,
    agent: &Agent,
    portal_id: PortalId,
    slot: u8,
    amount: u32,
) -> Result<Response, Error> {
    let result = engine.repair(portal_id, slot, amount, agent).await?;
    Ok(Response::ok(result.message.clone(), result))
}
