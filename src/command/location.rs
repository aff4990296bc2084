use super::{Error, Response};

use crate::{
    engine::{PortalEngine, Store},
    entities::{Agent, Area, Coordinate, PortalId},
    symbols,
};

pub async fn list<S: Store>(engine: &PortalEngine<S>, area: &Area) -> Response {
    let portals = engine.locations(area).await;
    Response::ok(format!("Found {} portals", portals.len()), portals)
}

pub async fn get<S: Store>(engine: &PortalEngine<S>, portal_id: PortalId) -> Result<Response, Error> {
    let portal = engine.portal(portal_id).await?;
    Ok(Response::ok(portal.name.clone(), portal))
}

pub async fn status<S: Store>(engine: &PortalEngine<S>, portal_id: PortalId) -> Result<Response, Error> {
    let status = engine.status(portal_id).await?;
    let message = if status.is_under_attack {
        format!("{} Portal under attack", symbols::ALERT)
    } else {
        String::from("Portal quiet")
    };
    Ok(Response::ok(message, status))
}

pub async fn resonators<S: Store>(engine: &PortalEngine<S>, portal_id: PortalId) -> Result<Response, Error> {
    let resonators = engine.resonators(portal_id).await?;
    Ok(Response::ok(format!("{} resonators deployed", resonators.len()), resonators))
}

pub async fn create<S: Store>(
    engine: &PortalEngine<S>,
    agent: &Agent,
    name: &str,
    latitude: f64,
    longitude: f64,
) -> Result<Response, Error> {
    let portal = engine.create_portal(agent, name, Coordinate::new(latitude, longitude)).await?;
    Ok(Response::ok(format!("Portal {} created", portal.id), portal))
}
