use std::{env, future};

use futures_util::StreamExt;
use portal_engine::{
    command, config,
    config::Config,
    database,
    engine::{PortalEngine, Store},
    entities::Event,
};
use sea_orm::Database;
use tokio::{
    io::{self, BufReader},
    sync::mpsc,
};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries the protocol
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    info!("Started version {}", env!("CARGO_PKG_VERSION"));

    let path = env::var("CONFIG").unwrap_or_else(|_| String::from("config.yaml"));
    let config = config::get(&path).await.expect("Config read failed");

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(UnboundedReceiverStream::new(event_rx).for_each(|event: Event| {
        info!("{event}");
        future::ready(())
    }));

    match &config.database {
        Some(url) => {
            let conn = Database::connect(url.as_str()).await.expect("Database connection failed");
            let portals = database::load(&conn).await.expect("Portals load failed");
            info!("Loaded {} portals", portals.len());
            let engine = PortalEngine::new(conn, &config.rules).with_portals(portals).with_events(event_tx);
            serve(&engine, &config).await;
        }
        None => {
            let engine = PortalEngine::new((), &config.rules).with_events(event_tx);
            serve(&engine, &config).await;
        }
    }
}

async fn serve<S: Store>(engine: &PortalEngine<S>, config: &Config) {
    if engine.is_empty().await {
        for seed in &config.portals {
            match engine.insert_portal(&seed.name, seed.coordinate()).await {
                Ok(portal) => info!("Seeded portal {} {}", portal.id, portal.name),
                Err(err) => error!("Seed {:?} failed: {err}", seed.name),
            }
        }
    }

    if let Err(err) = command::manage(engine, BufReader::new(io::stdin()), io::stdout()).await {
        error!("Transport error: {err}");
    }
}
