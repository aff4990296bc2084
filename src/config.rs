use std::path::Path;

use chrono::TimeDelta;
use serde::Deserialize;
use tokio::{fs::File, io::AsyncReadExt};

use crate::entities::{Coordinate, MAX_CAPACITY, MAX_LEVEL};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error reading file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("Error decoding file {0}: {1}")]
    Yaml(String, serde_yaml::Error),
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// sea-orm connection string, portals live only in memory when missing
    pub database: Option<String>,
    #[serde(default)]
    pub rules: Rules,
    /// portals created at startup on an empty store
    #[serde(default)]
    pub portals: Vec<Seed>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rules {
    pub max_level: u8,
    pub resonator_health: u32,
    pub under_attack_secs: u64,
}

impl Default for Rules {
    fn default() -> Self {
        Rules { max_level: MAX_LEVEL, resonator_health: 100, under_attack_secs: 300 }
    }
}

impl Rules {
    /// deploy levels are clamped to what the game knows about
    pub fn max_level(&self) -> u8 {
        self.max_level.clamp(1, MAX_LEVEL)
    }

    /// a resonator always starts alive and a full portal can't overflow its health
    pub fn resonator_health(&self) -> u32 {
        self.resonator_health.clamp(1, MAX_CAPACITY)
    }

    pub fn under_attack_window(&self) -> TimeDelta {
        i64::try_from(self.under_attack_secs).ok().and_then(TimeDelta::try_seconds).unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Seed {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Seed {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// reads config file
pub async fn get(path: impl AsRef<Path>) -> Result<Config, Error> {
    let name = path.as_ref().display().to_string();
    let mut file = File::open(path.as_ref()).await.map_err(|e| Error::Io(name.clone(), e))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).await.map_err(|e| Error::Io(name.clone(), e))?;
    parse(&contents).map_err(|e| Error::Yaml(name, e))
}

pub fn parse(contents: &str) -> Result<Config, serde_yaml::Error> {
    serde_yaml::from_str(contents)
}
