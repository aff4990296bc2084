use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, warn};

use crate::{
    engine::{Error, ErrorKind, PortalEngine, Store},
    entities::{Agent, Area, PortalId},
};

mod combat;
mod help;
mod location;

/// One line of the wire protocol: the acting agent plus a tagged command.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub agent: Agent,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Help,
    Locations(Area),
    Location {
        #[serde(rename = "portalId")]
        portal_id: PortalId,
    },
    Status {
        #[serde(rename = "portalId")]
        portal_id: PortalId,
    },
    Resonators {
        #[serde(rename = "portalId")]
        portal_id: PortalId,
    },
    Deploy {
        #[serde(rename = "portalId")]
        portal_id: PortalId,
        slot_number: u8,
        level: u8,
    },
    Attack {
        #[serde(rename = "portalId")]
        portal_id: PortalId,
        damage: u32,
    },
    Repair {
        #[serde(rename = "portalId")]
        portal_id: PortalId,
        resonator_slot: u8,
        repair_amount: u32,
    },
    CreateLocation {
        name: String,
        latitude: f64,
        longitude: f64,
    },
}

/// Same envelope the mobile client already decodes.
#[derive(Debug, PartialEq, Serialize)]
pub struct Response {
    pub code: u16,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl Response {
    fn ok(message: impl Into<String>, data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Response { code: 200, message: message.into(), data: Some(data) },
            Err(err) => {
                error!("Response serialization error: {err}");
                Response { code: 500, message: err.to_string(), data: None }
            }
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Response { code: 400, message: message.into(), data: None }
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        let code = match err.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        };
        Response { code, message: err.to_string(), data: None }
    }
}

pub async fn execute<S: Store>(engine: &PortalEngine<S>, request: Request) -> Response {
    let Request { agent, command } = request;
    debug!("Agent {} sent {command:?}", agent.user_id);

    let res = match command {
        Command::Help => Ok(help::execute()),
        Command::Locations(area) => Ok(location::list(engine, &area).await),
        Command::Location { portal_id } => location::get(engine, portal_id).await,
        Command::Status { portal_id } => location::status(engine, portal_id).await,
        Command::Resonators { portal_id } => location::resonators(engine, portal_id).await,
        Command::CreateLocation { name, latitude, longitude } => {
            location::create(engine, &agent, &name, latitude, longitude).await
        }
        Command::Deploy { portal_id, slot_number, level } => {
            combat::deploy(engine, &agent, portal_id, slot_number, level).await
        }
        Command::Attack { portal_id, damage } => combat::attack(engine, &agent, portal_id, damage).await,
        Command::Repair { portal_id, resonator_slot, repair_amount } => {
            combat::repair(engine, &agent, portal_id, resonator_slot, repair_amount).await
        }
    };

    res.unwrap_or_else(|err| {
        warn!("Agent {} command rejected: {err}", agent.user_id);
        Response::from(err)
    })
}

/// Answers every request line with a response line until the reader is exhausted.
pub async fn manage<S, R, W>(engine: &PortalEngine<S>, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    S: Store,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<Request>(line) {
                Ok(request) => execute(engine, request).await,
                Err(err) => {
                    warn!("Malformed request: {err}\nline: {line}");
                    Response::bad_request(format!("Malformed request: {err}"))
                }
            },
            Err(err) => {
                warn!("Request isn't valid UTF-8: {err}");
                Response::bad_request(format!("Malformed request: {err}"))
            }
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }
}
