pub mod command;
pub mod config;
pub mod database;
pub mod engine;
pub mod entities;
mod symbols;

pub use engine::{Error, PortalEngine};
