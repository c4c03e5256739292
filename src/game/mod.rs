//! Battle simulation: agents, physics, combat, zone, supplies and the match loop

pub mod agent;
pub mod combat;
pub mod r#match;
pub mod physics;
pub mod runner;
pub mod snapshot;
pub mod supply;
pub mod zone;

pub use r#match::MatchCommand;
pub use runner::{CommandError, GameMatch, MatchHandle};
