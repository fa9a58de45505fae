//! # Stable
//!
//! Owns the horse roster. At startup the roster is randomly partitioned into races
//! ([`assign_races`]); afterwards the stable serves lineups and odds, holds horses until
//! the broker summons their race to the paddock, and counts them back in after the race
//! so the broker knows when every runner is stabled.

pub mod odds;
pub mod ops;
pub mod region;

pub use odds::{InverseAgility, OddsPolicy};
pub use ops::{StableOp, StableReply};
pub use region::{assign_races, LineupError, Stable};
