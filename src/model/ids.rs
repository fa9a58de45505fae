//! Identities of the logical actors taking part in the event.
//!
//! Every request reaching a shared region carries a [`Caller`]: the role and id the
//! actor *declares*. Regions never look at threads, tasks or connections to decide who
//! is calling.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Race number, `0..races`.
pub type RaceId = u32;
/// Global horse id, `0..races * horses_per_race`.
pub type HorseId = u32;
/// Position of a horse inside its race lineup, `0..horses_per_race`.
pub type HorseIdx = u32;
/// Spectator id, `0..spectators`.
pub type SpectatorId = u32;

/// The id the (single) broker always declares.
pub const BROKER_ID: u32 = 0;

/// Kind of logical actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Broker,
    Horse,
    Spectator,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Broker => write!(f, "broker"),
            Role::Horse => write!(f, "horse"),
            Role::Spectator => write!(f, "spectator"),
        }
    }
}

/// Declared identity of the actor behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Caller {
    pub role: Role,
    pub id: u32,
}

impl Caller {
    pub fn broker() -> Self {
        Self {
            role: Role::Broker,
            id: BROKER_ID,
        }
    }

    pub fn horse(id: HorseId) -> Self {
        Self {
            role: Role::Horse,
            id,
        }
    }

    pub fn spectator(id: SpectatorId) -> Self {
        Self {
            role: Role::Spectator,
            id,
        }
    }
}

impl Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.role, self.id)
    }
}
