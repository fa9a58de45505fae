use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::ids::{HorseId, HorseIdx, RaceId};

/// A horse/jockey pair as held in the stable roster.
///
/// `race` and `idx` stay `None` until the stable partitions the roster into races.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horse {
    pub id: HorseId,
    /// Maximum distance the horse covers in a single move.
    pub agility: u32,
    pub race: Option<RaceId>,
    pub idx: Option<HorseIdx>,
}

impl Horse {
    pub fn new(id: HorseId, agility: u32) -> Self {
        Self {
            id,
            agility,
            race: None,
            idx: None,
        }
    }

    /// Builds `count` horses with agility drawn uniformly from `1..=max_step`.
    pub fn roster<R: Rng + ?Sized>(count: u32, max_step: u32, rng: &mut R) -> Vec<Horse> {
        (0..count)
            .map(|id| Horse::new(id, rng.random_range(1..=max_step)))
            .collect()
    }

    /// The context this horse declares on every request, once it has been assigned.
    pub fn context(&self) -> Option<HorseContext> {
        Some(HorseContext {
            id: self.id,
            race: self.race?,
            idx: self.idx?,
            agility: self.agility,
        })
    }
}

/// Per-horse scratch state that travels with every horse request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HorseContext {
    pub id: HorseId,
    pub race: RaceId,
    pub idx: HorseIdx,
    pub agility: u32,
}

/// Lifecycle of a horse/jockey pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HorseState {
    AtTheStable,
    AtThePaddock,
    AtTheStartLine,
    Running,
    AtTheFinishLine,
}

impl Display for HorseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HorseState::AtTheStable => "AT_THE_STABLE",
            HorseState::AtThePaddock => "AT_THE_PADDOCK",
            HorseState::AtTheStartLine => "AT_THE_START_LINE",
            HorseState::Running => "RUNNING",
            HorseState::AtTheFinishLine => "AT_THE_FINISH_LINE",
        };
        write!(f, "{s}")
    }
}
