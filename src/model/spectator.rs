use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::ids::SpectatorId;

/// Opaque betting strategy identifier; its meaning belongs to the betting policy.
pub type StrategyId = u32;

/// Per-spectator scratch state that travels with every spectator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpectatorContext {
    pub id: SpectatorId,
    pub wallet: u64,
    pub strategy: StrategyId,
}

impl SpectatorContext {
    pub fn new(id: SpectatorId, wallet: u64, strategy: StrategyId) -> Self {
        Self {
            id,
            wallet,
            strategy,
        }
    }
}

/// Lifecycle of a spectator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpectatorState {
    WaitingForARaceToStart,
    AppraisingTheHorses,
    PlacingABet,
    WatchingARace,
    CollectingTheGains,
    Celebrating,
}

impl Display for SpectatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SpectatorState::WaitingForARaceToStart => "WAITING_FOR_A_RACE_TO_START",
            SpectatorState::AppraisingTheHorses => "APPRAISING_THE_HORSES",
            SpectatorState::PlacingABet => "PLACING_A_BET",
            SpectatorState::WatchingARace => "WATCHING_A_RACE",
            SpectatorState::CollectingTheGains => "COLLECTING_THE_GAINS",
            SpectatorState::Celebrating => "CELEBRATING",
        };
        write!(f, "{s}")
    }
}
