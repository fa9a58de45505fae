use serde::{Deserialize, Serialize};

use super::ids::{HorseIdx, RaceId, SpectatorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A wager recorded by the betting centre.
///
/// `status` leaves `Pending` exactly once, when the race's winner set is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub race: RaceId,
    pub spectator: SpectatorId,
    pub horse_idx: HorseIdx,
    pub stake: u64,
    pub status: BetStatus,
    pub collected: bool,
}

impl Bet {
    pub fn new(race: RaceId, spectator: SpectatorId, horse_idx: HorseIdx, stake: u64) -> Self {
        Self {
            race,
            spectator,
            horse_idx,
            stake,
            status: BetStatus::Pending,
            collected: false,
        }
    }

    /// Settles a pending bet against the winner set. Settled bets are left untouched.
    pub fn settle(&mut self, winners: &[HorseIdx]) {
        if self.status == BetStatus::Pending {
            self.status = if winners.contains(&self.horse_idx) {
                BetStatus::Accepted
            } else {
                BetStatus::Rejected
            };
        }
    }
}
