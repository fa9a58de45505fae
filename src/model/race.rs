use serde::{Deserialize, Serialize};

use super::ids::{HorseIdx, RaceId};

/// A horse crossing the finish line, as recorded by the racing track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finish {
    pub idx: HorseIdx,
    /// Number of moves the horse needed to cross the line.
    pub steps: u32,
    pub position: u32,
}

/// One line of the final standings. Horses that crossed on the same move share a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub idx: HorseIdx,
    pub steps: u32,
    pub position: u32,
    /// 1-based dense rank; the winner set is every horse with rank 1.
    pub rank: u32,
}

/// Frozen outcome of a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResult {
    pub race: RaceId,
    pub standings: Vec<Standing>,
    pub winners: Vec<HorseIdx>,
}

impl RaceResult {
    /// Ranks the finishers by the number of moves they needed.
    pub fn from_finishes(race: RaceId, mut finishes: Vec<Finish>) -> Self {
        finishes.sort_by_key(|f| (f.steps, f.idx));

        let mut standings = Vec::with_capacity(finishes.len());
        let mut rank = 0;
        let mut last_steps = None;
        for finish in finishes {
            if last_steps != Some(finish.steps) {
                rank += 1;
                last_steps = Some(finish.steps);
            }
            standings.push(Standing {
                idx: finish.idx,
                steps: finish.steps,
                position: finish.position,
                rank,
            });
        }

        let winners = standings
            .iter()
            .filter(|s| s.rank == 1)
            .map(|s| s.idx)
            .collect();

        Self {
            race,
            standings,
            winners,
        }
    }

    pub fn is_winner(&self, idx: HorseIdx) -> bool {
        self.winners.contains(&idx)
    }
}
