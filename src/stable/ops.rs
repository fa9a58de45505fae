use serde::{Deserialize, Serialize};

use crate::config::Bounds;
use crate::framework::Operation;
use crate::model::{Caller, HorseContext, ProtocolError, RaceId, Role};

pub const LINEUP: &str = "lineup";
pub const RACE_ODDS: &str = "race_odds";
pub const SUMMON_HORSES_TO_PADDOCK: &str = "summon_horses_to_paddock";
pub const PROCEED_TO_STABLE: &str = "proceed_to_stable";
pub const AWAIT_HORSES_STABLED: &str = "await_horses_stabled";

/// Requests understood by the stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StableOp {
    /// The horses running in `race`, by index.
    Lineup { race: RaceId },
    RaceOdds { race: RaceId },
    SummonHorsesToPaddock { race: RaceId },
    /// First call: wait in the stable until summoned. Second call: back after the race.
    ProceedToStable { horse: HorseContext },
    AwaitHorsesStabled { race: RaceId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "value", rename_all = "snake_case")]
pub enum StableReply {
    Lineup(Vec<HorseContext>),
    Odds(Vec<f64>),
    Summoned,
    LeftForPaddock,
    Stabled,
    AllStabled,
}

impl Operation for StableOp {
    fn tag(&self) -> &'static str {
        match self {
            StableOp::Lineup { .. } => LINEUP,
            StableOp::RaceOdds { .. } => RACE_ODDS,
            StableOp::SummonHorsesToPaddock { .. } => SUMMON_HORSES_TO_PADDOCK,
            StableOp::ProceedToStable { .. } => PROCEED_TO_STABLE,
            StableOp::AwaitHorsesStabled { .. } => AWAIT_HORSES_STABLED,
        }
    }

    fn role(&self) -> Option<Role> {
        match self {
            StableOp::Lineup { .. } | StableOp::RaceOdds { .. } => None,
            StableOp::SummonHorsesToPaddock { .. } | StableOp::AwaitHorsesStabled { .. } => {
                Some(Role::Broker)
            }
            StableOp::ProceedToStable { .. } => Some(Role::Horse),
        }
    }

    fn validate(&self, caller: &Caller, bounds: &Bounds) -> Result<(), ProtocolError> {
        match self {
            StableOp::Lineup { race }
            | StableOp::RaceOdds { race }
            | StableOp::SummonHorsesToPaddock { race }
            | StableOp::AwaitHorsesStabled { race } => bounds.check_race(*race),
            StableOp::ProceedToStable { horse } => bounds.check_horse(caller, horse),
        }
    }
}
