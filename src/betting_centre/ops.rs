use serde::{Deserialize, Serialize};

use crate::config::Bounds;
use crate::framework::Operation;
use crate::model::{Caller, HorseIdx, ProtocolError, RaceId, Role, SpectatorContext};

pub const ACCEPT_THE_BETS: &str = "accept_the_bets";
pub const PLACE_A_BET: &str = "place_a_bet";
pub const ARE_THERE_ANY_WINNERS: &str = "are_there_any_winners";
pub const HONOUR_THE_BETS: &str = "honour_the_bets";
pub const GO_COLLECT_THE_GAINS: &str = "go_collect_the_gains";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BettingOp {
    /// Opens the window for `race` and waits until every spectator has bet.
    AcceptTheBets { race: RaceId, odds: Vec<f64> },
    PlaceABet {
        race: RaceId,
        spectator: SpectatorContext,
    },
    AreThereAnyWinners { race: RaceId, winners: Vec<HorseIdx> },
    HonourTheBets { race: RaceId },
    GoCollectTheGains {
        race: RaceId,
        spectator: SpectatorContext,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum BettingReply {
    BetsClosed { bets: u32 },
    /// `wallet` is the balance after the stake was debited.
    BetPlaced {
        horse_idx: HorseIdx,
        stake: u64,
        wallet: u64,
    },
    Winners { any: bool },
    Honoured,
    /// `wallet` is the balance after the gains were credited.
    Gains { amount: u64, wallet: u64 },
}

impl Operation for BettingOp {
    fn tag(&self) -> &'static str {
        match self {
            BettingOp::AcceptTheBets { .. } => ACCEPT_THE_BETS,
            BettingOp::PlaceABet { .. } => PLACE_A_BET,
            BettingOp::AreThereAnyWinners { .. } => ARE_THERE_ANY_WINNERS,
            BettingOp::HonourTheBets { .. } => HONOUR_THE_BETS,
            BettingOp::GoCollectTheGains { .. } => GO_COLLECT_THE_GAINS,
        }
    }

    fn role(&self) -> Option<Role> {
        match self {
            BettingOp::PlaceABet { .. } | BettingOp::GoCollectTheGains { .. } => {
                Some(Role::Spectator)
            }
            _ => Some(Role::Broker),
        }
    }

    fn validate(&self, caller: &Caller, bounds: &Bounds) -> Result<(), ProtocolError> {
        match self {
            BettingOp::AcceptTheBets { race, odds } => {
                bounds.check_race(*race)?;
                if odds.len() != bounds.horses_per_race as usize {
                    return Err(ProtocolError::InvalidOdds {
                        race: *race,
                        reason: format!(
                            "{} values for {} horses",
                            odds.len(),
                            bounds.horses_per_race
                        ),
                    });
                }
                match odds.iter().find(|o| !o.is_finite() || **o <= 0.0) {
                    Some(bad) => Err(ProtocolError::InvalidOdds {
                        race: *race,
                        reason: format!("{bad} is not a positive number"),
                    }),
                    None => Ok(()),
                }
            }
            BettingOp::AreThereAnyWinners { race, winners } => {
                bounds.check_race(*race)?;
                winners
                    .iter()
                    .try_for_each(|&idx| bounds.check_horse_idx(idx))
            }
            BettingOp::HonourTheBets { race } => bounds.check_race(*race),
            BettingOp::PlaceABet { race, spectator }
            | BettingOp::GoCollectTheGains { race, spectator } => {
                bounds.check_spectator(caller, spectator.id)?;
                bounds.check_race(*race)
            }
        }
    }
}
