use tracing::instrument;

use super::region_handle::{unexpected, Port, RegionHandle};
use crate::betting_centre::{BettingCentre, BettingOp, BettingReply};
use crate::framework::FrameworkError;
use crate::model::{Caller, HorseIdx, RaceId, SpectatorContext};

/// A bet as recorded by the betting centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedBet {
    pub horse_idx: HorseIdx,
    pub stake: u64,
    /// Balance after the stake was debited.
    pub wallet: u64,
}

/// Gains handed out at the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gains {
    pub amount: u64,
    /// Balance after the gains were credited.
    pub wallet: u64,
}

#[derive(Clone)]
pub struct BettingClient {
    port: Port<BettingCentre>,
}

impl RegionHandle<BettingCentre> for BettingClient {
    fn port(&self) -> &Port<BettingCentre> {
        &self.port
    }
}

impl BettingClient {
    pub fn new(port: Port<BettingCentre>) -> Self {
        Self { port }
    }

    /// Opens the window and waits until every spectator has bet. Returns the bet count.
    #[instrument(skip(self, odds))]
    pub async fn accept_the_bets(&self, race: RaceId, odds: Vec<f64>) -> Result<u32, FrameworkError> {
        match self
            .request(Caller::broker(), BettingOp::AcceptTheBets { race, odds })
            .await?
        {
            BettingReply::BetsClosed { bets } => Ok(bets),
            other => Err(unexpected("accept_the_bets", other)),
        }
    }

    #[instrument(skip(self, spectator), fields(spectator = spectator.id))]
    pub async fn place_a_bet(
        &self,
        race: RaceId,
        spectator: &SpectatorContext,
    ) -> Result<PlacedBet, FrameworkError> {
        match self
            .request(
                Caller::spectator(spectator.id),
                BettingOp::PlaceABet {
                    race,
                    spectator: *spectator,
                },
            )
            .await?
        {
            BettingReply::BetPlaced {
                horse_idx,
                stake,
                wallet,
            } => Ok(PlacedBet {
                horse_idx,
                stake,
                wallet,
            }),
            other => Err(unexpected("place_a_bet", other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn are_there_any_winners(
        &self,
        race: RaceId,
        winners: Vec<HorseIdx>,
    ) -> Result<bool, FrameworkError> {
        match self
            .request(
                Caller::broker(),
                BettingOp::AreThereAnyWinners { race, winners },
            )
            .await?
        {
            BettingReply::Winners { any } => Ok(any),
            other => Err(unexpected("are_there_any_winners", other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn honour_the_bets(&self, race: RaceId) -> Result<(), FrameworkError> {
        match self
            .request(Caller::broker(), BettingOp::HonourTheBets { race })
            .await?
        {
            BettingReply::Honoured => Ok(()),
            other => Err(unexpected("honour_the_bets", other)),
        }
    }

    #[instrument(skip(self, spectator), fields(spectator = spectator.id))]
    pub async fn go_collect_the_gains(
        &self,
        race: RaceId,
        spectator: &SpectatorContext,
    ) -> Result<Gains, FrameworkError> {
        match self
            .request(
                Caller::spectator(spectator.id),
                BettingOp::GoCollectTheGains {
                    race,
                    spectator: *spectator,
                },
            )
            .await?
        {
            BettingReply::Gains { amount, wallet } => Ok(Gains { amount, wallet }),
            other => Err(unexpected("go_collect_the_gains", other)),
        }
    }
}
