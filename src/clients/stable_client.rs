use tracing::instrument;

use super::region_handle::{unexpected, Port, RegionHandle};
use crate::framework::FrameworkError;
use crate::model::{Caller, HorseContext, RaceId};
use crate::stable::{Stable, StableOp, StableReply};

/// Client for the stable.
#[derive(Clone)]
pub struct StableClient {
    port: Port<Stable>,
}

impl RegionHandle<Stable> for StableClient {
    fn port(&self) -> &Port<Stable> {
        &self.port
    }
}

impl StableClient {
    pub fn new(port: Port<Stable>) -> Self {
        Self { port }
    }

    #[instrument(skip(self))]
    pub async fn lineup(&self, caller: Caller, race: RaceId) -> Result<Vec<HorseContext>, FrameworkError> {
        match self.request(caller, StableOp::Lineup { race }).await? {
            StableReply::Lineup(horses) => Ok(horses),
            other => Err(unexpected("lineup", other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn race_odds(&self, race: RaceId) -> Result<Vec<f64>, FrameworkError> {
        match self.request(Caller::broker(), StableOp::RaceOdds { race }).await? {
            StableReply::Odds(odds) => Ok(odds),
            other => Err(unexpected("race_odds", other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn summon_horses_to_paddock(&self, race: RaceId) -> Result<(), FrameworkError> {
        match self
            .request(Caller::broker(), StableOp::SummonHorsesToPaddock { race })
            .await?
        {
            StableReply::Summoned => Ok(()),
            other => Err(unexpected("summon_horses_to_paddock", other)),
        }
    }

    /// Before the race this waits for the summons; after it, it just checks the horse in.
    #[instrument(skip(self, horse), fields(horse = horse.id))]
    pub async fn proceed_to_stable(&self, horse: &HorseContext) -> Result<(), FrameworkError> {
        match self
            .request(Caller::horse(horse.id), StableOp::ProceedToStable { horse: *horse })
            .await?
        {
            StableReply::LeftForPaddock | StableReply::Stabled => Ok(()),
            other => Err(unexpected("proceed_to_stable", other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn await_horses_stabled(&self, race: RaceId) -> Result<(), FrameworkError> {
        match self
            .request(Caller::broker(), StableOp::AwaitHorsesStabled { race })
            .await?
        {
            StableReply::AllStabled => Ok(()),
            other => Err(unexpected("await_horses_stabled", other)),
        }
    }
}
