use tracing::instrument;

use super::region_handle::{unexpected, Port, RegionHandle};
use crate::framework::FrameworkError;
use crate::model::{Caller, HorseContext, RaceId, SpectatorId};
use crate::paddock::{Paddock, PaddockOp, PaddockReply};

#[derive(Clone)]
pub struct PaddockClient {
    port: Port<Paddock>,
}

impl RegionHandle<Paddock> for PaddockClient {
    fn port(&self) -> &Port<Paddock> {
        &self.port
    }
}

impl PaddockClient {
    pub fn new(port: Port<Paddock>) -> Self {
        Self { port }
    }

    #[instrument(skip(self, horse), fields(horse = horse.id))]
    pub async fn proceed_to_paddock(&self, horse: &HorseContext) -> Result<(), FrameworkError> {
        match self
            .request(Caller::horse(horse.id), PaddockOp::ProceedToPaddock { horse: *horse })
            .await?
        {
            PaddockReply::LeaveForStartLine => Ok(()),
            other => Err(unexpected("proceed_to_paddock", other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn go_check_horses(&self, spectator: SpectatorId, race: RaceId) -> Result<(), FrameworkError> {
        match self
            .request(
                Caller::spectator(spectator),
                PaddockOp::GoCheckHorses { spectator, race },
            )
            .await?
        {
            PaddockReply::HorsesReady => Ok(()),
            other => Err(unexpected("go_check_horses", other)),
        }
    }
}
