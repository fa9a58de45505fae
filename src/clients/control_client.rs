use tracing::instrument;

use super::region_handle::{unexpected, Port, RegionHandle};
use crate::control_centre::{ControlCentre, ControlOp, ControlReply};
use crate::framework::FrameworkError;
use crate::model::{Caller, HorseIdx, RaceId, RaceResult, SpectatorContext, SpectatorId};

#[derive(Clone)]
pub struct ControlClient {
    port: Port<ControlCentre>,
}

impl RegionHandle<ControlCentre> for ControlClient {
    fn port(&self) -> &Port<ControlCentre> {
        &self.port
    }
}

impl ControlClient {
    pub fn new(port: Port<ControlCentre>) -> Self {
        Self { port }
    }

    async fn expect(
        &self,
        caller: Caller,
        op: ControlOp,
        operation: &str,
        wanted: ControlReply,
    ) -> Result<(), FrameworkError> {
        match self.request(caller, op).await? {
            reply if reply == wanted => Ok(()),
            other => Err(unexpected(operation, other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn open_the_event(&self) -> Result<(), FrameworkError> {
        self.expect(
            Caller::broker(),
            ControlOp::OpenTheEvent,
            "open_the_event",
            ControlReply::Opened,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn announce_next_race(&self, race: RaceId) -> Result<(), FrameworkError> {
        self.expect(
            Caller::broker(),
            ControlOp::AnnounceNextRace { race },
            "announce_next_race",
            ControlReply::Announced,
        )
        .await
    }

    #[instrument(skip(self, spectator), fields(spectator = spectator.id))]
    pub async fn wait_for_next_race(
        &self,
        spectator: &SpectatorContext,
        race: RaceId,
    ) -> Result<(), FrameworkError> {
        self.expect(
            Caller::spectator(spectator.id),
            ControlOp::WaitForNextRace {
                spectator: *spectator,
                race,
            },
            "wait_for_next_race",
            ControlReply::RaceStarting(race),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn go_watch_the_race(&self, spectator: SpectatorId, race: RaceId) -> Result<(), FrameworkError> {
        self.expect(
            Caller::spectator(spectator),
            ControlOp::GoWatchTheRace { spectator, race },
            "go_watch_the_race",
            ControlReply::RaceOver(race),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn have_i_won(
        &self,
        spectator: SpectatorId,
        race: RaceId,
        horse_idx: HorseIdx,
    ) -> Result<bool, FrameworkError> {
        match self
            .request(
                Caller::spectator(spectator),
                ControlOp::HaveIWon {
                    spectator,
                    race,
                    horse_idx,
                },
            )
            .await?
        {
            ControlReply::Won(won) => Ok(won),
            other => Err(unexpected("have_i_won", other)),
        }
    }

    #[instrument(skip(self, result))]
    pub async fn report_results(&self, race: RaceId, result: RaceResult) -> Result<(), FrameworkError> {
        self.expect(
            Caller::broker(),
            ControlOp::ReportResults { race, result },
            "report_results",
            ControlReply::Reported,
        )
        .await
    }

    #[instrument(skip(self, spectator), fields(spectator = spectator.id))]
    pub async fn relax_a_bit(&self, spectator: &SpectatorContext) -> Result<(), FrameworkError> {
        self.expect(
            Caller::spectator(spectator.id),
            ControlOp::RelaxABit {
                spectator: *spectator,
            },
            "relax_a_bit",
            ControlReply::Relaxed,
        )
        .await
    }

    /// Waits at the bar until every spectator is celebrating.
    #[instrument(skip(self))]
    pub async fn entertain_the_guests(&self) -> Result<(), FrameworkError> {
        self.expect(
            Caller::broker(),
            ControlOp::EntertainTheGuests,
            "entertain_the_guests",
            ControlReply::EveryoneHasLeft,
        )
        .await
    }
}
