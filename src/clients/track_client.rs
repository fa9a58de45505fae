use tracing::instrument;

use super::region_handle::{unexpected, Port, RegionHandle};
use crate::framework::FrameworkError;
use crate::model::{Caller, HorseContext, RaceId, RaceResult};
use crate::racing_track::{RacingTrack, TrackOp, TrackReply};

#[derive(Clone)]
pub struct TrackClient {
    port: Port<RacingTrack>,
}

impl RegionHandle<RacingTrack> for TrackClient {
    fn port(&self) -> &Port<RacingTrack> {
        &self.port
    }
}

impl TrackClient {
    pub fn new(port: Port<RacingTrack>) -> Self {
        Self { port }
    }

    #[instrument(skip(self, horse), fields(horse = horse.id))]
    pub async fn proceed_to_start_line(&self, horse: &HorseContext) -> Result<(), FrameworkError> {
        match self
            .request(Caller::horse(horse.id), TrackOp::ProceedToStartLine { horse: *horse })
            .await?
        {
            TrackReply::Go => Ok(()),
            other => Err(unexpected("proceed_to_start_line", other)),
        }
    }

    /// Gives the start signal and waits until the whole field has crossed the line.
    #[instrument(skip(self))]
    pub async fn start_the_race(&self, race: RaceId) -> Result<RaceResult, FrameworkError> {
        match self
            .request(Caller::broker(), TrackOp::StartTheRace { race })
            .await?
        {
            TrackReply::Finished(result) => Ok(result),
            other => Err(unexpected("start_the_race", other)),
        }
    }

    /// Returns the horse's position after the move.
    #[instrument(skip(self, horse), fields(horse = horse.id))]
    pub async fn make_a_move(&self, horse: &HorseContext, step: u32) -> Result<u32, FrameworkError> {
        match self
            .request(
                Caller::horse(horse.id),
                TrackOp::MakeAMove {
                    horse: *horse,
                    step,
                },
            )
            .await?
        {
            TrackReply::Moved { position, .. } => Ok(position),
            other => Err(unexpected("make_a_move", other)),
        }
    }

    #[instrument(skip(self, horse), fields(horse = horse.id))]
    pub async fn has_finish_line_been_crossed(&self, horse: &HorseContext) -> Result<bool, FrameworkError> {
        match self
            .request(
                Caller::horse(horse.id),
                TrackOp::HasFinishLineBeenCrossed { horse: *horse },
            )
            .await?
        {
            TrackReply::Crossed(crossed) => Ok(crossed),
            other => Err(unexpected("has_finish_line_been_crossed", other)),
        }
    }
}
