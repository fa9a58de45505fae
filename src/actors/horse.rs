use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use super::error::{ActorError, StepExt};
use crate::clients::{PaddockClient, StableClient, TrackClient};
use crate::model::{Caller, HorseContext};

/// A horse/jockey pair: stable, paddock, start line, race, back to the stable.
pub struct HorseJockey {
    horse: HorseContext,
    rng: ChaCha8Rng,
    stable: StableClient,
    paddock: PaddockClient,
    track: TrackClient,
}

impl HorseJockey {
    pub fn new(
        horse: HorseContext,
        rng: ChaCha8Rng,
        stable: StableClient,
        paddock: PaddockClient,
        track: TrackClient,
    ) -> Self {
        Self {
            horse,
            rng,
            stable,
            paddock,
            track,
        }
    }

    /// Returns the number of moves the horse needed to finish.
    #[instrument(name = "horse", skip(self), fields(id = self.horse.id, race = self.horse.race))]
    pub async fn run(mut self) -> Result<u32, ActorError> {
        let horse = self.horse;
        let me = Caller::horse(horse.id);
        info!(agility = horse.agility, "Actor started");

        self.stable
            .proceed_to_stable(&horse)
            .await
            .during(me, "waiting in the stable")?;
        self.paddock
            .proceed_to_paddock(&horse)
            .await
            .during(me, "parading in the paddock")?;
        self.track
            .proceed_to_start_line(&horse)
            .await
            .during(me, "lining up")?;

        let mut moves = 0;
        loop {
            let step = self.rng.random_range(1..=horse.agility);
            let position = self
                .track
                .make_a_move(&horse, step)
                .await
                .during(me, "running")?;
            moves += 1;
            debug!(step, position, "Moved");
            if self
                .track
                .has_finish_line_been_crossed(&horse)
                .await
                .during(me, "running")?
            {
                break;
            }
        }

        self.stable
            .proceed_to_stable(&horse)
            .await
            .during(me, "returning to the stable")?;
        info!(moves, "Shutdown");
        Ok(moves)
    }
}
