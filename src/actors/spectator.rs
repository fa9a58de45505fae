use tracing::{debug, info, instrument};

use super::error::{ActorError, StepExt};
use crate::clients::{BettingClient, ControlClient, PaddockClient};
use crate::model::{Caller, RaceId, SpectatorContext};

/// A spectator: for every race, appraise the field, bet, watch, collect; then celebrate.
pub struct Spectator {
    context: SpectatorContext,
    races: u32,
    control: ControlClient,
    paddock: PaddockClient,
    betting: BettingClient,
}

impl Spectator {
    pub fn new(
        context: SpectatorContext,
        races: u32,
        control: ControlClient,
        paddock: PaddockClient,
        betting: BettingClient,
    ) -> Self {
        Self {
            context,
            races,
            control,
            paddock,
            betting,
        }
    }

    /// Returns the spectator's context as it stands after the celebration.
    #[instrument(name = "spectator", skip(self), fields(id = self.context.id))]
    pub async fn run(mut self) -> Result<SpectatorContext, ActorError> {
        let me = Caller::spectator(self.context.id);
        info!(wallet = self.context.wallet, strategy = self.context.strategy, "Actor started");

        for race in 0..self.races {
            self.attend(me, race).await?;
        }

        self.control
            .relax_a_bit(&self.context)
            .await
            .during(me, "relaxing")?;
        info!(wallet = self.context.wallet, "Shutdown");
        Ok(self.context)
    }

    async fn attend(&mut self, me: Caller, race: RaceId) -> Result<(), ActorError> {
        let id = self.context.id;
        self.control
            .wait_for_next_race(&self.context, race)
            .await
            .during(me, "waiting for a race to start")?;
        self.paddock
            .go_check_horses(id, race)
            .await
            .during(me, "appraising the horses")?;

        let bet = self
            .betting
            .place_a_bet(race, &self.context)
            .await
            .during(me, "placing a bet")?;
        self.context.wallet = bet.wallet;

        self.control
            .go_watch_the_race(id, race)
            .await
            .during(me, "watching the race")?;
        let won = self
            .control
            .have_i_won(id, race, bet.horse_idx)
            .await
            .during(me, "checking the result")?;

        let gains = self
            .betting
            .go_collect_the_gains(race, &self.context)
            .await
            .during(me, "collecting the gains")?;
        self.context.wallet = gains.wallet;

        debug!(
            race,
            horse = bet.horse_idx,
            stake = bet.stake,
            won,
            gains = gains.amount,
            wallet = self.context.wallet,
            "Race over"
        );
        Ok(())
    }
}
