use tracing::{info, instrument};

use super::error::{ActorError, StepExt};
use crate::clients::{BettingClient, ControlClient, StableClient, TrackClient};
use crate::model::{Caller, RaceId, RaceResult};

/// The organizer: runs every race of the afternoon in order, then hosts at the bar.
pub struct Broker {
    races: u32,
    stable: StableClient,
    track: TrackClient,
    betting: BettingClient,
    control: ControlClient,
}

impl Broker {
    pub fn new(
        races: u32,
        stable: StableClient,
        track: TrackClient,
        betting: BettingClient,
        control: ControlClient,
    ) -> Self {
        Self {
            races,
            stable,
            track,
            betting,
            control,
        }
    }

    /// Returns the result of every race, in race order.
    #[instrument(name = "broker", skip(self))]
    pub async fn run(self) -> Result<Vec<RaceResult>, ActorError> {
        let me = Caller::broker();
        info!(races = self.races, "Actor started");

        self.control.open_the_event().await.during(me, "opening the event")?;

        let mut results = Vec::with_capacity(self.races as usize);
        for race in 0..self.races {
            results.push(self.run_race(me, race).await?);
        }

        self.control
            .entertain_the_guests()
            .await
            .during(me, "playing host at the bar")?;
        info!("Shutdown");
        Ok(results)
    }

    async fn run_race(&self, me: Caller, race: RaceId) -> Result<RaceResult, ActorError> {
        self.control
            .announce_next_race(race)
            .await
            .during(me, "announcing the next race")?;
        self.stable
            .summon_horses_to_paddock(race)
            .await
            .during(me, "summoning horses")?;

        let odds = self.stable.race_odds(race).await.during(me, "fetching odds")?;
        let bets = self
            .betting
            .accept_the_bets(race, odds)
            .await
            .during(me, "waiting for bets")?;

        let result = self
            .track
            .start_the_race(race)
            .await
            .during(me, "supervising the race")?;
        self.stable
            .await_horses_stabled(race)
            .await
            .during(me, "waiting for the horses to return")?;

        let any = self
            .betting
            .are_there_any_winners(race, result.winners.clone())
            .await
            .during(me, "settling accounts")?;
        self.betting
            .honour_the_bets(race)
            .await
            .during(me, "honouring the bets")?;
        self.control
            .report_results(race, result.clone())
            .await
            .during(me, "reporting results")?;

        info!(race, bets, winners = ?result.winners, paid_out = any, "Race settled");
        Ok(result)
    }
}
