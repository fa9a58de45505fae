//! # Paddock
//!
//! Rendezvous between the horses of a race and all spectators. Spectators that come to
//! appraise the field wait until every runner is in; horses stay until every spectator
//! has had a look, then leave for the start line together.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Bounds;
use crate::framework::{Arrival, Operation, Outcome, RegionFault, Rendezvous, SharedRegion, Wakeups};
use crate::model::{
    Caller, HorseContext, HorseId, HorseIdx, HorseState, ProtocolError, RaceId, Role, SpectatorId,
    SpectatorState,
};
use crate::repository::{LogRecord, SharedLog};

pub const PROCEED_TO_PADDOCK: &str = "proceed_to_paddock";
pub const GO_CHECK_HORSES: &str = "go_check_horses";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PaddockOp {
    ProceedToPaddock { horse: HorseContext },
    GoCheckHorses { spectator: SpectatorId, race: RaceId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddockReply {
    /// Every spectator has seen the field.
    LeaveForStartLine,
    /// Every runner is in the paddock.
    HorsesReady,
}

impl Operation for PaddockOp {
    fn tag(&self) -> &'static str {
        match self {
            PaddockOp::ProceedToPaddock { .. } => PROCEED_TO_PADDOCK,
            PaddockOp::GoCheckHorses { .. } => GO_CHECK_HORSES,
        }
    }

    fn role(&self) -> Option<Role> {
        match self {
            PaddockOp::ProceedToPaddock { .. } => Some(Role::Horse),
            PaddockOp::GoCheckHorses { .. } => Some(Role::Spectator),
        }
    }

    fn validate(&self, caller: &Caller, bounds: &Bounds) -> Result<(), ProtocolError> {
        match self {
            PaddockOp::ProceedToPaddock { horse } => bounds.check_horse(caller, horse),
            PaddockOp::GoCheckHorses { spectator, race } => {
                bounds.check_spectator(caller, *spectator)?;
                bounds.check_race(*race)
            }
        }
    }
}

struct Round {
    horses: Rendezvous<HorseIdx>,
    /// Ids of the runners in the paddock, by index in the race.
    field: BTreeMap<HorseIdx, HorseId>,
    spectators: Rendezvous<SpectatorId>,
}

impl Round {
    fn horses_ready(&self) -> bool {
        self.horses.is_complete()
    }

    /// Sends this race's runners to the start line.
    fn release_field(&self, wakeups: &mut Wakeups<PaddockReply>) {
        wakeups.wake_all(
            PROCEED_TO_PADDOCK,
            self.field.values().map(|&id| Caller::horse(id)),
            PaddockReply::LeaveForStartLine,
        );
    }
}

/// Per-race paddock rounds.
pub struct Paddock {
    rounds: Vec<Round>,
}

impl Paddock {
    pub fn new(races: u32, horses_per_race: u32, spectators: u32) -> Self {
        let rounds = (0..races)
            .map(|_| Round {
                horses: Rendezvous::new(horses_per_race as usize),
                field: BTreeMap::new(),
                spectators: Rendezvous::new(spectators as usize),
            })
            .collect();
        Self { rounds }
    }
}

impl SharedRegion for Paddock {
    type Op = PaddockOp;
    type Reply = PaddockReply;
    type Context = SharedLog;

    fn handle(
        &mut self,
        caller: Caller,
        op: PaddockOp,
        log: &SharedLog,
        wakeups: &mut Wakeups<PaddockReply>,
    ) -> Result<Outcome<PaddockReply>, RegionFault> {
        match op {
            PaddockOp::ProceedToPaddock { horse } => {
                let round = &mut self.rounds[horse.race as usize];
                let arrival = round
                    .horses
                    .arrive(horse.idx)
                    .map_err(|e| e.fault(caller, "paddock", horse.race))?;
                round.field.insert(horse.idx, horse.id);
                log.append(LogRecord::horse(horse.id, HorseState::AtThePaddock, horse.race));

                if arrival == Arrival::Complete {
                    // Spectators of this race that came early are all parked.
                    wakeups.wake_all(
                        GO_CHECK_HORSES,
                        round.spectators.participants().map(|&id| Caller::spectator(id)),
                        PaddockReply::HorsesReady,
                    );
                    // The whole field, this horse included, leaves once everyone has looked.
                    if round.spectators.is_complete() {
                        round.release_field(wakeups);
                    }
                }
                Ok(Outcome::Wait)
            }
            PaddockOp::GoCheckHorses { spectator, race } => {
                let round = &mut self.rounds[race as usize];
                round
                    .spectators
                    .arrive(spectator)
                    .map_err(|e| e.fault(caller, "paddock", race))?;
                log.append(LogRecord::spectator(
                    spectator,
                    SpectatorState::AppraisingTheHorses,
                    Some(race),
                ));

                if !round.horses_ready() {
                    return Ok(Outcome::Wait);
                }
                if round.spectators.is_complete() {
                    round.release_field(wakeups);
                }
                Ok(Outcome::Done(PaddockReply::HorsesReady))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventConfig;
    use crate::framework::{RegionClient, RegionPort, RegionServer};
    use crate::repository::GeneralRepository;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    type Pending = JoinHandle<Result<PaddockReply, crate::framework::FrameworkError>>;

    fn start(spectators: u32) -> RegionClient<Paddock> {
        start_event(1, spectators)
    }

    fn start_event(races: u32, spectators: u32) -> RegionClient<Paddock> {
        let config = EventConfig {
            races,
            horses_per_race: 4,
            spectators,
            ..EventConfig::default()
        };
        let paddock = Paddock::new(config.races, config.horses_per_race, config.spectators);
        let (server, client) = RegionServer::new(paddock, config.bounds(), 16);
        let log: SharedLog = GeneralRepository::new();
        tokio::spawn(server.run(log));
        client
    }

    fn runner(race: RaceId, idx: HorseIdx) -> HorseContext {
        HorseContext {
            id: race * 4 + idx,
            race,
            idx,
            agility: 3,
        }
    }

    fn arrive_horse(client: &RegionClient<Paddock>, idx: HorseIdx) -> Pending {
        arrive_runner(client, runner(0, idx))
    }

    fn arrive_runner(client: &RegionClient<Paddock>, horse: HorseContext) -> Pending {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .call(Caller::horse(horse.id), PaddockOp::ProceedToPaddock { horse })
                .await
        })
    }

    fn check_horses(client: &RegionClient<Paddock>, spectator: SpectatorId) -> Pending {
        check_race(client, spectator, 0)
    }

    fn check_race(
        client: &RegionClient<Paddock>,
        spectator: SpectatorId,
        race: RaceId,
    ) -> Pending {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .call(
                    Caller::spectator(spectator),
                    PaddockOp::GoCheckHorses { spectator, race },
                )
                .await
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_only_the_last_horse_releases_the_spectators() {
        let client = start(2);
        let spectators = vec![check_horses(&client, 0), check_horses(&client, 1)];
        settle().await;

        let mut horses = vec![];
        for idx in 0..3 {
            horses.push(arrive_horse(&client, idx));
            settle().await;
            assert!(
                spectators.iter().all(|s| !s.is_finished()),
                "spectators released by horse {idx}"
            );
        }

        horses.push(arrive_horse(&client, 3));
        for spectator in spectators {
            assert_eq!(spectator.await.unwrap(), Ok(PaddockReply::HorsesReady));
        }
        for horse in horses {
            assert_eq!(horse.await.unwrap(), Ok(PaddockReply::LeaveForStartLine));
        }
    }

    #[tokio::test]
    async fn test_horses_stay_until_every_spectator_has_looked() {
        let client = start(2);
        let horses: Vec<_> = (0..4).map(|idx| arrive_horse(&client, idx)).collect();
        settle().await;

        let first = client
            .call(
                Caller::spectator(0),
                PaddockOp::GoCheckHorses {
                    spectator: 0,
                    race: 0,
                },
            )
            .await;
        assert_eq!(first, Ok(PaddockReply::HorsesReady));
        settle().await;
        assert!(horses.iter().all(|h| !h.is_finished()));

        let last = check_horses(&client, 1).await.unwrap();
        assert_eq!(last, Ok(PaddockReply::HorsesReady));
        for horse in horses {
            assert_eq!(horse.await.unwrap(), Ok(PaddockReply::LeaveForStartLine));
        }
    }

    #[tokio::test]
    async fn test_spectator_cannot_appraise_twice() {
        let client = start(2);
        let _waiting = check_horses(&client, 0);
        settle().await;
        let again = client
            .call(
                Caller::spectator(0),
                PaddockOp::GoCheckHorses {
                    spectator: 0,
                    race: 0,
                },
            )
            .await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_a_full_field_only_releases_its_own_race() {
        let client = start_event(2, 1);
        let spectator = check_race(&client, 0, 1);
        settle().await;

        let first_field: Vec<_> = (0..4).map(|idx| arrive_horse(&client, idx)).collect();
        settle().await;
        assert!(!spectator.is_finished(), "race 0 released a race 1 spectator");
        assert!(first_field.iter().all(|h| !h.is_finished()));

        let second_field: Vec<_> = (0..4)
            .map(|idx| arrive_runner(&client, runner(1, idx)))
            .collect();
        assert_eq!(spectator.await.unwrap(), Ok(PaddockReply::HorsesReady));
        for horse in second_field {
            assert_eq!(horse.await.unwrap(), Ok(PaddockReply::LeaveForStartLine));
        }
        settle().await;
        assert!(first_field.iter().all(|h| !h.is_finished()));
    }
}
