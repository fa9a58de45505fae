//! # Control Centre
//!
//! The hub tying the broker to the spectators across races: opening the event,
//! announcing each race, holding spectators in the stands until the result is in,
//! answering "have I won", and the final gathering at the bar.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Bounds;
use crate::framework::{Arrival, Operation, Outcome, RegionFault, Rendezvous, SharedRegion, Wakeups};
use crate::model::{
    BrokerState, Caller, HorseIdx, ProtocolError, RaceId, RaceResult, Role, SpectatorContext,
    SpectatorId, SpectatorState,
};
use crate::repository::{LogRecord, SharedLog};

pub const OPEN_THE_EVENT: &str = "open_the_event";
pub const ANNOUNCE_NEXT_RACE: &str = "announce_next_race";
pub const WAIT_FOR_NEXT_RACE: &str = "wait_for_next_race";
pub const GO_WATCH_THE_RACE: &str = "go_watch_the_race";
pub const HAVE_I_WON: &str = "have_i_won";
pub const REPORT_RESULTS: &str = "report_results";
pub const RELAX_A_BIT: &str = "relax_a_bit";
pub const ENTERTAIN_THE_GUESTS: &str = "entertain_the_guests";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlOp {
    OpenTheEvent,
    AnnounceNextRace { race: RaceId },
    WaitForNextRace { spectator: SpectatorContext, race: RaceId },
    GoWatchTheRace { spectator: SpectatorId, race: RaceId },
    HaveIWon {
        spectator: SpectatorId,
        race: RaceId,
        horse_idx: HorseIdx,
    },
    ReportResults { race: RaceId, result: RaceResult },
    RelaxABit { spectator: SpectatorContext },
    EntertainTheGuests,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "value", rename_all = "snake_case")]
pub enum ControlReply {
    Opened,
    Announced,
    RaceStarting(RaceId),
    RaceOver(RaceId),
    Won(bool),
    Reported,
    Relaxed,
    EveryoneHasLeft,
}

impl Operation for ControlOp {
    fn tag(&self) -> &'static str {
        match self {
            ControlOp::OpenTheEvent => OPEN_THE_EVENT,
            ControlOp::AnnounceNextRace { .. } => ANNOUNCE_NEXT_RACE,
            ControlOp::WaitForNextRace { .. } => WAIT_FOR_NEXT_RACE,
            ControlOp::GoWatchTheRace { .. } => GO_WATCH_THE_RACE,
            ControlOp::HaveIWon { .. } => HAVE_I_WON,
            ControlOp::ReportResults { .. } => REPORT_RESULTS,
            ControlOp::RelaxABit { .. } => RELAX_A_BIT,
            ControlOp::EntertainTheGuests => ENTERTAIN_THE_GUESTS,
        }
    }

    fn role(&self) -> Option<Role> {
        match self {
            ControlOp::OpenTheEvent
            | ControlOp::AnnounceNextRace { .. }
            | ControlOp::ReportResults { .. }
            | ControlOp::EntertainTheGuests => Some(Role::Broker),
            _ => Some(Role::Spectator),
        }
    }

    fn validate(&self, caller: &Caller, bounds: &Bounds) -> Result<(), ProtocolError> {
        match self {
            ControlOp::OpenTheEvent | ControlOp::EntertainTheGuests => Ok(()),
            ControlOp::AnnounceNextRace { race } => bounds.check_race(*race),
            ControlOp::WaitForNextRace { spectator, race } => {
                bounds.check_spectator(caller, spectator.id)?;
                bounds.check_race(*race)
            }
            ControlOp::GoWatchTheRace { spectator, race } => {
                bounds.check_spectator(caller, *spectator)?;
                bounds.check_race(*race)
            }
            ControlOp::HaveIWon {
                spectator,
                race,
                horse_idx,
            } => {
                bounds.check_spectator(caller, *spectator)?;
                bounds.check_race(*race)?;
                bounds.check_horse_idx(*horse_idx)
            }
            ControlOp::ReportResults { race, result } => {
                bounds.check_race(*race)?;
                if result.race != *race {
                    return Err(ProtocolError::Malformed(format!(
                        "result of race {} reported as race {race}",
                        result.race
                    )));
                }
                result
                    .standings
                    .iter()
                    .try_for_each(|s| bounds.check_horse_idx(s.idx))
            }
            ControlOp::RelaxABit { spectator } => bounds.check_spectator(caller, spectator.id),
        }
    }
}

/// Control centre state: the race under way and the published results.
pub struct ControlCentre {
    races: u32,
    opened: bool,
    announced: Option<RaceId>,
    results: Vec<Option<RaceResult>>,
    /// Spectators waiting for a race to be announced, with the race they wait for.
    waiting: BTreeMap<SpectatorId, RaceId>,
    watchers: Vec<BTreeSet<SpectatorId>>,
    relaxed: Rendezvous<SpectatorId>,
    broker_at_the_bar: bool,
}

impl ControlCentre {
    pub fn new(races: u32, spectators: u32) -> Self {
        Self {
            races,
            opened: false,
            announced: None,
            results: vec![None; races as usize],
            waiting: BTreeMap::new(),
            watchers: vec![BTreeSet::new(); races as usize],
            relaxed: Rendezvous::new(spectators as usize),
            broker_at_the_bar: false,
        }
    }

    fn all_reported(&self) -> bool {
        self.results.iter().all(Option::is_some)
    }

    fn announce(
        &mut self,
        race: RaceId,
        log: &SharedLog,
        wakeups: &mut Wakeups<ControlReply>,
    ) -> Result<Outcome<ControlReply>, RegionFault> {
        if !self.opened {
            return Err(ProtocolError::OutOfSequence("the event is not open".into()).into());
        }
        let next = self.announced.map_or(0, |r| r + 1);
        if race != next {
            return Err(ProtocolError::OutOfSequence(format!(
                "race {race} announced while race {next} is next"
            ))
            .into());
        }
        if race > 0 && self.results[race as usize - 1].is_none() {
            return Err(ProtocolError::OutOfSequence(format!(
                "results of race {} are not reported",
                race - 1
            ))
            .into());
        }

        self.announced = Some(race);
        log.append(LogRecord::broker(BrokerState::AnnouncingNextRace, Some(race)));
        let ready: Vec<SpectatorId> = self
            .waiting
            .iter()
            .filter(|(_, &r)| r == race)
            .map(|(&id, _)| id)
            .collect();
        for id in ready {
            self.waiting.remove(&id);
            wakeups.wake(
                WAIT_FOR_NEXT_RACE,
                Caller::spectator(id),
                ControlReply::RaceStarting(race),
            );
        }
        Ok(Outcome::Done(ControlReply::Announced))
    }

    fn wait_for_next_race(
        &mut self,
        spectator: SpectatorContext,
        race: RaceId,
        log: &SharedLog,
    ) -> Result<Outcome<ControlReply>, RegionFault> {
        if matches!(self.announced, Some(current) if current > race) {
            return Err(ProtocolError::OutOfSequence(format!(
                "race {race} is already over"
            ))
            .into());
        }
        log.append(
            LogRecord::spectator(
                spectator.id,
                SpectatorState::WaitingForARaceToStart,
                Some(race),
            )
            .with_payload(spectator.wallet),
        );
        if self.announced == Some(race) {
            Ok(Outcome::Done(ControlReply::RaceStarting(race)))
        } else {
            self.waiting.insert(spectator.id, race);
            Ok(Outcome::Wait)
        }
    }

    fn report_results(
        &mut self,
        race: RaceId,
        result: RaceResult,
        wakeups: &mut Wakeups<ControlReply>,
    ) -> Result<Outcome<ControlReply>, RegionFault> {
        if self.announced != Some(race) {
            return Err(ProtocolError::OutOfSequence(format!(
                "race {race} is not the race under way"
            ))
            .into());
        }
        let slot = &mut self.results[race as usize];
        if slot.is_some() {
            return Err(ProtocolError::ResultsAlreadyReported { race }.into());
        }
        *slot = Some(result);
        for id in std::mem::take(&mut self.watchers[race as usize]) {
            wakeups.wake(GO_WATCH_THE_RACE, Caller::spectator(id), ControlReply::RaceOver(race));
        }
        Ok(Outcome::Done(ControlReply::Reported))
    }

    fn relax_a_bit(
        &mut self,
        caller: Caller,
        spectator: SpectatorContext,
        log: &SharedLog,
        wakeups: &mut Wakeups<ControlReply>,
    ) -> Result<Outcome<ControlReply>, RegionFault> {
        if !self.all_reported() {
            return Err(ProtocolError::OutOfSequence("races are still to be run".into()).into());
        }
        let last = self.races.saturating_sub(1);
        let arrival = self
            .relaxed
            .arrive(spectator.id)
            .map_err(|e| e.fault(caller, "bar", last))?;
        log.append(
            LogRecord::spectator(spectator.id, SpectatorState::Celebrating, None)
                .with_payload(spectator.wallet),
        );
        if arrival == Arrival::Complete && self.broker_at_the_bar {
            self.broker_at_the_bar = false;
            wakeups.wake(
                ENTERTAIN_THE_GUESTS,
                Caller::broker(),
                ControlReply::EveryoneHasLeft,
            );
        }
        Ok(Outcome::Done(ControlReply::Relaxed))
    }
}

impl SharedRegion for ControlCentre {
    type Op = ControlOp;
    type Reply = ControlReply;
    type Context = SharedLog;

    fn handle(
        &mut self,
        caller: Caller,
        op: ControlOp,
        log: &SharedLog,
        wakeups: &mut Wakeups<ControlReply>,
    ) -> Result<Outcome<ControlReply>, RegionFault> {
        match op {
            ControlOp::OpenTheEvent => {
                if self.opened {
                    return Err(ProtocolError::OutOfSequence("the event is already open".into()).into());
                }
                self.opened = true;
                log.append(LogRecord::broker(BrokerState::OpeningTheEvent, None));
                Ok(Outcome::Done(ControlReply::Opened))
            }
            ControlOp::AnnounceNextRace { race } => self.announce(race, log, wakeups),
            ControlOp::WaitForNextRace { spectator, race } => {
                self.wait_for_next_race(spectator, race, log)
            }
            ControlOp::GoWatchTheRace { spectator, race } => {
                log.append(LogRecord::spectator(
                    spectator,
                    SpectatorState::WatchingARace,
                    Some(race),
                ));
                if self.results[race as usize].is_some() {
                    Ok(Outcome::Done(ControlReply::RaceOver(race)))
                } else {
                    self.watchers[race as usize].insert(spectator);
                    Ok(Outcome::Wait)
                }
            }
            ControlOp::HaveIWon {
                race, horse_idx, ..
            } => match &self.results[race as usize] {
                Some(result) => Ok(Outcome::Done(ControlReply::Won(result.is_winner(horse_idx)))),
                None => Err(ProtocolError::ResultsNotAvailable { race }.into()),
            },
            ControlOp::ReportResults { race, result } => self.report_results(race, result, wakeups),
            ControlOp::RelaxABit { spectator } => self.relax_a_bit(caller, spectator, log, wakeups),
            ControlOp::EntertainTheGuests => {
                if !self.all_reported() {
                    return Err(ProtocolError::OutOfSequence("races are still to be run".into()).into());
                }
                log.append(LogRecord::broker(BrokerState::PlayingHostAtTheBar, None));
                if self.relaxed.is_complete() {
                    Ok(Outcome::Done(ControlReply::EveryoneHasLeft))
                } else {
                    self.broker_at_the_bar = true;
                    Ok(Outcome::Wait)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventConfig;
    use crate::framework::{FrameworkError, RegionClient, RegionPort, RegionServer};
    use crate::model::{Finish, Role};
    use crate::repository::{ActorState, GeneralRepository};
    use std::sync::Arc;
    use std::time::Duration;

    fn start() -> (RegionClient<ControlCentre>, Arc<GeneralRepository>) {
        let config = EventConfig {
            races: 1,
            spectators: 2,
            ..EventConfig::default()
        };
        let centre = ControlCentre::new(config.races, config.spectators);
        let (server, client) = RegionServer::new(centre, config.bounds(), 16);
        let repository = GeneralRepository::new();
        tokio::spawn(server.run(repository.clone() as SharedLog));
        (client, repository)
    }

    fn result() -> RaceResult {
        RaceResult::from_finishes(
            0,
            vec![
                Finish {
                    idx: 2,
                    steps: 6,
                    position: 31,
                },
                Finish {
                    idx: 0,
                    steps: 8,
                    position: 30,
                },
            ],
        )
    }

    async fn broker(client: &RegionClient<ControlCentre>, op: ControlOp) -> ControlReply {
        client.call(Caller::broker(), op).await.unwrap()
    }

    #[tokio::test]
    async fn test_spectators_wait_for_the_announcement_and_the_result() {
        let (client, repository) = start();
        broker(&client, ControlOp::OpenTheEvent).await;

        let punter = SpectatorContext::new(1, 500, 0);
        let stands = {
            let client = client.clone();
            tokio::spawn(async move {
                let me = Caller::spectator(1);
                let started = client
                    .call(me, ControlOp::WaitForNextRace { spectator: punter, race: 0 })
                    .await?;
                let over = client
                    .call(me, ControlOp::GoWatchTheRace { spectator: 1, race: 0 })
                    .await?;
                let won = client
                    .call(
                        me,
                        ControlOp::HaveIWon {
                            spectator: 1,
                            race: 0,
                            horse_idx: 2,
                        },
                    )
                    .await?;
                Ok::<_, FrameworkError>((started, over, won))
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stands.is_finished());

        broker(&client, ControlOp::AnnounceNextRace { race: 0 }).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stands.is_finished());

        broker(
            &client,
            ControlOp::ReportResults {
                race: 0,
                result: result(),
            },
        )
        .await;
        let (started, over, won) = stands.await.unwrap().unwrap();
        assert_eq!(started, ControlReply::RaceStarting(0));
        assert_eq!(over, ControlReply::RaceOver(0));
        assert_eq!(won, ControlReply::Won(true));

        assert_eq!(
            repository.states_of(Role::Spectator, 1),
            vec![
                ActorState::Spectator(SpectatorState::WaitingForARaceToStart),
                ActorState::Spectator(SpectatorState::WatchingARace),
            ]
        );
    }

    #[tokio::test]
    async fn test_results_are_immutable_once_reported() {
        let (client, _) = start();
        broker(&client, ControlOp::OpenTheEvent).await;
        broker(&client, ControlOp::AnnounceNextRace { race: 0 }).await;
        broker(
            &client,
            ControlOp::ReportResults {
                race: 0,
                result: result(),
            },
        )
        .await;

        let again = client
            .call(
                Caller::broker(),
                ControlOp::ReportResults {
                    race: 0,
                    result: RaceResult::from_finishes(0, vec![]),
                },
            )
            .await;
        assert_eq!(
            again,
            Err(FrameworkError::Protocol(ProtocolError::ResultsAlreadyReported {
                race: 0
            }))
        );
    }

    #[tokio::test]
    async fn test_have_i_won_needs_a_result() {
        let (client, _) = start();
        let result = client
            .call(
                Caller::spectator(0),
                ControlOp::HaveIWon {
                    spectator: 0,
                    race: 0,
                    horse_idx: 1,
                },
            )
            .await;
        assert_eq!(
            result,
            Err(FrameworkError::Protocol(ProtocolError::ResultsNotAvailable {
                race: 0
            }))
        );
    }

    #[tokio::test]
    async fn test_broker_hosts_until_the_last_spectator_relaxes() {
        let (client, _) = start();
        broker(&client, ControlOp::OpenTheEvent).await;
        broker(&client, ControlOp::AnnounceNextRace { race: 0 }).await;
        broker(
            &client,
            ControlOp::ReportResults {
                race: 0,
                result: result(),
            },
        )
        .await;

        let host = {
            let client = client.clone();
            tokio::spawn(async move { broker(&client, ControlOp::EntertainTheGuests).await })
        };
        for id in 0..2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(!host.is_finished());
            let relaxed = client
                .call(
                    Caller::spectator(id),
                    ControlOp::RelaxABit {
                        spectator: SpectatorContext::new(id, 10, 0),
                    },
                )
                .await;
            assert_eq!(relaxed, Ok(ControlReply::Relaxed));
        }
        assert_eq!(host.await.unwrap(), ControlReply::EveryoneHasLeft);
    }

    #[tokio::test]
    async fn test_announcements_follow_race_order() {
        let (client, _) = start();
        let closed = client
            .call(Caller::broker(), ControlOp::AnnounceNextRace { race: 0 })
            .await;
        assert!(matches!(
            closed,
            Err(FrameworkError::Protocol(ProtocolError::OutOfSequence(_)))
        ));
    }
}
