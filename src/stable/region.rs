use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use thiserror::Error;

use super::odds::OddsPolicy;
use super::ops::*;
use crate::config::EventConfig;
use crate::framework::{Arrival, Outcome, RegionFault, Rendezvous, SharedRegion, Wakeups};
use crate::model::{Caller, Horse, HorseContext, HorseId, HorseIdx, HorseState, ProtocolError, RaceId};
use crate::repository::{LogRecord, SharedLog};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineupError {
    #[error("{horses} horses cannot be split into {races} races of {per_race}")]
    RosterSize {
        horses: usize,
        races: u32,
        per_race: u32,
    },
}

/// Randomly partitions the roster into `races` lineups of `per_race` horses.
///
/// Sets `race` and `idx` on every horse and returns the lineups as horse ids by index.
pub fn assign_races<G: Rng + ?Sized>(
    roster: &mut [Horse],
    races: u32,
    per_race: u32,
    rng: &mut G,
) -> Result<Vec<Vec<HorseId>>, LineupError> {
    if roster.len() as u64 != u64::from(races) * u64::from(per_race) {
        return Err(LineupError::RosterSize {
            horses: roster.len(),
            races,
            per_race,
        });
    }

    let mut pool: Vec<usize> = (0..roster.len()).collect();
    pool.shuffle(rng);

    let mut lineups = Vec::with_capacity(races as usize);
    for (race, chunk) in pool.chunks(per_race as usize).enumerate() {
        let mut lineup = Vec::with_capacity(chunk.len());
        for (idx, &slot) in chunk.iter().enumerate() {
            let horse = &mut roster[slot];
            horse.race = Some(race as RaceId);
            horse.idx = Some(idx as HorseIdx);
            lineup.push(horse.id);
        }
        lineups.push(lineup);
    }
    Ok(lineups)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    NotYet,
    Left,
    Back,
}

/// The stable: owns the roster, the race lineups and their odds.
pub struct Stable {
    roster: Vec<Horse>,
    lineups: Vec<Vec<HorseId>>,
    odds: Vec<Option<Vec<f64>>>,
    policy: Box<dyn OddsPolicy>,
    next_summon: RaceId,
    visits: Vec<Visit>,
    /// Horses parked in the stable, waiting for their race to be summoned.
    parked: BTreeSet<HorseId>,
    returned: Vec<Rendezvous<HorseIdx>>,
    broker_waiting: Option<RaceId>,
}

impl Stable {
    /// Builds a random roster for `config` and partitions it into races.
    pub fn new<G: Rng + ?Sized>(
        config: &EventConfig,
        policy: Box<dyn OddsPolicy>,
        rng: &mut G,
    ) -> Result<Self, LineupError> {
        let roster = Horse::roster(config.total_horses(), config.max_step, rng);
        Self::with_roster(roster, config.races, config.horses_per_race, policy, rng)
    }

    /// Partitions a given roster (horse ids must be `0..len`).
    pub fn with_roster<G: Rng + ?Sized>(
        mut roster: Vec<Horse>,
        races: u32,
        per_race: u32,
        policy: Box<dyn OddsPolicy>,
        rng: &mut G,
    ) -> Result<Self, LineupError> {
        roster.sort_by_key(|h| h.id);
        let lineups = assign_races(&mut roster, races, per_race, rng)?;
        let visits = vec![Visit::NotYet; roster.len()];
        Ok(Self {
            roster,
            lineups,
            odds: vec![None; races as usize],
            policy,
            next_summon: 0,
            visits,
            parked: BTreeSet::new(),
            returned: (0..races)
                .map(|_| Rendezvous::new(per_race as usize))
                .collect(),
            broker_waiting: None,
        })
    }

    /// Contexts of every horse, by id.
    pub fn horses(&self) -> Vec<HorseContext> {
        self.roster.iter().filter_map(Horse::context).collect()
    }

    pub fn lineups(&self) -> &[Vec<HorseId>] {
        &self.lineups
    }

    fn lineup(&self, race: RaceId) -> Vec<HorseContext> {
        self.lineups[race as usize]
            .iter()
            .filter_map(|&id| self.roster[id as usize].context())
            .collect()
    }

    fn race_odds(&mut self, race: RaceId) -> Result<Vec<f64>, RegionFault> {
        if let Some(odds) = &self.odds[race as usize] {
            return Ok(odds.clone());
        }
        let agilities: Vec<u32> = self.lineup(race).iter().map(|h| h.agility).collect();
        let odds = self.policy.odds(&agilities);
        if odds.len() != agilities.len() || odds.iter().any(|o| !o.is_finite() || *o <= 0.0) {
            return Err(RegionFault::Invariant(format!(
                "odds policy produced {odds:?} for race {race}"
            )));
        }
        self.odds[race as usize] = Some(odds.clone());
        Ok(odds)
    }

    fn check_assignment(&self, horse: &HorseContext) -> Result<(), ProtocolError> {
        match self.roster.get(horse.id as usize).and_then(Horse::context) {
            Some(assigned) if assigned == *horse => Ok(()),
            _ => Err(ProtocolError::AssignmentMismatch {
                horse: horse.id,
                race: horse.race,
                idx: horse.idx,
            }),
        }
    }

    fn summon(
        &mut self,
        race: RaceId,
        wakeups: &mut Wakeups<StableReply>,
    ) -> Result<Outcome<StableReply>, RegionFault> {
        if race != self.next_summon {
            return Err(ProtocolError::OutOfSequence(format!(
                "race {race} summoned while race {} is next",
                self.next_summon
            ))
            .into());
        }
        if race > 0 && !self.returned[race as usize - 1].is_complete() {
            return Err(ProtocolError::OutOfSequence(format!(
                "horses of race {} are not back in the stable",
                race - 1
            ))
            .into());
        }
        self.next_summon += 1;
        for &id in &self.lineups[race as usize] {
            if self.parked.remove(&id) {
                wakeups.wake(PROCEED_TO_STABLE, Caller::horse(id), StableReply::LeftForPaddock);
            }
        }
        Ok(Outcome::Done(StableReply::Summoned))
    }

    fn proceed_to_stable(
        &mut self,
        horse: HorseContext,
        log: &SharedLog,
        wakeups: &mut Wakeups<StableReply>,
    ) -> Result<Outcome<StableReply>, RegionFault> {
        self.check_assignment(&horse)?;
        let id = horse.id as usize;
        match self.visits[id] {
            Visit::NotYet => {
                self.visits[id] = Visit::Left;
                log.append(LogRecord::horse(horse.id, HorseState::AtTheStable, horse.race));
                if horse.race < self.next_summon {
                    Ok(Outcome::Done(StableReply::LeftForPaddock))
                } else {
                    self.parked.insert(horse.id);
                    Ok(Outcome::Wait)
                }
            }
            Visit::Left => {
                let arrival = self.returned[horse.race as usize]
                    .arrive(horse.idx)
                    .map_err(|e| e.fault(Caller::horse(horse.id), "stable", horse.race))?;
                self.visits[id] = Visit::Back;
                log.append(LogRecord::horse(horse.id, HorseState::AtTheStable, horse.race));
                if arrival == Arrival::Complete && self.broker_waiting == Some(horse.race) {
                    self.broker_waiting = None;
                    wakeups.wake(AWAIT_HORSES_STABLED, Caller::broker(), StableReply::AllStabled);
                }
                Ok(Outcome::Done(StableReply::Stabled))
            }
            Visit::Back => Err(ProtocolError::OutOfSequence(format!(
                "horse {} is already back in the stable",
                horse.id
            ))
            .into()),
        }
    }
}

impl SharedRegion for Stable {
    type Op = StableOp;
    type Reply = StableReply;
    type Context = SharedLog;

    fn handle(
        &mut self,
        _caller: Caller,
        op: StableOp,
        log: &SharedLog,
        wakeups: &mut Wakeups<StableReply>,
    ) -> Result<Outcome<StableReply>, RegionFault> {
        match op {
            StableOp::Lineup { race } => Ok(Outcome::Done(StableReply::Lineup(self.lineup(race)))),
            StableOp::RaceOdds { race } => Ok(Outcome::Done(StableReply::Odds(self.race_odds(race)?))),
            StableOp::SummonHorsesToPaddock { race } => self.summon(race, wakeups),
            StableOp::ProceedToStable { horse } => self.proceed_to_stable(horse, log, wakeups),
            StableOp::AwaitHorsesStabled { race } => {
                if race >= self.next_summon {
                    return Err(ProtocolError::OutOfSequence(format!(
                        "race {race} has not been summoned"
                    ))
                    .into());
                }
                if self.returned[race as usize].is_complete() {
                    Ok(Outcome::Done(StableReply::AllStabled))
                } else {
                    self.broker_waiting = Some(race);
                    Ok(Outcome::Wait)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{FrameworkError, RegionClient, RegionPort, RegionServer};
    use crate::repository::GeneralRepository;
    use crate::stable::InverseAgility;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> EventConfig {
        EventConfig {
            races: 2,
            horses_per_race: 3,
            ..EventConfig::default()
        }
    }

    fn start(config: &EventConfig) -> (RegionClient<Stable>, Vec<HorseContext>) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let stable = Stable::new(config, Box::new(InverseAgility), &mut rng).unwrap();
        let horses = stable.horses();
        let (server, client) = RegionServer::new(stable, config.bounds(), 16);
        let log: SharedLog = GeneralRepository::new();
        tokio::spawn(server.run(log));
        (client, horses)
    }

    #[test]
    fn test_partition_is_a_disjoint_cover() {
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut roster = Horse::roster(12, 5, &mut rng);
            let lineups = assign_races(&mut roster, 3, 4, &mut rng).unwrap();

            assert_eq!(lineups.len(), 3);
            assert!(lineups.iter().all(|l| l.len() == 4));
            let mut all: Vec<HorseId> = lineups.concat();
            all.sort();
            assert_eq!(all, (0..12).collect::<Vec<_>>());

            for (race, lineup) in lineups.iter().enumerate() {
                for (idx, &id) in lineup.iter().enumerate() {
                    assert_eq!(roster[id as usize].race, Some(race as RaceId));
                    assert_eq!(roster[id as usize].idx, Some(idx as HorseIdx));
                }
            }
        }
    }

    #[test]
    fn test_roster_size_must_match_the_races() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut roster = Horse::roster(7, 5, &mut rng);
        assert_eq!(
            assign_races(&mut roster, 2, 4, &mut rng),
            Err(LineupError::RosterSize {
                horses: 7,
                races: 2,
                per_race: 4
            })
        );
    }

    #[tokio::test]
    async fn test_odds_are_computed_once_and_stay_fixed() {
        let (client, _) = start(&config());
        let first = client.call(Caller::broker(), StableOp::RaceOdds { race: 1 }).await;
        let again = client.call(Caller::spectator(0), StableOp::RaceOdds { race: 1 }).await;
        assert!(matches!(first, Ok(StableReply::Odds(ref o)) if o.len() == 3));
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_horses_wait_for_summons_and_broker_waits_for_their_return() {
        let config = config();
        let (client, horses) = start(&config);
        let runners: Vec<HorseContext> = horses.iter().copied().filter(|h| h.race == 0).collect();

        let mut waiting = vec![];
        for horse in runners.clone() {
            let client = client.clone();
            waiting.push(tokio::spawn(async move {
                client
                    .call(Caller::horse(horse.id), StableOp::ProceedToStable { horse })
                    .await
            }));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(waiting.iter().all(|h| !h.is_finished()));

        let summoned = client
            .call(Caller::broker(), StableOp::SummonHorsesToPaddock { race: 0 })
            .await;
        assert_eq!(summoned, Ok(StableReply::Summoned));
        for handle in waiting {
            assert_eq!(handle.await.unwrap(), Ok(StableReply::LeftForPaddock));
        }

        let broker = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call(Caller::broker(), StableOp::AwaitHorsesStabled { race: 0 })
                    .await
            })
        };
        for (n, horse) in runners.iter().enumerate() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(!broker.is_finished(), "released after {n} returns");
            let back = client
                .call(Caller::horse(horse.id), StableOp::ProceedToStable { horse: *horse })
                .await;
            assert_eq!(back, Ok(StableReply::Stabled));
        }
        assert_eq!(broker.await.unwrap(), Ok(StableReply::AllStabled));
    }

    #[tokio::test]
    async fn test_summons_must_follow_race_order() {
        let (client, _) = start(&config());
        let result = client
            .call(Caller::broker(), StableOp::SummonHorsesToPaddock { race: 1 })
            .await;
        assert!(matches!(
            result,
            Err(FrameworkError::Protocol(ProtocolError::OutOfSequence(_)))
        ));
    }

    #[tokio::test]
    async fn test_declared_assignment_must_match_the_lineup() {
        let (client, horses) = start(&config());
        let mut forged = horses[0];
        forged.race = 1 - forged.race;
        let result = client
            .call(Caller::horse(forged.id), StableOp::ProceedToStable { horse: forged })
            .await;
        assert!(matches!(
            result,
            Err(FrameworkError::Protocol(ProtocolError::AssignmentMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_race_is_rejected() {
        let (client, _) = start(&config());
        let result = client.call(Caller::broker(), StableOp::Lineup { race: 2 }).await;
        assert_eq!(
            result,
            Err(FrameworkError::Protocol(ProtocolError::UnknownRace { race: 2 }))
        );
    }
}
