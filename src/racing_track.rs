//! # Racing Track
//!
//! Runs one race at a time. Horses line up at the start line; the race starts once the
//! whole field is there and the broker has given the signal. Horses then move in
//! round-robin turns (by index, skipping horses that already finished), so after every
//! full turn all runners still racing have made the same number of moves. A move sent
//! out of turn waits until the horse's turn comes.
//!
//! Finishers are ranked by the number of moves they needed; every horse tied on the
//! lowest count is a winner. The result is frozen when the last horse crosses the line
//! and is handed to the broker, who has been waiting since the start signal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Bounds;
use crate::framework::{Arrival, Operation, Outcome, RegionFault, Rendezvous, SharedRegion, Wakeups};
use crate::model::{
    BrokerState, Caller, Finish, HorseContext, HorseIdx, HorseState, ProtocolError, RaceId,
    RaceResult, Role,
};
use crate::repository::{LogRecord, SharedLog};

pub const PROCEED_TO_START_LINE: &str = "proceed_to_start_line";
pub const START_THE_RACE: &str = "start_the_race";
pub const MAKE_A_MOVE: &str = "make_a_move";
pub const HAS_FINISH_LINE_BEEN_CROSSED: &str = "has_finish_line_been_crossed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TrackOp {
    ProceedToStartLine { horse: HorseContext },
    StartTheRace { race: RaceId },
    MakeAMove { horse: HorseContext, step: u32 },
    HasFinishLineBeenCrossed { horse: HorseContext },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "value", rename_all = "snake_case")]
pub enum TrackReply {
    /// The race is on.
    Go,
    Moved { position: u32, finished: bool },
    Crossed(bool),
    Finished(RaceResult),
}

impl Operation for TrackOp {
    fn tag(&self) -> &'static str {
        match self {
            TrackOp::ProceedToStartLine { .. } => PROCEED_TO_START_LINE,
            TrackOp::StartTheRace { .. } => START_THE_RACE,
            TrackOp::MakeAMove { .. } => MAKE_A_MOVE,
            TrackOp::HasFinishLineBeenCrossed { .. } => HAS_FINISH_LINE_BEEN_CROSSED,
        }
    }

    fn role(&self) -> Option<Role> {
        match self {
            TrackOp::StartTheRace { .. } => Some(Role::Broker),
            _ => Some(Role::Horse),
        }
    }

    fn validate(&self, caller: &Caller, bounds: &Bounds) -> Result<(), ProtocolError> {
        match self {
            TrackOp::StartTheRace { race } => bounds.check_race(*race),
            TrackOp::ProceedToStartLine { horse }
            | TrackOp::HasFinishLineBeenCrossed { horse } => bounds.check_horse(caller, horse),
            TrackOp::MakeAMove { horse, step } => {
                bounds.check_horse(caller, horse)?;
                bounds.check_step(*step)
            }
        }
    }
}

#[derive(Debug)]
struct Runner {
    horse: HorseContext,
    position: u32,
    moves: u32,
    finished: bool,
}

#[derive(Debug)]
struct Run {
    start_line: Rendezvous<HorseIdx>,
    runners: BTreeMap<HorseIdx, Runner>,
    broker_waiting: bool,
    started: bool,
    turn: Option<HorseIdx>,
    /// Moves sent out of turn, by horse index.
    pending: BTreeMap<HorseIdx, u32>,
    finishes: Vec<Finish>,
    result: Option<RaceResult>,
}

impl Run {
    fn new(horses_per_race: u32) -> Self {
        Self {
            start_line: Rendezvous::new(horses_per_race as usize),
            runners: BTreeMap::new(),
            broker_waiting: false,
            started: false,
            turn: None,
            pending: BTreeMap::new(),
            finishes: Vec::new(),
            result: None,
        }
    }

    fn start(&mut self, wakeups: &mut Wakeups<TrackReply>) {
        self.started = true;
        self.turn = self.runners.keys().next().copied();
        wakeups.wake_all(
            PROCEED_TO_START_LINE,
            self.runners.values().map(|r| Caller::horse(r.horse.id)),
            TrackReply::Go,
        );
    }

    /// The next horse still running after `idx`, wrapping around.
    fn next_turn(&self, idx: HorseIdx) -> Option<HorseIdx> {
        let running = |(i, r): (&HorseIdx, &Runner)| (!r.finished).then_some(*i);
        self.runners
            .range(idx + 1..)
            .find_map(running)
            .or_else(|| self.runners.range(..=idx).find_map(running))
    }
}

/// The racing track, one run per race.
pub struct RacingTrack {
    track_length: u32,
    runs: Vec<Run>,
}

impl RacingTrack {
    pub fn new(races: u32, horses_per_race: u32, track_length: u32) -> Self {
        Self {
            track_length,
            runs: (0..races).map(|_| Run::new(horses_per_race)).collect(),
        }
    }

    fn proceed_to_start_line(
        &mut self,
        caller: Caller,
        horse: HorseContext,
        log: &SharedLog,
        wakeups: &mut Wakeups<TrackReply>,
    ) -> Result<Outcome<TrackReply>, RegionFault> {
        let run = &mut self.runs[horse.race as usize];
        let arrival = run
            .start_line
            .arrive(horse.idx)
            .map_err(|e| e.fault(caller, "start line", horse.race))?;
        run.runners.insert(
            horse.idx,
            Runner {
                horse,
                position: 0,
                moves: 0,
                finished: false,
            },
        );
        log.append(LogRecord::horse(horse.id, HorseState::AtTheStartLine, horse.race));

        if arrival == Arrival::Complete && run.broker_waiting {
            run.start(wakeups);
        }
        Ok(Outcome::Wait)
    }

    fn start_the_race(
        &mut self,
        race: RaceId,
        log: &SharedLog,
        wakeups: &mut Wakeups<TrackReply>,
    ) -> Result<Outcome<TrackReply>, RegionFault> {
        let run = &mut self.runs[race as usize];
        if run.broker_waiting || run.result.is_some() {
            return Err(ProtocolError::OutOfSequence(format!("race {race} was already started")).into());
        }
        run.broker_waiting = true;
        log.append(LogRecord::broker(BrokerState::SupervisingTheRace, Some(race)));

        if run.start_line.is_complete() {
            run.start(wakeups);
        }
        Ok(Outcome::Wait)
    }

    fn make_a_move(
        &mut self,
        horse: HorseContext,
        step: u32,
        log: &SharedLog,
        wakeups: &mut Wakeups<TrackReply>,
    ) -> Result<Outcome<TrackReply>, RegionFault> {
        let track_length = self.track_length;
        let run = &mut self.runs[horse.race as usize];
        let Some(runner) = run.runners.get(&horse.idx) else {
            return Err(ProtocolError::RaceNotStarted { race: horse.race }.into());
        };
        if runner.horse != horse {
            return Err(ProtocolError::AssignmentMismatch {
                horse: horse.id,
                race: horse.race,
                idx: horse.idx,
            }
            .into());
        }
        if !run.started {
            return Err(ProtocolError::RaceNotStarted { race: horse.race }.into());
        }
        if runner.finished {
            return Err(ProtocolError::HorseFinished { horse: horse.id }.into());
        }
        if step > horse.agility {
            return Err(ProtocolError::StepOutOfRange {
                step,
                max: horse.agility,
            }
            .into());
        }

        if run.turn != Some(horse.idx) {
            run.pending.insert(horse.idx, step);
            return Ok(Outcome::Wait);
        }

        // Apply this move, then every parked move whose turn comes up in sequence.
        let mut reply = None;
        let (mut idx, mut step) = (horse.idx, step);
        loop {
            let moved = apply_move(run, idx, step, track_length, log)?;
            match reply {
                None => reply = Some(moved),
                Some(_) => {
                    let id = run.runners[&idx].horse.id;
                    wakeups.wake(MAKE_A_MOVE, Caller::horse(id), moved);
                }
            }

            run.turn = run.next_turn(idx);
            let Some(next) = run.turn else {
                let result = RaceResult::from_finishes(horse.race, std::mem::take(&mut run.finishes));
                if !run.broker_waiting {
                    return Err(RegionFault::Invariant(format!(
                        "race {} finished without a broker supervising it",
                        horse.race
                    )));
                }
                run.broker_waiting = false;
                run.result = Some(result.clone());
                wakeups.wake(START_THE_RACE, Caller::broker(), TrackReply::Finished(result));
                break;
            };
            match run.pending.remove(&next) {
                Some(parked_step) => (idx, step) = (next, parked_step),
                None => break,
            }
        }

        reply
            .map(Outcome::Done)
            .ok_or_else(|| RegionFault::Invariant("move applied without a reply".into()))
    }

    /// Frozen result of a finished race.
    pub fn result(&self, race: RaceId) -> Option<&RaceResult> {
        self.runs.get(race as usize)?.result.as_ref()
    }
}

fn apply_move(
    run: &mut Run,
    idx: HorseIdx,
    step: u32,
    track_length: u32,
    log: &SharedLog,
) -> Result<TrackReply, RegionFault> {
    let runner = run
        .runners
        .get_mut(&idx)
        .ok_or_else(|| RegionFault::Invariant(format!("turn given to unknown horse {idx}")))?;
    if runner.finished {
        return Err(RegionFault::Invariant(format!(
            "turn given to finished horse {}",
            runner.horse.id
        )));
    }

    runner.position += step;
    runner.moves += 1;
    let race = runner.horse.race;
    if runner.moves == 1 {
        log.append(LogRecord::horse(runner.horse.id, HorseState::Running, race));
    }
    if runner.position >= track_length {
        runner.finished = true;
        run.finishes.push(Finish {
            idx,
            steps: runner.moves,
            position: runner.position,
        });
        log.append(
            LogRecord::horse(runner.horse.id, HorseState::AtTheFinishLine, race)
                .with_payload(runner.moves),
        );
    }
    Ok(TrackReply::Moved {
        position: runner.position,
        finished: runner.finished,
    })
}

impl SharedRegion for RacingTrack {
    type Op = TrackOp;
    type Reply = TrackReply;
    type Context = SharedLog;

    fn handle(
        &mut self,
        caller: Caller,
        op: TrackOp,
        log: &SharedLog,
        wakeups: &mut Wakeups<TrackReply>,
    ) -> Result<Outcome<TrackReply>, RegionFault> {
        match op {
            TrackOp::ProceedToStartLine { horse } => {
                self.proceed_to_start_line(caller, horse, log, wakeups)
            }
            TrackOp::StartTheRace { race } => self.start_the_race(race, log, wakeups),
            TrackOp::MakeAMove { horse, step } => self.make_a_move(horse, step, log, wakeups),
            TrackOp::HasFinishLineBeenCrossed { horse } => {
                let run = &self.runs[horse.race as usize];
                match run.runners.get(&horse.idx) {
                    Some(runner) if run.started => Ok(Outcome::Done(TrackReply::Crossed(runner.finished))),
                    _ => Err(ProtocolError::RaceNotStarted { race: horse.race }.into()),
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
    use crate::repository::GeneralRepository;
    use std::time::Duration;

    fn start(track_length: u32) -> RegionClient<RacingTrack> {
        start_event(1, track_length)
    }

    fn start_event(races: u32, track_length: u32) -> RegionClient<RacingTrack> {
        let config = EventConfig {
            races,
            horses_per_race: 4,
            track_length,
            max_step: 5,
            ..EventConfig::default()
        };
        let track = RacingTrack::new(config.races, config.horses_per_race, config.track_length);
        let (server, client) = RegionServer::new(track, config.bounds(), 32);
        let log: SharedLog = GeneralRepository::new();
        tokio::spawn(server.run(log));
        client
    }

    fn field(agilities: &[u32]) -> Vec<HorseContext> {
        field_of(0, agilities)
    }

    fn field_of(race: RaceId, agilities: &[u32]) -> Vec<HorseContext> {
        agilities
            .iter()
            .enumerate()
            .map(|(idx, &agility)| HorseContext {
                id: race * agilities.len() as u32 + idx as u32,
                race,
                idx: idx as u32,
                agility,
            })
            .collect()
    }

    type Pending = tokio::task::JoinHandle<Result<TrackReply, FrameworkError>>;

    fn line_up(client: &RegionClient<RacingTrack>, horses: &[HorseContext]) -> Vec<Pending> {
        horses
            .iter()
            .map(|&horse| {
                let client = client.clone();
                tokio::spawn(async move {
                    client
                        .call(Caller::horse(horse.id), TrackOp::ProceedToStartLine { horse })
                        .await
                })
            })
            .collect()
    }

    fn signal_start(client: &RegionClient<RacingTrack>, race: RaceId) -> Pending {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .call(Caller::broker(), TrackOp::StartTheRace { race })
                .await
        })
    }

    /// Runs every horse at full stride and returns the broker's result.
    async fn race_at_full_stride(agilities: &[u32], track_length: u32) -> RaceResult {
        let client = start(track_length);
        let mut horses = vec![];
        for horse in field(agilities) {
            let client = client.clone();
            horses.push(tokio::spawn(async move {
                let me = Caller::horse(horse.id);
                let go = client.call(me, TrackOp::ProceedToStartLine { horse }).await?;
                assert_eq!(go, TrackReply::Go);
                loop {
                    client
                        .call(me, TrackOp::MakeAMove { horse, step: horse.agility })
                        .await?;
                    let crossed = client
                        .call(me, TrackOp::HasFinishLineBeenCrossed { horse })
                        .await?;
                    if crossed == TrackReply::Crossed(true) {
                        return Ok::<_, FrameworkError>(());
                    }
                }
            }));
        }

        let reply = client
            .call(Caller::broker(), TrackOp::StartTheRace { race: 0 })
            .await
            .unwrap();
        for horse in horses {
            horse.await.unwrap().unwrap();
        }
        match reply {
            TrackReply::Finished(result) => result,
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fastest_horse_wins() {
        let result = race_at_full_stride(&[5, 3, 3, 1], 25).await;
        assert_eq!(result.winners, vec![0]);
        assert_eq!(result.standings[0].steps, 5);
        assert_eq!(result.standings[0].position, 25);
        let slowest = result.standings.last().unwrap();
        assert_eq!((slowest.idx, slowest.steps), (3, 25));
    }

    #[tokio::test]
    async fn test_finishing_on_the_same_move_is_a_tie() {
        let result = race_at_full_stride(&[5, 5, 3, 1], 25).await;
        assert_eq!(result.winners, vec![0, 1]);
        assert!(result.standings[..2].iter().all(|s| s.rank == 1));
    }

    #[tokio::test]
    async fn test_move_out_of_turn_waits_for_its_turn() {
        let client = start(25);
        let horses = field(&[2, 2, 2, 2]);
        let mut lined_up = vec![];
        for horse in horses.clone() {
            let client = client.clone();
            lined_up.push(tokio::spawn(async move {
                client
                    .call(Caller::horse(horse.id), TrackOp::ProceedToStartLine { horse })
                    .await
            }));
        }
        let broker = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call(Caller::broker(), TrackOp::StartTheRace { race: 0 })
                    .await
            })
        };
        for handle in lined_up {
            assert_eq!(handle.await.unwrap(), Ok(TrackReply::Go));
        }

        let second = horses[1];
        let early = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call(
                        Caller::horse(second.id),
                        TrackOp::MakeAMove {
                            horse: second,
                            step: 2,
                        },
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!early.is_finished());

        let first = horses[0];
        let moved = client
            .call(
                Caller::horse(first.id),
                TrackOp::MakeAMove {
                    horse: first,
                    step: 1,
                },
            )
            .await;
        assert_eq!(
            moved,
            Ok(TrackReply::Moved {
                position: 1,
                finished: false
            })
        );
        assert_eq!(
            early.await.unwrap(),
            Ok(TrackReply::Moved {
                position: 2,
                finished: false
            })
        );
        assert!(!broker.is_finished());
    }

    #[tokio::test]
    async fn test_step_above_agility_is_rejected() {
        let client = start(25);
        let horses = field(&[2, 2, 2, 2]);
        let lined_up = line_up(&client, &horses);
        let _broker = signal_start(&client, 0);
        for handle in lined_up {
            assert_eq!(handle.await.unwrap(), Ok(TrackReply::Go));
        }

        let first = horses[0];
        let me = Caller::horse(first.id);
        let too_far = client
            .call(me, TrackOp::MakeAMove { horse: first, step: 3 })
            .await;
        assert_eq!(
            too_far,
            Err(FrameworkError::Protocol(ProtocolError::StepOutOfRange {
                step: 3,
                max: 2
            }))
        );

        // The rejected move left the horse where it was and kept its turn.
        let moved = client
            .call(me, TrackOp::MakeAMove { horse: first, step: 2 })
            .await;
        assert_eq!(
            moved,
            Ok(TrackReply::Moved {
                position: 2,
                finished: false
            })
        );
    }

    #[tokio::test]
    async fn test_move_before_the_start_is_rejected() {
        let client = start(25);
        let horse = field(&[2, 2, 2, 2])[0];
        let result = client
            .call(Caller::horse(horse.id), TrackOp::MakeAMove { horse, step: 1 })
            .await;
        assert_eq!(
            result,
            Err(FrameworkError::Protocol(ProtocolError::RaceNotStarted {
                race: 0
            }))
        );

        let beyond_max = client
            .call(Caller::horse(horse.id), TrackOp::MakeAMove { horse, step: 6 })
            .await;
        assert!(matches!(
            beyond_max,
            Err(FrameworkError::Protocol(ProtocolError::StepOutOfRange { step: 6, max: 5 }))
        ));
    }

    #[tokio::test]
    async fn test_starting_a_race_leaves_the_next_field_at_the_line() {
        let client = start_event(2, 2);
        let next_field = field_of(1, &[2, 2, 2, 2]);
        let early = line_up(&client, &next_field[..1]);

        let first_field = field(&[2, 2, 2, 2]);
        let lined_up = line_up(&client, &first_field);
        let broker = signal_start(&client, 0);
        for handle in lined_up {
            assert_eq!(handle.await.unwrap(), Ok(TrackReply::Go));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!early[0].is_finished(), "race 0 start released a race 1 horse");

        for horse in first_field {
            let moved = client
                .call(Caller::horse(horse.id), TrackOp::MakeAMove { horse, step: 2 })
                .await;
            assert_eq!(
                moved,
                Ok(TrackReply::Moved {
                    position: 2,
                    finished: true
                })
            );
        }
        assert!(matches!(broker.await.unwrap(), Ok(TrackReply::Finished(_))));
        assert!(!early[0].is_finished());

        let rest = line_up(&client, &next_field[1..]);
        let _next_broker = signal_start(&client, 1);
        for handle in early.into_iter().chain(rest) {
            assert_eq!(handle.await.unwrap(), Ok(TrackReply::Go));
        }
    }
}
