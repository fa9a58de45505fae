use std::time::Duration;

use hippodrome::adapter::TcpPort;
use hippodrome::config::EventConfig;
use hippodrome::control_centre::{ControlCentre, ControlOp};
use hippodrome::framework::{FrameworkError, RegionPort};
use hippodrome::model::{Caller, HorseContext, ProtocolError};
use hippodrome::racing_track::{RacingTrack, TrackOp};
use hippodrome::runtime::{Hippodrome, Policies};
use hippodrome::stable::{Stable, StableOp, StableReply};

const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

fn config(seed: u64) -> EventConfig {
    EventConfig {
        spectators: 3,
        races: 2,
        seed: Some(seed),
        ..EventConfig::default()
    }
}

#[tokio::test]
async fn test_event_runs_over_tcp() {
    let config = config(21);
    let hippodrome = Hippodrome::start_distributed(config.clone(), Policies::default())
        .await
        .unwrap();
    assert!(hippodrome.endpoints().is_some());

    let report = tokio::time::timeout(EVENT_TIMEOUT, hippodrome.run_event())
        .await
        .expect("distributed event deadlocked")
        .unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.spectators.len(), 3);
    assert_eq!(report.moves.len(), config.total_horses() as usize);
    assert!(!report.log.is_empty());
}

#[tokio::test]
async fn test_tcp_and_in_process_runs_agree() {
    let local = Hippodrome::start(config(4), Policies::default())
        .unwrap()
        .run_event();
    let local = tokio::time::timeout(EVENT_TIMEOUT, local).await.unwrap().unwrap();

    let remote = Hippodrome::start_distributed(config(4), Policies::default())
        .await
        .unwrap()
        .run_event();
    let remote = tokio::time::timeout(EVENT_TIMEOUT, remote).await.unwrap().unwrap();

    assert_eq!(local.results, remote.results);
    assert_eq!(local.spectators, remote.spectators);
}

#[tokio::test]
async fn test_out_of_bounds_requests_are_rejected_at_the_boundary() {
    let hippodrome = Hippodrome::start_distributed(config(9), Policies::default())
        .await
        .unwrap();
    let endpoints = hippodrome.endpoints().unwrap();

    let track = TcpPort::<RacingTrack>::new(endpoints.racing_track);
    assert_eq!(
        track
            .call(Caller::broker(), TrackOp::StartTheRace { race: 2 })
            .await,
        Err(FrameworkError::Protocol(ProtocolError::UnknownRace { race: 2 }))
    );

    let horse = HorseContext {
        id: 1,
        race: 0,
        idx: 0,
        agility: 9,
    };
    assert_eq!(
        track
            .call(Caller::horse(1), TrackOp::MakeAMove { horse, step: 1 })
            .await,
        Err(FrameworkError::Protocol(ProtocolError::AgilityOutOfRange {
            agility: 9,
            max: 5
        }))
    );

    let control = TcpPort::<ControlCentre>::new(endpoints.control_centre);
    assert_eq!(
        control
            .call(
                Caller::spectator(7),
                ControlOp::GoWatchTheRace {
                    spectator: 7,
                    race: 0
                }
            )
            .await,
        Err(FrameworkError::Protocol(ProtocolError::UnknownSpectator {
            spectator: 7
        }))
    );

    // A spectator cannot speak for another one.
    assert!(matches!(
        control
            .call(
                Caller::spectator(0),
                ControlOp::GoWatchTheRace {
                    spectator: 1,
                    race: 0
                }
            )
            .await,
        Err(FrameworkError::Protocol(ProtocolError::IdentityMismatch { .. }))
    ));

    // None of it disturbed the regions: the event still runs to the end.
    let report = tokio::time::timeout(EVENT_TIMEOUT, hippodrome.run_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.results.len(), 2);
}

#[tokio::test]
async fn test_lineup_is_served_remotely() {
    let config = config(13);
    let hippodrome = Hippodrome::start_distributed(config.clone(), Policies::default())
        .await
        .unwrap();
    let stable = TcpPort::<Stable>::new(hippodrome.endpoints().unwrap().stable);

    let mut seen = Vec::new();
    for race in 0..config.races {
        match stable
            .call(Caller::broker(), StableOp::Lineup { race })
            .await
            .unwrap()
        {
            StableReply::Lineup(horses) => {
                assert_eq!(horses.len(), config.horses_per_race as usize);
                assert!(horses.iter().all(|h| h.race == race));
                seen.extend(horses.into_iter().map(|h| h.id));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..config.total_horses()).collect::<Vec<_>>());

    hippodrome.shutdown().await;
}
