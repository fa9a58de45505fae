//! # Actors
//!
//! The self-driving participants of the event. Each actor is a plain async `run` loop
//! that walks its lifecycle by calling the shared regions in a fixed order, one region
//! at a time. Actors carry their own context (wallet, strategy, agility, race
//! assignment) and send it with every call; the regions keep no per-connection state.
//!
//! | Actor | Lifecycle |
//! |---|---|
//! | [`Broker`] | opening the event → per race: announce, wait for bets, supervise, settle → host at the bar |
//! | [`HorseJockey`] | stable → paddock → start line → running → finish line → stable |
//! | [`Spectator`] | per race: wait, appraise, bet, watch, collect → celebrate |

pub mod broker;
pub mod error;
pub mod horse;
pub mod spectator;

pub use broker::Broker;
pub use error::{ActorError, StepExt};
pub use horse::HorseJockey;
pub use spectator::Spectator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting_centre::{BettingCentre, BettingReply};
    use crate::clients::{BettingClient, ControlClient, PaddockClient, StableClient, TrackClient};
    use crate::control_centre::{ControlCentre, ControlReply};
    use crate::framework::mock::MockPort;
    use crate::framework::FrameworkError;
    use crate::model::{Caller, HorseContext, ProtocolError, SpectatorContext};
    use crate::paddock::{Paddock, PaddockReply};
    use crate::racing_track::{RacingTrack, TrackReply};
    use crate::stable::{Stable, StableReply};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spectator_walks_one_race_in_order() {
        let control = MockPort::<ControlCentre>::new();
        let paddock = MockPort::<Paddock>::new();
        let betting = MockPort::<BettingCentre>::new();

        control
            .expect("wait_for_next_race")
            .return_ok(ControlReply::RaceStarting(0));
        paddock
            .expect("go_check_horses")
            .return_ok(PaddockReply::HorsesReady);
        betting.expect("place_a_bet").return_ok(BettingReply::BetPlaced {
            horse_idx: 1,
            stake: 200,
            wallet: 300,
        });
        control
            .expect("go_watch_the_race")
            .return_ok(ControlReply::RaceOver(0));
        control.expect("have_i_won").return_ok(ControlReply::Won(true));
        betting.expect("go_collect_the_gains").return_ok(BettingReply::Gains {
            amount: 800,
            wallet: 1100,
        });
        control.expect("relax_a_bit").return_ok(ControlReply::Relaxed);

        let spectator = Spectator::new(
            SpectatorContext::new(3, 500, 1),
            1,
            ControlClient::new(Arc::new(control.clone())),
            PaddockClient::new(Arc::new(paddock.clone())),
            BettingClient::new(Arc::new(betting.clone())),
        );
        let finished = spectator.run().await.unwrap();

        assert_eq!(finished.wallet, 1100);
        control.verify();
        paddock.verify();
        betting.verify();
        let tags: Vec<_> = control.calls().into_iter().map(|(_, tag)| tag).collect();
        assert_eq!(
            tags,
            vec![
                "wait_for_next_race",
                "go_watch_the_race",
                "have_i_won",
                "relax_a_bit"
            ]
        );
        assert!(control
            .calls()
            .iter()
            .all(|(caller, _)| *caller == Caller::spectator(3)));
    }

    #[tokio::test]
    async fn test_horse_keeps_moving_until_it_crosses_the_line() {
        let stable = MockPort::<Stable>::new();
        let paddock = MockPort::<Paddock>::new();
        let track = MockPort::<RacingTrack>::new();

        stable
            .expect("proceed_to_stable")
            .return_ok(StableReply::LeftForPaddock);
        paddock
            .expect("proceed_to_paddock")
            .return_ok(PaddockReply::LeaveForStartLine);
        track.expect("proceed_to_start_line").return_ok(TrackReply::Go);
        for (position, crossed) in [(3, false), (6, false), (9, true)] {
            track.expect("make_a_move").return_ok(TrackReply::Moved {
                position,
                finished: crossed,
            });
            track
                .expect("has_finish_line_been_crossed")
                .return_ok(TrackReply::Crossed(crossed));
        }
        stable
            .expect("proceed_to_stable")
            .return_ok(StableReply::Stabled);

        let horse = HorseContext {
            id: 5,
            race: 1,
            idx: 2,
            agility: 3,
        };
        let jockey = HorseJockey::new(
            horse,
            ChaCha8Rng::seed_from_u64(5),
            StableClient::new(Arc::new(stable.clone())),
            PaddockClient::new(Arc::new(paddock.clone())),
            TrackClient::new(Arc::new(track.clone())),
        );

        assert_eq!(jockey.run().await.unwrap(), 3);
        stable.verify();
        track.verify();
    }

    #[tokio::test]
    async fn test_protocol_error_ends_the_run() {
        let control = MockPort::<ControlCentre>::new();
        control
            .expect("wait_for_next_race")
            .return_err(FrameworkError::Protocol(ProtocolError::UnknownRace { race: 0 }));

        let spectator = Spectator::new(
            SpectatorContext::new(0, 500, 0),
            2,
            ControlClient::new(Arc::new(control.clone())),
            PaddockClient::new(Arc::new(MockPort::<Paddock>::new())),
            BettingClient::new(Arc::new(MockPort::<BettingCentre>::new())),
        );
        let error = spectator.run().await.unwrap_err();
        assert_eq!(error.actor(), Caller::spectator(0));
        assert!(error.to_string().contains("waiting for a race to start"));
    }
}
