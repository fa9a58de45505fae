//! Protocol errors: requests rejected because of invalid or out-of-range input.
//!
//! These cross the wire unchanged, so they are plain data (`Serialize`/`Deserialize`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{Caller, HorseId, HorseIdx, RaceId, Role, SpectatorId};

/// A request the shared regions refuse to apply.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("Unknown race: {race}")]
    UnknownRace { race: RaceId },

    #[error("Unknown horse: {horse}")]
    UnknownHorse { horse: HorseId },

    #[error("Horse index out of range: {idx}")]
    HorseIndexOutOfRange { idx: HorseIdx },

    #[error("Unknown spectator: {spectator}")]
    UnknownSpectator { spectator: SpectatorId },

    #[error("Agility {agility} outside 1..={max}")]
    AgilityOutOfRange { agility: u32, max: u32 },

    #[error("Step {step} outside 1..={max}")]
    StepOutOfRange { step: u32, max: u32 },

    #[error("Operation {operation} requires a {expected}, got a {found}")]
    RoleMismatch {
        operation: String,
        expected: Role,
        found: Role,
    },

    #[error("Caller {caller} declared the identity of {declared}")]
    IdentityMismatch { caller: Caller, declared: Caller },

    #[error("Horse {horse} does not run in race {race} at index {idx}")]
    AssignmentMismatch {
        horse: HorseId,
        race: RaceId,
        idx: HorseIdx,
    },

    #[error("{caller} is already waiting in {room}")]
    AlreadyWaiting { caller: Caller, room: String },

    #[error("{caller} already arrived at {place} for race {race}")]
    DuplicateArrival {
        caller: Caller,
        place: String,
        race: RaceId,
    },

    #[error("Out of sequence: {0}")]
    OutOfSequence(String),

    #[error("Betting for race {race} is closed")]
    BettingClosed { race: RaceId },

    #[error("Gains for race {race} cannot be collected while bets are still being taken")]
    SettlementNotOpen { race: RaceId },

    #[error("Spectator {spectator} already bet on race {race}")]
    DuplicateBet { spectator: SpectatorId, race: RaceId },

    #[error("Stake {stake} exceeds wallet {wallet}")]
    InsufficientFunds { stake: u64, wallet: u64 },

    #[error("Invalid odds for race {race}: {reason}")]
    InvalidOdds { race: RaceId, reason: String },

    #[error("Race {race} has not started")]
    RaceNotStarted { race: RaceId },

    #[error("Horse {horse} already crossed the finish line")]
    HorseFinished { horse: HorseId },

    #[error("Results of race {race} are not available yet")]
    ResultsNotAvailable { race: RaceId },

    #[error("Results of race {race} were already reported")]
    ResultsAlreadyReported { race: RaceId },

    #[error("Malformed request: {0}")]
    Malformed(String),
}
