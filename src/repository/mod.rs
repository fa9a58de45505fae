//! # General Repository
//!
//! Append-only sink for state transitions. Regions append a record whenever they admit an
//! operation that moves an actor into a new lifecycle state. Nothing on the decision path
//! ever reads it back; it exists for observability and for the tests.
//!
//! Writers only contend on the short lock needed to stamp a sequence number and push the
//! entry.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::model::{BrokerState, HorseState, RaceId, Role, SpectatorState};

/// The lifecycle state an actor moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum ActorState {
    Broker(BrokerState),
    Horse(HorseState),
    Spectator(SpectatorState),
}

impl ActorState {
    pub fn role(&self) -> Role {
        match self {
            ActorState::Broker(_) => Role::Broker,
            ActorState::Horse(_) => Role::Horse,
            ActorState::Spectator(_) => Role::Spectator,
        }
    }
}

impl Display for ActorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorState::Broker(s) => write!(f, "{s}"),
            ActorState::Horse(s) => write!(f, "{s}"),
            ActorState::Spectator(s) => write!(f, "{s}"),
        }
    }
}

/// A state snapshot submitted by a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub actor_id: u32,
    pub state: ActorState,
    pub race: Option<RaceId>,
    /// Wallet, gains, position or step count, depending on the state.
    pub payload: Option<i64>,
}

impl LogRecord {
    pub fn broker(state: BrokerState, race: Option<RaceId>) -> Self {
        Self {
            actor_id: crate::model::BROKER_ID,
            state: ActorState::Broker(state),
            race,
            payload: None,
        }
    }

    pub fn horse(id: u32, state: HorseState, race: RaceId) -> Self {
        Self {
            actor_id: id,
            state: ActorState::Horse(state),
            race: Some(race),
            payload: None,
        }
    }

    pub fn spectator(id: u32, state: SpectatorState, race: Option<RaceId>) -> Self {
        Self {
            actor_id: id,
            state: ActorState::Spectator(state),
            race,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl TryInto<i64>) -> Self {
        self.payload = payload.try_into().ok();
        self
    }
}

/// A record once appended: immutable, stamped with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub actor_id: u32,
    pub state: ActorState,
    pub race: Option<RaceId>,
    pub payload: Option<i64>,
}

/// Where regions send their state snapshots.
pub trait LogSink: Send + Sync {
    fn append(&self, record: LogRecord);
}

/// Shared handle regions receive as their run-time context.
pub type SharedLog = Arc<dyn LogSink>;

/// In-memory append-only log.
#[derive(Default)]
pub struct GeneralRepository {
    entries: Mutex<Vec<LogEntry>>,
}

impl GeneralRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of every entry appended so far, in append order.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The states one actor went through, in order.
    pub fn states_of(&self, role: Role, actor_id: u32) -> Vec<ActorState> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.state.role() == role && e.actor_id == actor_id)
            .map(|e| e.state)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for GeneralRepository {
    fn append(&self, record: LogRecord) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = LogEntry {
            seq: entries.len() as u64,
            actor_id: record.actor_id,
            state: record.state,
            race: record.race,
            payload: record.payload,
        };
        info!(
            seq = entry.seq,
            role = %entry.state.role(),
            actor = entry.actor_id,
            state = %entry.state,
            race = ?entry.race,
            payload = ?entry.payload,
            "State"
        );
        entries.push(entry);
    }
}
