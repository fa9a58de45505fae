//! # Event Configuration
//!
//! The fixed constants of one afternoon at the track. They are supplied once, before any
//! actor starts, and never change during the run.
//!
//! Values come from [`EventConfig::default`], optionally overridden by a TOML file
//! ([`EventConfig::from_toml_file`]) and then by command-line flags in `main`.
//!
//! ```toml
//! spectators = 4
//! races = 5
//! horses_per_race = 4
//! track_length = 30
//! max_step = 5
//! initial_wallet = 500
//! seed = 42
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::model::{Caller, HorseContext, HorseIdx, ProtocolError, RaceId, SpectatorId};

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Constants for one run of the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub spectators: u32,
    pub races: u32,
    pub horses_per_race: u32,
    pub track_length: u32,
    /// Upper bound of a horse's agility, hence of any single move.
    pub max_step: u32,
    pub initial_wallet: u64,
    /// Seed for every random choice of the run. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            spectators: 4,
            races: 5,
            horses_per_race: 4,
            track_length: 30,
            max_step: 5,
            initial_wallet: 500,
            seed: None,
        }
    }
}

impl EventConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EventConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("spectators", self.spectators),
            ("races", self.races),
            ("horses_per_race", self.horses_per_race),
            ("track_length", self.track_length),
            ("max_step", self.max_step),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        if self.races.checked_mul(self.horses_per_race).is_none() {
            return Err(ConfigError::Invalid("too many horses".into()));
        }
        Ok(())
    }

    pub fn total_horses(&self) -> u32 {
        self.races * self.horses_per_race
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            races: self.races,
            horses_per_race: self.horses_per_race,
            spectators: self.spectators,
            max_step: self.max_step,
        }
    }
}

/// The id ranges a request may legally mention.
///
/// Checked at the access boundary before a request is forwarded, and again by the
/// region server before region logic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub races: u32,
    pub horses_per_race: u32,
    pub spectators: u32,
    pub max_step: u32,
}

impl Bounds {
    pub fn horses(&self) -> u32 {
        self.races * self.horses_per_race
    }

    pub fn check_race(&self, race: RaceId) -> Result<(), ProtocolError> {
        if race < self.races {
            Ok(())
        } else {
            Err(ProtocolError::UnknownRace { race })
        }
    }

    pub fn check_horse_idx(&self, idx: HorseIdx) -> Result<(), ProtocolError> {
        if idx < self.horses_per_race {
            Ok(())
        } else {
            Err(ProtocolError::HorseIndexOutOfRange { idx })
        }
    }

    pub fn check_step(&self, step: u32) -> Result<(), ProtocolError> {
        if (1..=self.max_step).contains(&step) {
            Ok(())
        } else {
            Err(ProtocolError::StepOutOfRange {
                step,
                max: self.max_step,
            })
        }
    }

    /// Checks a horse context and that the caller is the horse it describes.
    pub fn check_horse(&self, caller: &Caller, horse: &HorseContext) -> Result<(), ProtocolError> {
        if horse.id >= self.horses() {
            return Err(ProtocolError::UnknownHorse { horse: horse.id });
        }
        self.check_race(horse.race)?;
        self.check_horse_idx(horse.idx)?;
        if !(1..=self.max_step).contains(&horse.agility) {
            return Err(ProtocolError::AgilityOutOfRange {
                agility: horse.agility,
                max: self.max_step,
            });
        }
        check_identity(caller, Caller::horse(horse.id))
    }

    /// Checks a spectator id and that the caller is that spectator.
    pub fn check_spectator(
        &self,
        caller: &Caller,
        spectator: SpectatorId,
    ) -> Result<(), ProtocolError> {
        if spectator >= self.spectators {
            return Err(ProtocolError::UnknownSpectator { spectator });
        }
        check_identity(caller, Caller::spectator(spectator))
    }
}

fn check_identity(caller: &Caller, declared: Caller) -> Result<(), ProtocolError> {
    if *caller == declared {
        Ok(())
    } else {
        Err(ProtocolError::IdentityMismatch {
            caller: *caller,
            declared,
        })
    }
}
