use thiserror::Error;

use crate::framework::FrameworkError;
use crate::model::Caller;

/// An actor run that ended early. Actors never retry: any failed call ends the run.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("{actor} stopped while {step}: {source}")]
    Region {
        actor: Caller,
        step: &'static str,
        #[source]
        source: FrameworkError,
    },
}

impl ActorError {
    pub fn actor(&self) -> Caller {
        match self {
            ActorError::Region { actor, .. } => *actor,
        }
    }
}

/// Tags a failed region call with the actor and the step it was on.
pub trait StepExt<T> {
    fn during(self, actor: Caller, step: &'static str) -> Result<T, ActorError>;
}

impl<T> StepExt<T> for Result<T, FrameworkError> {
    fn during(self, actor: Caller, step: &'static str) -> Result<T, ActorError> {
        self.map_err(|source| ActorError::Region {
            actor,
            step,
            source,
        })
    }
}
