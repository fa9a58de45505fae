use serde::{Deserialize, Serialize};

use crate::framework::FrameworkError;
use crate::model::{Caller, ProtocolError};

/// One request as it travels to a remote region: who is asking, and what.
///
/// Everything the region needs about the caller rides in `op` (agility, wallet, strategy,
/// race assignment), so a connection carries no state between envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<O> {
    pub caller: Caller,
    pub op: O,
}

impl<O> Envelope<O> {
    pub fn new(caller: Caller, op: O) -> Self {
        Self { caller, op }
    }
}

/// The reply line a region service writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum WireReply<T> {
    Ok(T),
    /// The request broke the protocol and was not applied.
    Rejected(ProtocolError),
    /// The region could not answer (closed, aborted, broken invariant).
    Failed(String),
}

impl<T> From<Result<T, FrameworkError>> for WireReply<T> {
    fn from(result: Result<T, FrameworkError>) -> Self {
        match result {
            Ok(reply) => WireReply::Ok(reply),
            Err(FrameworkError::Protocol(e)) => WireReply::Rejected(e),
            Err(other) => WireReply::Failed(other.to_string()),
        }
    }
}

impl<T> WireReply<T> {
    pub fn into_result(self) -> Result<T, FrameworkError> {
        match self {
            WireReply::Ok(reply) => Ok(reply),
            WireReply::Rejected(e) => Err(FrameworkError::Protocol(e)),
            WireReply::Failed(reason) => Err(FrameworkError::Transport(format!("remote: {reason}"))),
        }
    }
}
