//! # Core Region Framework
//!
//! This module defines the generic building blocks every shared region is built from.
//!
//! ## Key Types
//!
//! - [`SharedRegion`]: the trait a region's state machine implements.
//! - [`Operation`]: the trait a region's typed request enum implements.
//! - [`RegionServer`]: the generic server loop; its sequential processing *is* the
//!   monitor's critical section.
//! - [`RegionClient`]: the in-process handle used to send requests to a server.
//! - [`RegionPort`]: the calling convention shared by in-process and remote handles.
//! - [`FrameworkError`]: common errors (region closed, protocol, invariant, transport).

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::waiting::{MonitorSlot, WaitingRoom};
use crate::config::Bounds;
use crate::model::{Caller, ProtocolError, Role};

// =============================================================================
// 1. THE ABSTRACTION
// =============================================================================

/// A typed request understood by one shared region.
///
/// Implemented by the per-region op enums (`StableOp`, `PaddockOp`, ...). The same type is
/// what travels over the wire, so validation lives here and runs both at the access
/// boundary and inside the region server.
pub trait Operation: Debug + Send + 'static {
    /// Name of the operation. Also names its waiting room.
    fn tag(&self) -> &'static str;

    /// The only role allowed to invoke this operation, or `None` if any actor may.
    fn role(&self) -> Option<Role>;

    /// Checks every declared id against the configured bounds.
    fn validate(&self, caller: &Caller, bounds: &Bounds) -> Result<(), ProtocolError>;
}

/// Rejects a caller whose declared role may not invoke `op`.
pub fn check_role<O: Operation>(op: &O, caller: &Caller) -> Result<(), ProtocolError> {
    match op.role() {
        Some(expected) if expected != caller.role => Err(ProtocolError::RoleMismatch {
            operation: op.tag().to_string(),
            expected,
            found: caller.role,
        }),
        _ => Ok(()),
    }
}

/// What a region decided to do with the current caller.
#[derive(Debug)]
pub enum Outcome<R> {
    /// Reply right away; the caller leaves the region.
    Done(R),
    /// Park the caller in the operation's waiting room until a later request wakes it.
    Wait,
}

/// Why a region refused to apply a request.
#[derive(Debug, Error)]
pub enum RegionFault {
    /// Invalid input. The caller gets an error reply and the region carries on.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The region reached a state that should be unreachable. The region shuts down.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

/// Callers a region wants released at the end of the current request.
///
/// Regions never touch responders directly; they name `(room, caller)` pairs and the
/// server re-attaches each reply to the parked request of that logical caller.
pub struct Wakeups<R> {
    targeted: Vec<(&'static str, Caller, Result<R, ProtocolError>)>,
}

impl<R> Default for Wakeups<R> {
    fn default() -> Self {
        Self {
            targeted: Vec::new(),
        }
    }
}

impl<R> Wakeups<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases `caller` from `room` with `reply`.
    pub fn wake(&mut self, room: &'static str, caller: Caller, reply: R) {
        self.targeted.push((room, caller, Ok(reply)));
    }

    /// Releases `caller` from `room` with a protocol error.
    pub fn reject(&mut self, room: &'static str, caller: Caller, error: ProtocolError) {
        self.targeted.push((room, caller, Err(error)));
    }

    /// Releases each of `callers` from `room`, all with the same reply.
    ///
    /// Rooms are shared by every race, so the region names the callers it means.
    pub fn wake_all(
        &mut self,
        room: &'static str,
        callers: impl IntoIterator<Item = Caller>,
        reply: R,
    ) where
        R: Clone,
    {
        for caller in callers {
            self.targeted.push((room, caller, Ok(reply.clone())));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targeted.is_empty()
    }
}

/// The state machine behind one shared region.
///
/// `handle` runs with exclusive access to the region (the server processes one request at
/// a time) and must follow validate-then-commit: either it returns an error having changed
/// nothing, or it applies the whole effect. It never awaits, so a region never waits on
/// another region while it holds its own exclusion.
pub trait SharedRegion: Send + 'static {
    type Op: Operation;
    type Reply: Debug + Clone + Send + 'static;
    /// Run-time dependencies injected by [`RegionServer::run`].
    type Context: Send + Sync + 'static;

    fn handle(
        &mut self,
        caller: Caller,
        op: Self::Op,
        ctx: &Self::Context,
        wakeups: &mut Wakeups<Self::Reply>,
    ) -> Result<Outcome<Self::Reply>, RegionFault>;
}

// =============================================================================
// 2. MESSAGES & ERRORS
// =============================================================================

/// Errors seen by callers of a region.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FrameworkError {
    #[error("Region closed")]
    RegionClosed,
    #[error("Region dropped response channel")]
    RegionDropped,
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Invariant violated: {0}")]
    Invariant(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unexpected reply to {0}")]
    UnexpectedReply(String),
}

/// One-shot channel a parked or running request is answered on.
pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

/// A request as delivered to a region server.
pub struct RegionRequest<R: SharedRegion> {
    pub caller: Caller,
    pub op: R::Op,
    pub respond_to: Response<R::Reply>,
}

// =============================================================================
// 3. THE GENERIC REGION SERVER
// =============================================================================

/// Generic server owning one region's state.
///
/// **Concurrency Model**:
/// The server takes one request at a time from its channel, so at most one logical actor
/// is ever inside the region. A caller that has to wait is not kept inside: its responder
/// is parked in the [`WaitingRoom`] and the loop moves on to the next request.
pub struct RegionServer<R: SharedRegion> {
    receiver: mpsc::Receiver<RegionRequest<R>>,
    region: R,
    bounds: Bounds,
    waiting: WaitingRoom<R::Reply>,
    slot: MonitorSlot,
}

impl<R: SharedRegion> RegionServer<R> {
    /// Creates a server for `region` and the client used to reach it.
    pub fn new(region: R, bounds: Bounds, buffer_size: usize) -> (Self, RegionClient<R>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let server = Self {
            receiver,
            region,
            bounds,
            waiting: WaitingRoom::new(),
            slot: MonitorSlot::default(),
        };
        (server, RegionClient::new(sender))
    }

    /// Runs the server loop until every client is dropped or an invariant breaks.
    ///
    /// Parked callers still waiting when the loop ends have their responders dropped and
    /// observe [`FrameworkError::RegionDropped`].
    pub async fn run(mut self, context: R::Context) {
        let region = region_name::<R>();
        info!(region, "Region started");

        while let Some(request) = self.receiver.recv().await {
            if let Err(violation) = self.serve(request, &context) {
                error!(region, %violation, parked = self.waiting.len(), "Aborting region");
                break;
            }
        }

        info!(
            region,
            admitted = self.slot.admitted(),
            parked = self.waiting.len(),
            "Shutdown"
        );
    }

    fn serve(&mut self, request: RegionRequest<R>, context: &R::Context) -> Result<(), String> {
        let region = region_name::<R>();
        let RegionRequest {
            caller,
            op,
            respond_to,
        } = request;
        let room = op.tag();
        debug!(region, %caller, ?op, "Request");

        let admitted = check_role(&op, &caller)
            .and_then(|_| op.validate(&caller, &self.bounds))
            .and_then(|_| {
                if self.waiting.contains(room, &caller) {
                    Err(ProtocolError::AlreadyWaiting {
                        caller,
                        room: room.to_string(),
                    })
                } else {
                    Ok(())
                }
            });
        if let Err(e) = admitted {
            warn!(region, %caller, room, error = %e, "Rejected");
            let _ = respond_to.send(Err(e.into()));
            return Ok(());
        }

        self.slot.enter(caller)?;
        let mut wakeups = Wakeups::new();
        match self.region.handle(caller, op, context, &mut wakeups) {
            Ok(Outcome::Done(reply)) => {
                debug!(region, %caller, room, ?reply, "Done");
                let _ = respond_to.send(Ok(reply));
            }
            Ok(Outcome::Wait) => {
                debug!(region, %caller, room, "Parked");
                self.waiting.park(room, caller, respond_to);
            }
            Err(RegionFault::Protocol(e)) => {
                warn!(region, %caller, room, error = %e, "Rejected");
                let _ = respond_to.send(Err(e.into()));
            }
            Err(RegionFault::Invariant(violation)) => {
                let _ = respond_to.send(Err(FrameworkError::Invariant(violation.clone())));
                return Err(violation);
            }
        }
        self.release(wakeups)?;
        self.slot.exit(caller)
    }

    fn release(&mut self, wakeups: Wakeups<R::Reply>) -> Result<(), String> {
        let region = region_name::<R>();
        for (room, caller, reply) in wakeups.targeted {
            let Some(respond_to) = self.waiting.take(room, &caller) else {
                return Err(format!("{caller} released from {room} without waiting there"));
            };
            debug!(region, %caller, room, ok = reply.is_ok(), "Released");
            let _ = respond_to.send(reply.map_err(FrameworkError::from));
        }
        Ok(())
    }
}

/// Short type name of a region, e.g. `Paddock`.
fn region_name<R>() -> &'static str {
    std::any::type_name::<R>()
        .split("::")
        .last()
        .unwrap_or("Unknown")
}

// =============================================================================
// 4. CLIENTS & PORTS
// =============================================================================

/// The calling convention every region handle offers, local or remote.
#[async_trait]
pub trait RegionPort<R: SharedRegion>: Send + Sync {
    async fn call(&self, caller: Caller, op: R::Op) -> Result<R::Reply, FrameworkError>;
}

/// In-process handle to a [`RegionServer`]. Cheap to clone.
pub struct RegionClient<R: SharedRegion> {
    sender: mpsc::Sender<RegionRequest<R>>,
}

impl<R: SharedRegion> Clone for RegionClient<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<R: SharedRegion> RegionClient<R> {
    pub fn new(sender: mpsc::Sender<RegionRequest<R>>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl<R: SharedRegion> RegionPort<R> for RegionClient<R> {
    async fn call(&self, caller: Caller, op: R::Op) -> Result<R::Reply, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(RegionRequest {
                caller,
                op,
                respond_to,
            })
            .await
            .map_err(|_| FrameworkError::RegionClosed)?;
        response.await.map_err(|_| FrameworkError::RegionDropped)?
    }
}

// =============================================================================
// 5. EXAMPLE USAGE (Test)
// =============================================================================
