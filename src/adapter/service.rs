use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::envelope::{Envelope, WireReply};
use crate::config::Bounds;
use crate::framework::{check_role, FrameworkError, Operation, RegionPort, SharedRegion};
use crate::model::{Caller, ProtocolError};

/// The access boundary in front of one region.
///
/// Checks the declared ids and the caller's role before anything is forwarded, so a
/// request that names an unknown race, horse or spectator never reaches region logic.
pub struct RegionService<R: SharedRegion> {
    bounds: Bounds,
    inner: Arc<dyn RegionPort<R>>,
}

impl<R: SharedRegion> RegionService<R> {
    pub fn new(bounds: Bounds, inner: Arc<dyn RegionPort<R>>) -> Self {
        Self { bounds, inner }
    }

    pub fn admit(&self, caller: &Caller, op: &R::Op) -> Result<(), ProtocolError> {
        check_role(op, caller)?;
        op.validate(caller, &self.bounds)
    }

    /// Answers one decoded envelope.
    pub async fn handle(&self, envelope: Envelope<R::Op>) -> WireReply<R::Reply> {
        let Envelope { caller, op } = envelope;
        self.call(caller, op).await.into()
    }
}

#[async_trait]
impl<R: SharedRegion> RegionPort<R> for RegionService<R> {
    async fn call(&self, caller: Caller, op: R::Op) -> Result<R::Reply, FrameworkError> {
        if let Err(e) = self.admit(&caller, &op) {
            warn!(%caller, op = op.tag(), error = %e, "Rejected at the boundary");
            return Err(e.into());
        }
        debug!(%caller, op = op.tag(), "Forwarding");
        self.inner.call(caller, op).await
    }
}
