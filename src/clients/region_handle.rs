//! # RegionHandle Trait
//!
//! Common plumbing for the per-region clients: every client wraps an
//! `Arc<dyn RegionPort<R>>`, so the same client works against an in-process region server
//! or a remote one behind the access adapter.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use crate::framework::{FrameworkError, RegionPort, SharedRegion};
use crate::model::Caller;

/// Shared port type held by every client.
pub type Port<R> = Arc<dyn RegionPort<R>>;

#[async_trait]
pub trait RegionHandle<R: SharedRegion>: Send + Sync {
    fn port(&self) -> &Port<R>;

    /// Sends `op` on behalf of `caller` and waits for the reply.
    async fn request(&self, caller: Caller, op: R::Op) -> Result<R::Reply, FrameworkError> {
        let reply = self.port().call(caller, op).await?;
        debug!(%caller, ?reply, "Reply");
        Ok(reply)
    }
}

/// Error for a reply that does not belong to the operation that was sent.
pub fn unexpected(operation: &str, reply: impl Debug) -> FrameworkError {
    FrameworkError::UnexpectedReply(format!("{operation}: {reply:?}"))
}
