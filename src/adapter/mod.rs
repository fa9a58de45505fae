//! # Access Adapter
//!
//! Exposes any shared region as an independent service. Callers are stateless: every
//! request is an [`Envelope`] holding the declared caller and the full typed operation,
//! and the service re-checks both against the configured [`Bounds`](crate::config::Bounds)
//! before forwarding to the region server. Mutual exclusion and waiting stay where they
//! are in-process, inside the [`RegionServer`](crate::framework::RegionServer) loop.

pub mod envelope;
pub mod service;
pub mod transport;

pub use envelope::{Envelope, WireReply};
pub use service::RegionService;
pub use transport::{serve, TcpPort};
