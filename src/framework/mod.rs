//! Generic monitor framework for shared regions.
//!
//! A shared region is a state machine implementing [`SharedRegion`], hosted by a
//! [`RegionServer`] task. Callers reach it through any [`RegionPort`]: the in-process
//! [`RegionClient`] or a remote port from the access adapter.
//!
//! # Main Components
//!
//! - [`SharedRegion`] / [`Operation`] - what a region and its requests implement
//! - [`RegionServer`] - sequential request loop, the region's critical section
//! - [`WaitingRoom`] / [`MonitorSlot`] - parked callers and the caller inside
//! - [`Rendezvous`] - reusable n-of-n barrier
//! - [`FrameworkError`] - common error types
//!
//! # Testing
//!
//! See [`mock`] module for utilities to test clients and actors without running regions.

pub mod core;
pub mod mock;
pub mod waiting;

pub use self::core::*;
pub use waiting::{Arrival, MonitorSlot, Rendezvous, RendezvousError, WaitingRoom};
