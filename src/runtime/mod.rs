//! Runtime orchestration and lifecycle management.
//!
//! - [`Hippodrome`] - starts the regions (in-process, behind loopback TCP, or remote),
//!   runs the actor cast and shuts everything down
//! - [`serve_region`] - one region as a standalone TCP service
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure

pub mod system;
pub mod tracing;

pub use self::system::*;
pub use self::tracing::setup_tracing;
