//! # Hippodrome
//!
//! > **An afternoon at the races, as concurrent actors and shared regions.**
//!
//! A broker, a field of horse/jockey pairs and a crowd of spectators move through a
//! fixed sequence of races. They never talk to each other directly: every interaction
//! goes through one of the shared regions (stable, paddock, racing track, betting centre,
//! control centre), and every lifecycle change lands in the general repository.
//!
//! ## Design
//!
//! ### Regions are monitors
//! Each region is a plain state machine implementing [`SharedRegion`](framework::SharedRegion).
//! A generic [`RegionServer`](framework::RegionServer) owns it in its own Tokio task and
//! takes one request at a time, so region logic never needs a lock. When an operation has
//! to wait (a barrier, a rendezvous, a flag), the caller's responder is parked and the
//! server moves on; the request that satisfies the condition releases it.
//!
//! ### Callers carry their own context
//! There is no ambient "current thread" identity. Every call names its [`Caller`](model::Caller)
//! and passes the actor's context (agility, race assignment, wallet, strategy) as part of
//! the typed operation. The same actors therefore run against local regions or against
//! regions served over TCP by the [`adapter`].
//!
//! ### Errors
//! - Protocol errors (unknown ids, wrong role, bets after the window closed) are rejected
//!   before any state changes and end the caller's run.
//! - Invariant violations abort the region; the run fails.
//! - Waiting is never an error.
//!
//! ## Module Tour
//!
//! | Module | Role |
//! |---|---|
//! | [`framework`] | region server, waiting room, rendezvous, ports, mocks |
//! | [`model`] | ids, contexts, lifecycle states, results, bets, protocol errors |
//! | [`config`] | event constants, TOML loading, id bounds |
//! | [`repository`] | append-only state log |
//! | [`stable`], [`paddock`], [`racing_track`], [`betting_centre`], [`control_centre`] | the shared regions |
//! | [`clients`] | typed per-region clients |
//! | [`actors`] | broker, horse, spectator |
//! | [`adapter`] | access boundary and TCP transport |
//! | [`runtime`] | starting, running and stopping an event |
//!
//! ## Quick Start
//!
//! ```bash
//! # One afternoon, every region in-process
//! RUST_LOG=hippodrome=info cargo run -- run --seed 7
//!
//! # Same afternoon, every region behind its own loopback TCP service
//! cargo run -- run --seed 7 --distributed
//! ```

pub mod actors;
pub mod adapter;
pub mod betting_centre;
pub mod clients;
pub mod config;
pub mod control_centre;
pub mod framework;
pub mod model;
pub mod paddock;
pub mod racing_track;
pub mod repository;
pub mod runtime;
pub mod stable;
