//! Typed clients, one per shared region.
//!
//! Actors hold only the clients for the regions they visit. Each client turns a typed
//! reply back into plain values and reports a mismatched reply as
//! [`FrameworkError::UnexpectedReply`](crate::framework::FrameworkError::UnexpectedReply).

pub mod betting_client;
pub mod control_client;
pub mod paddock_client;
pub mod region_handle;
pub mod stable_client;
pub mod track_client;

pub use betting_client::{BettingClient, Gains, PlacedBet};
pub use control_client::ControlClient;
pub use paddock_client::PaddockClient;
pub use region_handle::{Port, RegionHandle};
pub use stable_client::StableClient;
pub use track_client::TrackClient;
