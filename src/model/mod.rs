//! Plain data shared by regions, actors and the wire: ids, actor contexts,
//! lifecycle states, race results, bets and protocol errors.

pub mod bet;
pub mod broker;
pub mod error;
pub mod horse;
pub mod ids;
pub mod race;
pub mod spectator;

pub use bet::*;
pub use broker::*;
pub use error::*;
pub use horse::*;
pub use ids::*;
pub use race::*;
pub use spectator::*;
