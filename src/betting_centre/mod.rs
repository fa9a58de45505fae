//! # Betting Centre
//!
//! Bet lifecycle for every race: the broker opens the window, each spectator places one
//! bet (debited from the wallet at once), the window closes when everyone has bet, the
//! broker settles the book against the winner set, and spectators collect their gains.
//!
//! Ordering enforced per race:
//! - no bet is taken once the window has closed,
//! - settlement only runs on a closed window,
//! - gains are only paid after settlement, at most once per bet.

pub mod ops;
pub mod policy;
pub mod region;

pub use ops::{BettingOp, BettingReply};
pub use policy::{BetPolicy, StrategyBook};
pub use region::{payout, BettingCentre, Phase};
