//! How spectators pick a horse and a stake.

use crate::model::{HorseIdx, SpectatorContext};

/// Maps a spectator and the race odds (by horse index) to `(horse index, stake)`.
///
/// The betting centre still checks the choice: an index outside the lineup or a stake
/// above the wallet is rejected, never coerced.
pub trait BetPolicy: Send + Sync {
    fn choose(&self, spectator: &SpectatorContext, odds: &[f64]) -> (HorseIdx, u64);
}

/// Default policy, keyed by the spectator's strategy id modulo 4.
///
/// | strategy % 4 | horse | stake |
/// |---|---|---|
/// | 0 | favourite (shortest odds) | whole wallet |
/// | 1 | longest shot | half the wallet |
/// | 2 | favourite | a quarter of the wallet |
/// | 3 | spectator id % field size | half the wallet |
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyBook;

impl BetPolicy for StrategyBook {
    fn choose(&self, spectator: &SpectatorContext, odds: &[f64]) -> (HorseIdx, u64) {
        let wallet = spectator.wallet;
        match spectator.strategy % 4 {
            0 => (favourite(odds), wallet),
            1 => (longest_shot(odds), wallet / 2),
            2 => (favourite(odds), wallet / 4),
            _ => (spectator.id % odds.len().max(1) as u32, wallet / 2),
        }
    }
}

/// Index of the shortest odds; the lowest index wins ties.
pub fn favourite(odds: &[f64]) -> HorseIdx {
    odds.iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (idx, &o)| {
            if o < best.1 {
                (idx, o)
            } else {
                best
            }
        })
        .0 as HorseIdx
}

/// Index of the longest odds; the lowest index wins ties.
pub fn longest_shot(odds: &[f64]) -> HorseIdx {
    odds.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (idx, &o)| {
            if o > best.1 {
                (idx, o)
            } else {
                best
            }
        })
        .0 as HorseIdx
}
