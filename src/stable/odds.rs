//! Odds for a race lineup.

/// Turns the agilities of a lineup (by horse index) into one odds value per horse.
///
/// Implementations must be deterministic: the stable computes odds once per race and
/// serves the cached values afterwards.
pub trait OddsPolicy: Send + Sync {
    fn odds(&self, agilities: &[u32]) -> Vec<f64>;
}

/// `odds_i = Σ agility / agility_i`: the more agile the horse, the shorter its odds.
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseAgility;

impl OddsPolicy for InverseAgility {
    fn odds(&self, agilities: &[u32]) -> Vec<f64> {
        let total: u32 = agilities.iter().sum();
        agilities
            .iter()
            .map(|&agility| f64::from(total) / f64::from(agility.max(1)))
            .collect()
    }
}
