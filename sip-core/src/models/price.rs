use super::{Map, UnitId};
use serde::{Deserialize, Serialize};

/// Per-period reference prices used by the price derivation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceReference {
    /// Volume-weighted market index price for the period, £/MWh. Used as the
    /// conservative fallback whenever the stack cannot set a price.
    pub market_index_price: f64,
    /// Buy-price adjustment, applied when the counterfactual imbalance is
    /// positive. Reported sparsely; absent means zero.
    pub buy_price_adjustment: Option<f64>,
    /// Sell-price adjustment, applied when the counterfactual imbalance is
    /// non-positive. Reported sparsely; absent means zero.
    pub sell_price_adjustment: Option<f64>,
}

impl PriceReference {
    /// The price adjustment for a period with the given counterfactual
    /// net imbalance volume, defaulting to zero where none was reported.
    pub fn adjustment(&self, counterfactual_niv: f64) -> f64 {
        let adjustment = if counterfactual_niv > 0.0 {
            self.buy_price_adjustment
        } else {
            self.sell_price_adjustment
        };
        adjustment.unwrap_or(0.0)
    }
}

/// Transmission loss multipliers by unit.
///
/// Units absent from the table take a multiplier of 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TlmTable(Map<UnitId, f64>);

impl TlmTable {
    /// Build a table from (unit, multiplier) entries.
    pub fn new(entries: impl IntoIterator<Item = (UnitId, f64)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// The loss multiplier for a unit, 1.0 if the unit is not listed.
    pub fn multiplier_for(&self, unit: &UnitId) -> f64 {
        self.0.get(unit).copied().unwrap_or(1.0)
    }
}

impl FromIterator<(UnitId, f64)> for TlmTable {
    fn from_iter<T: IntoIterator<Item = (UnitId, f64)>>(iter: T) -> Self {
        Self::new(iter)
    }
}
