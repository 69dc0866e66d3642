use serde::{Deserialize, Serialize};

/// The factual and counterfactual net imbalance volumes for one period.
///
/// The counterfactual is the factual volume with the studied cohort's net
/// position removed. The pair of signs determines which quota-matching
/// branch applies when the settlement stack is revised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceRecord {
    /// Net imbalance volume as settled, MWh.
    pub factual: f64,
    /// Net imbalance volume under the counterfactual, MWh.
    pub counterfactual: f64,
}
