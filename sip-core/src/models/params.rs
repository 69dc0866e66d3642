use serde::{Deserialize, Serialize};

/// Tuning constants for the price derivation methodology.
///
/// The defaults reproduce the current settlement rules; tests and historical
/// reruns can widen the thresholds to disable a stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceParameters {
    /// Volume below which an acceptance is de-minimis tagged, MWh.
    pub de_minimis_volume: f64,
    /// Volume of the most extreme actions retained to set the final price
    /// (price average reference volume), MWh.
    pub par_volume: f64,
    /// Volume of unflagged actions averaged into the replacement price, MWh.
    pub rpar_volume: f64,
}

impl Default for PriceParameters {
    fn default() -> Self {
        Self {
            de_minimis_volume: 0.1,
            par_volume: 1.0,
            rpar_volume: 1.0,
        }
    }
}
