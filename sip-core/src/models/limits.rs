use serde::{Deserialize, Serialize};

/// Physical delivery limits for one unit in one settlement period.
///
/// All values are MWh-equivalent over the half-hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalLimits {
    /// Scheduled energy delivery (physical notification).
    pub pn: f64,
    /// Maximum export limit: a ceiling on deliverable energy.
    pub mels: f64,
    /// Maximum import limit: a floor on deliverable energy.
    pub mils: f64,
}
