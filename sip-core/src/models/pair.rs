use super::{PairId, UnitId};
use serde::{Deserialize, Serialize};

/// One bid/offer pair submitted by a unit for a settlement period.
///
/// A unit submits each pair at most once per period; the submission is
/// immutable for that period. `level_from` expresses the pair's full-period
/// MW level — a half-hour acceptance against the pair can deliver at most
/// half of it in MWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidOfferPair {
    /// The submitting unit.
    pub unit: UnitId,
    /// The pair id; sign gives the direction.
    pub pair: PairId,
    /// Price at which the unit will reduce delivery, £/MWh.
    pub bid_price: f64,
    /// Price at which the unit will increase delivery, £/MWh.
    pub offer_price: f64,
    /// Full-period MW level the pair is submitted from.
    pub level_from: f64,
}
