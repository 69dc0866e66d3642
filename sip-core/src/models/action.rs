use serde::{Deserialize, Serialize};

/// Identifier of a balancing mechanism unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Create a unit id from its external string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The external string form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a bid/offer pair within a unit's submission.
///
/// Pair ids are nonzero: positive ids are offers, negative ids are bids.
/// Offers count upward from 1 in increasing price order, bids downward from
/// -1 in decreasing price order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairId(i32);

impl PairId {
    /// Wrap a raw pair id.
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// The raw numeric id.
    pub fn get(&self) -> i32 {
        self.0
    }

    /// The trade direction implied by the id's sign.
    pub fn direction(&self) -> Direction {
        if self.0 < 0 { Direction::Bid } else { Direction::Offer }
    }

    /// Whether this is an offer (positive) pair.
    pub fn is_offer(&self) -> bool {
        self.0 > 0
    }

    /// Whether this is a bid (negative) pair.
    pub fn is_bid(&self) -> bool {
        self.0 < 0
    }
}

impl From<i32> for PairId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// The direction of a balancing action.
///
/// The system buys energy (accepts offers) when it is short and sells energy
/// (accepts bids) when it is long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// An offer to increase delivered energy; volumes are non-negative.
    Offer,
    /// A bid to decrease delivered energy; volumes are non-positive.
    Bid,
}

impl Direction {
    /// The sign convention for volumes in this direction.
    pub fn sign(self) -> f64 {
        match self {
            Self::Offer => 1.0,
            Self::Bid => -1.0,
        }
    }
}

/// One accepted balancing action: a row of a settlement stack.
///
/// Invariant: the sign of `pair` always matches the sign of `volume` —
/// offers carry non-negative volume, bids non-positive volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingAction {
    /// The unit the action was accepted from.
    pub unit: UnitId,
    /// The bid/offer pair the acceptance was made against.
    pub pair: PairId,
    /// Whether the action was taken for system (non-energy) reasons.
    pub so_flag: bool,
    /// Whether the action is a constraint-deloading acceptance, excluded
    /// from first-stage price-setting eligibility.
    pub cadl_flag: bool,
    /// The price submitted for the pair, £/MWh. May be NaN where the
    /// reporting system supplied no price.
    pub price: f64,
    /// The accepted volume, MWh. Sign matches the pair id sign.
    pub volume: f64,
}

impl BalancingAction {
    /// The trade direction of the action.
    pub fn direction(&self) -> Direction {
        self.pair.direction()
    }
}
