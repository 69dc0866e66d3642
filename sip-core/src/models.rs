mod action;
mod datetime;
mod imbalance;
mod limits;
mod pair;
mod params;
mod price;
mod stack;

pub use action::{BalancingAction, Direction, PairId, UnitId};
pub use datetime::{ParseError, SettlementDate, SettlementKey, SettlementPeriod};
pub use imbalance::ImbalanceRecord;
pub use limits::PhysicalLimits;
pub use pair::BidOfferPair;
pub use params::PriceParameters;
pub use price::{PriceReference, TlmTable};
pub use stack::SettlementStack;

/// A hash map with deterministic iteration order.
///
/// Reproducible results across runs require predictable ordering, so the
/// engine uses `indexmap` rather than `std::collections::HashMap` throughout.
pub type Map<K, V> = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;

/// A hash set with deterministic iteration order.
pub type Set<T> = indexmap::IndexSet<T, rustc_hash::FxBuildHasher>;
