use crate::Map;
use sip_core::models::{BidOfferPair, PairId, PhysicalLimits, UnitId};

/// A balancing unit's tradable position for one settlement period.
///
/// Owns the unit's submitted bid/offer pairs, the volume already accepted
/// against each pair, and the unit's physical limits. The remaining tradable
/// volume per pair is derived once at construction and read-only thereafter;
/// a unit is built fresh for each (unit, period) quota-matching pass and
/// discarded afterwards.
#[derive(Debug)]
pub struct BalancingUnit {
    unit: UnitId,
    pairs: Map<PairId, BidOfferPair>,
    remaining_volume_by_pair: Map<PairId, f64>,
}

impl BalancingUnit {
    /// Build a unit from its submitted pairs, the factual accepted volume per
    /// pair, and its physical limits for the period.
    ///
    /// Pairs absent from the factual map count as unused. `level_from` is a
    /// full-period MW figure, so each pair contributes half of it in MWh over
    /// the half-hour.
    pub fn new(
        unit: UnitId,
        pairs: impl IntoIterator<Item = BidOfferPair>,
        factual_volume_by_pair: &Map<PairId, f64>,
        limits: PhysicalLimits,
    ) -> Self {
        let pairs: Map<PairId, BidOfferPair> = pairs
            .into_iter()
            .map(|pair| (pair.pair, pair))
            .collect();
        let remaining_volume_by_pair =
            remaining_volumes(&pairs, factual_volume_by_pair, limits);
        Self {
            unit,
            pairs,
            remaining_volume_by_pair,
        }
    }

    /// The unit's id.
    pub fn unit(&self) -> &UnitId {
        &self.unit
    }

    /// The submitted pair, if the unit submitted it this period.
    pub fn pair(&self, pair: PairId) -> Option<&BidOfferPair> {
        self.pairs.get(&pair)
    }

    /// Remaining tradable volume for a pair, MWh. Non-negative for offers,
    /// non-positive for bids; zero for pairs the unit did not submit.
    pub fn remaining_volume(&self, pair: PairId) -> f64 {
        self.remaining_volume_by_pair
            .get(&pair)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Derive each pair's remaining headroom, respecting MELS and MILS.
///
/// Offers are walked in ascending pair order from zero, bids in descending
/// order by absolute value. Energy already deliverable by cheaper pairs plus
/// the scheduled delivery counts against the physical limit before this
/// pair's own half-period volume does.
fn remaining_volumes(
    pairs: &Map<PairId, BidOfferPair>,
    factual_volume_by_pair: &Map<PairId, f64>,
    limits: PhysicalLimits,
) -> Map<PairId, f64> {
    let mut remaining = Map::default();

    let mut offer_ids: Vec<PairId> = pairs.keys().copied().filter(PairId::is_offer).collect();
    offer_ids.sort();
    let mut bid_ids: Vec<PairId> = pairs.keys().copied().filter(PairId::is_bid).collect();
    bid_ids.sort();
    bid_ids.reverse();

    let half_level = |id: &PairId| pairs[id].level_from / 2.0;
    let used = |id: &PairId| factual_volume_by_pair.get(id).copied().unwrap_or(0.0);

    for (index, id) in offer_ids.iter().enumerate() {
        let from_previous_offers: f64 = offer_ids[..index].iter().map(half_level).sum();
        let available_this_offer = half_level(id);
        // Factual usage of this pair and every cheaper one counts against
        // the physical limit.
        let used_so_far: f64 = offer_ids[..=index].iter().map(used).sum();

        let delivered = from_previous_offers + limits.pn;
        let stated_deliverable = delivered + available_this_offer;
        let physically_deliverable = stated_deliverable.min(limits.mels);

        let available = (physically_deliverable - (used_so_far + delivered)).max(0.0);
        remaining.insert(*id, available);
    }

    for (index, id) in bid_ids.iter().enumerate() {
        let from_previous_bids: f64 = bid_ids[..index].iter().map(half_level).sum();
        let available_this_bid = half_level(id);
        let used_so_far: f64 = bid_ids[..=index].iter().map(used).sum();

        let delivered = from_previous_bids + limits.pn;
        let stated_deliverable = delivered + available_this_bid;
        let physically_deliverable = stated_deliverable.max(limits.mils);

        let available = (physically_deliverable - (used_so_far + delivered)).min(0.0);
        remaining.insert(*id, available);
    }

    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(id: i32, bid: f64, offer: f64, level_from: f64) -> BidOfferPair {
        BidOfferPair {
            unit: UnitId::from("T_TEST-1"),
            pair: PairId::new(id),
            bid_price: bid,
            offer_price: offer,
            level_from,
        }
    }

    fn unit(
        pairs: Vec<BidOfferPair>,
        factual: &[(i32, f64)],
        limits: PhysicalLimits,
    ) -> BalancingUnit {
        let factual: Map<PairId, f64> = factual
            .iter()
            .map(|(id, volume)| (PairId::new(*id), *volume))
            .collect();
        BalancingUnit::new(UnitId::from("T_TEST-1"), pairs, &factual, limits)
    }

    #[test]
    fn export_ceiling_caps_second_offer() {
        // Two 5 MWh offer pairs against a 10 MWh export ceiling: once the
        // first pair is fully used, the second has no headroom left.
        let limits = PhysicalLimits {
            pn: 0.0,
            mels: 10.0,
            mils: -10.0,
        };
        let pairs = vec![pair(1, 10.0, 20.0, 10.0), pair(2, 5.0, 40.0, 10.0)];
        let u = unit(pairs, &[(1, 5.0)], limits);
        assert_eq!(u.remaining_volume(PairId::new(1)), 0.0);
        assert_eq!(u.remaining_volume(PairId::new(2)), 0.0);
    }

    #[test]
    fn unused_offers_keep_their_half_period_volume() {
        let limits = PhysicalLimits {
            pn: 0.0,
            mels: 10.0,
            mils: -10.0,
        };
        let pairs = vec![pair(1, 10.0, 20.0, 10.0), pair(2, 5.0, 40.0, 10.0)];
        let u = unit(pairs, &[], limits);
        assert_eq!(u.remaining_volume(PairId::new(1)), 5.0);
        assert_eq!(u.remaining_volume(PairId::new(2)), 5.0);
    }

    #[test]
    fn import_floor_limits_bids() {
        // Mirror of the export case: bids walk downward toward MILS.
        let limits = PhysicalLimits {
            pn: 0.0,
            mels: 10.0,
            mils: -4.0,
        };
        let pairs = vec![pair(-1, 15.0, 30.0, -6.0), pair(-2, 5.0, 40.0, -6.0)];
        let u = unit(pairs, &[], limits);
        // First bid: stated -3.0 is within the -4.0 floor.
        assert_eq!(u.remaining_volume(PairId::new(-1)), -3.0);
        // Second bid: -3.0 already deliverable, floor leaves only -1.0 more.
        assert_eq!(u.remaining_volume(PairId::new(-2)), -1.0);
    }

    #[test]
    fn unsubmitted_pairs_have_no_volume() {
        let limits = PhysicalLimits {
            pn: 0.0,
            mels: 10.0,
            mils: -10.0,
        };
        let u = unit(vec![pair(1, 10.0, 20.0, 10.0)], &[], limits);
        assert_eq!(u.remaining_volume(PairId::new(2)), 0.0);
        assert!(u.pair(PairId::new(2)).is_none());
    }
}
