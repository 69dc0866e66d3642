use crate::Map;
use crate::pricing::dmat_adjusted;
use sip_core::models::{
    BalancingAction, BidOfferPair, Direction, PairId, PriceParameters, SettlementStack, UnitId,
};

/// The accepted action that anchors where a quota walk resumes.
#[derive(Debug, Clone, PartialEq)]
pub enum MarginalAction {
    /// No unflagged action with usable volume exists: the system was balanced
    /// entirely by system-operator actions, so acceptance resumes from the
    /// start of merit order.
    MeritOrderStart(Direction),
    /// The marginal previously-accepted action.
    Accepted {
        /// The unit the marginal action was accepted from.
        unit: UnitId,
        /// The pair it was accepted against.
        pair: PairId,
        /// Its accepted price.
        price: f64,
    },
}

/// Rank a raw pair table's offers ascending by (offer price, pair id).
pub fn offer_stack(table: &[BidOfferPair]) -> Vec<BidOfferPair> {
    let mut offers: Vec<BidOfferPair> = table
        .iter()
        .filter(|row| row.pair.is_offer())
        .cloned()
        .collect();
    offers.sort_by(|a, b| {
        a.offer_price
            .total_cmp(&b.offer_price)
            .then_with(|| a.pair.cmp(&b.pair))
    });
    offers
}

/// Rank a raw pair table's bids descending by (bid price, pair id).
pub fn bid_stack(table: &[BidOfferPair]) -> Vec<BidOfferPair> {
    let mut bids: Vec<BidOfferPair> = table
        .iter()
        .filter(|row| row.pair.is_bid())
        .cloned()
        .collect();
    bids.sort_by(|a, b| {
        b.bid_price
            .total_cmp(&a.bid_price)
            .then_with(|| b.pair.cmp(&a.pair))
    });
    bids
}

/// Find the marginal action of the existing stack in the given direction.
///
/// Scans unflagged (non-SO) actions of the direction's side: offers from the
/// most expensive backward, bids from the cheapest forward, looking for the
/// first with nonzero de-minimis-adjusted volume.
pub fn marginal_action(
    stack: &SettlementStack,
    direction: Direction,
    params: &PriceParameters,
) -> MarginalAction {
    let side: Vec<&BalancingAction> = stack
        .actions()
        .iter()
        .filter(|action| !action.so_flag && action.pair.direction() == direction)
        .collect();

    // The de-minimis rule needs each action's same-(unit, pair) total.
    let mut totals: Map<(UnitId, PairId), f64> = Map::default();
    for action in &side {
        *totals
            .entry((action.unit.clone(), action.pair))
            .or_insert(0.0) += action.volume;
    }
    let is_usable = |action: &BalancingAction| {
        let total = totals[&(action.unit.clone(), action.pair)];
        let adjusted = dmat_adjusted(action.volume, total, params.de_minimis_volume, direction);
        match direction {
            Direction::Offer => adjusted > 0.0,
            Direction::Bid => adjusted < 0.0,
        }
    };

    // The stack is ascending by price, so offers scan from the tail and bids
    // from the head.
    let marginal = match direction {
        Direction::Offer => side.iter().rev().find(|action| is_usable(action)).copied(),
        Direction::Bid => side.iter().find(|action| is_usable(action)).copied(),
    };

    match marginal {
        Some(action) => MarginalAction::Accepted {
            unit: action.unit.clone(),
            pair: action.pair,
            price: action.price,
        },
        None => MarginalAction::MeritOrderStart(direction),
    }
}

/// Resolve a marginal action to its row in the ranked pair table.
///
/// An exact (unit, pair) match wins. If the marginal unit submitted no
/// matching pair this period, the row priced closest-but-worse than the
/// marginal accepted price stands in for it — the next cheapest available
/// action in the walk direction. `None` means no such row exists and the
/// quota walk has nowhere to resume.
pub fn locate_marginal_index(
    marginal: &MarginalAction,
    ranked: &[BidOfferPair],
    direction: Direction,
) -> Option<usize> {
    let (unit, pair, price) = match marginal {
        MarginalAction::MeritOrderStart(_) => return Some(0),
        MarginalAction::Accepted { unit, pair, price } => (unit, *pair, *price),
    };

    if let Some(index) = ranked
        .iter()
        .position(|row| row.unit == *unit && row.pair == pair)
    {
        return Some(index);
    }

    match direction {
        Direction::Offer => ranked
            .iter()
            .enumerate()
            .filter(|(_, row)| row.offer_price > price)
            .min_by(|(_, a), (_, b)| a.offer_price.total_cmp(&b.offer_price))
            .map(|(index, _)| index),
        Direction::Bid => ranked
            .iter()
            .enumerate()
            .filter(|(_, row)| row.bid_price < price)
            .max_by(|(_, a), (_, b)| a.bid_price.total_cmp(&b.bid_price))
            .map(|(index, _)| index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(unit: &str, pair: i32, price: f64, volume: f64, so_flag: bool) -> BalancingAction {
        BalancingAction {
            unit: UnitId::from(unit),
            pair: PairId::new(pair),
            so_flag,
            cadl_flag: false,
            price,
            volume,
        }
    }

    fn row(unit: &str, pair: i32, bid: f64, offer: f64) -> BidOfferPair {
        BidOfferPair {
            unit: UnitId::from(unit),
            pair: PairId::new(pair),
            bid_price: bid,
            offer_price: offer,
            level_from: 10.0,
        }
    }

    #[test]
    fn offer_stack_orders_by_price_then_pair() {
        let table = vec![
            row("A", 2, 5.0, 40.0),
            row("B", 1, 5.0, 20.0),
            row("C", 1, 5.0, 40.0),
            row("D", -1, 5.0, 30.0),
        ];
        let ranked = offer_stack(&table);
        let prices: Vec<f64> = ranked.iter().map(|r| r.offer_price).collect();
        assert_eq!(prices, vec![20.0, 40.0, 40.0]);
        // Tie at 40.0 broken by pair id.
        assert_eq!(ranked[1].pair, PairId::new(1));
        assert_eq!(ranked[2].pair, PairId::new(2));
    }

    #[test]
    fn bid_stack_orders_descending() {
        let table = vec![
            row("A", -1, 15.0, 40.0),
            row("B", -2, 25.0, 40.0),
            row("C", 1, 5.0, 20.0),
        ];
        let ranked = bid_stack(&table);
        let prices: Vec<f64> = ranked.iter().map(|r| r.bid_price).collect();
        assert_eq!(prices, vec![25.0, 15.0]);
    }

    #[test]
    fn marginal_offer_is_most_expensive_unflagged() {
        let stack = SettlementStack::new(vec![
            action("A", 1, 20.0, 5.0, false),
            action("B", 1, 40.0, 5.0, false),
            action("C", 1, 90.0, 5.0, true),
        ]);
        let marginal = marginal_action(&stack, Direction::Offer, &PriceParameters::default());
        assert_eq!(
            marginal,
            MarginalAction::Accepted {
                unit: UnitId::from("B"),
                pair: PairId::new(1),
                price: 40.0
            }
        );
    }

    #[test]
    fn de_minimis_volume_cannot_be_marginal() {
        let stack = SettlementStack::new(vec![
            action("A", 1, 20.0, 5.0, false),
            action("B", 1, 40.0, 0.05, false),
        ]);
        let marginal = marginal_action(&stack, Direction::Offer, &PriceParameters::default());
        assert_eq!(
            marginal,
            MarginalAction::Accepted {
                unit: UnitId::from("A"),
                pair: PairId::new(1),
                price: 20.0
            }
        );
    }

    #[test]
    fn fully_so_flagged_stack_restarts_merit_order() {
        let stack = SettlementStack::new(vec![action("A", 1, 20.0, 5.0, true)]);
        let marginal = marginal_action(&stack, Direction::Offer, &PriceParameters::default());
        assert_eq!(marginal, MarginalAction::MeritOrderStart(Direction::Offer));
        let table = vec![row("A", 1, 5.0, 20.0)];
        let ranked = offer_stack(&table);
        assert_eq!(
            locate_marginal_index(&marginal, &ranked, Direction::Offer),
            Some(0)
        );
    }

    #[test]
    fn missing_pair_falls_back_to_closest_worse_price() {
        let marginal = MarginalAction::Accepted {
            unit: UnitId::from("GONE"),
            pair: PairId::new(1),
            price: 25.0,
        };
        let ranked = offer_stack(&[
            row("A", 1, 5.0, 20.0),
            row("B", 1, 5.0, 30.0),
            row("C", 1, 5.0, 45.0),
        ]);
        // Closest offer strictly above 25.0 is B at 30.0.
        assert_eq!(
            locate_marginal_index(&marginal, &ranked, Direction::Offer),
            Some(1)
        );

        let marginal = MarginalAction::Accepted {
            unit: UnitId::from("GONE"),
            pair: PairId::new(-1),
            price: 12.0,
        };
        let ranked = bid_stack(&[
            row("A", -1, 15.0, 40.0),
            row("B", -1, 10.0, 40.0),
            row("C", -1, 2.0, 40.0),
        ]);
        // Closest bid strictly below 12.0 is B at 10.0.
        assert_eq!(
            locate_marginal_index(&marginal, &ranked, Direction::Bid),
            Some(1)
        );
    }

    #[test]
    fn no_worse_priced_row_yields_none() {
        let marginal = MarginalAction::Accepted {
            unit: UnitId::from("GONE"),
            pair: PairId::new(1),
            price: 100.0,
        };
        let ranked = offer_stack(&[row("A", 1, 5.0, 20.0)]);
        assert_eq!(locate_marginal_index(&marginal, &ranked, Direction::Offer), None);
    }
}
