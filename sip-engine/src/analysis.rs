use crate::{Map, Set};
use sip_core::models::{BalancingAction, SettlementKey, SettlementStack, UnitId};

/// The balancing cost of a period's stack, before and after recalculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalancingCosts {
    /// Σ price × volume over the original stack.
    pub original: f64,
    /// Σ price × volume over the revised stack.
    pub revised: f64,
}

/// Compare balancing costs between the original and revised stacks, period
/// by period. A period absent from (or empty in) either table costs zero on
/// that side.
pub fn balancing_costs(
    original: &Map<SettlementKey, SettlementStack>,
    revised: &Map<SettlementKey, SettlementStack>,
) -> Map<SettlementKey, BalancingCosts> {
    original
        .iter()
        .map(|(key, stack)| {
            let costs = BalancingCosts {
                original: stack.cost(),
                revised: revised.get(key).map(SettlementStack::cost).unwrap_or(0.0),
            };
            (*key, costs)
        })
        .collect()
}

/// The result of repricing subsidised units' negative-priced bids.
#[derive(Debug, Default)]
pub struct SubsidyRepricing {
    /// Stacks with the subsidised bids repriced to the default bid price.
    pub stacks: Map<SettlementKey, SettlementStack>,
    /// Per period, the volume-weighted sell-price adjustment implied by the
    /// cohort's bids before repricing.
    pub sell_price_adjustment: Map<SettlementKey, f64>,
}

/// Strip the subsidy distortion out of the bid side of each stack.
///
/// Units paid an out-of-market subsidy bid below zero to stay dispatched.
/// Every negative-priced bid is repriced to `default_bid_price` (normally
/// 0.0); the sell-price adjustment implied by the subsidised cohort's bids
/// is recorded per period before prices are touched.
pub fn reprice_subsidised_bids(
    stacks: &Map<SettlementKey, SettlementStack>,
    subsidised_units: &Set<UnitId>,
    default_bid_price: f64,
) -> SubsidyRepricing {
    let mut result = SubsidyRepricing::default();
    for (key, stack) in stacks {
        if stack.is_empty() {
            result.stacks.insert(*key, stack.clone());
            continue;
        }

        let cohort_bids = |action: &BalancingAction| {
            subsidised_units.contains(&action.unit) && action.volume < 0.0
        };
        let subsidised_volume: f64 = stack
            .actions()
            .iter()
            .filter(|action| cohort_bids(action) && action.price < 0.0)
            .map(|action| action.volume)
            .sum();
        let cohort_cost: f64 = stack
            .actions()
            .iter()
            .filter(|action| cohort_bids(action))
            .map(|action| action.price * action.volume)
            .sum();
        let adjustment = if subsidised_volume != 0.0 {
            cohort_cost / subsidised_volume
        } else {
            0.0
        };
        result.sell_price_adjustment.insert(*key, adjustment);

        let repriced = stack
            .actions()
            .iter()
            .cloned()
            .map(|mut action| {
                if action.volume < 0.0 && action.price < 0.0 {
                    action.price = default_bid_price;
                }
                action
            })
            .collect();
        result.stacks.insert(*key, repriced);
    }
    result
}
