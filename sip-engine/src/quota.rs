use crate::{BalancingUnit, Map, bid_stack, locate_marginal_index, marginal_action, offer_stack};
use sip_core::models::{
    BalancingAction, BidOfferPair, Direction, ImbalanceRecord, PriceParameters, SettlementStack,
    UnitId,
};

/// Revise a period's settlement stack so its accepted volume reflects the
/// counterfactual net imbalance instead of the factual one.
///
/// Dispatches on the sign pair of the imbalance record: when the sign is
/// preserved, volume is topped up in merit order or trimmed from the
/// out-of-merit end (accepting the opposite direction for any overshoot);
/// when the sign flips, the original direction is unwound entirely and the
/// opposite direction accepted up to the counterfactual volume.
pub fn recalculate_stack(
    imbalance: &ImbalanceRecord,
    stack: &SettlementStack,
    table: &[BidOfferPair],
    units: &Map<UnitId, BalancingUnit>,
    params: &PriceParameters,
) -> SettlementStack {
    let factual = imbalance.factual;
    let counterfactual = imbalance.counterfactual;

    if factual > 0.0 && counterfactual > 0.0 {
        both_positive(factual, counterfactual, stack, table, units, params)
    } else if factual < 0.0 && counterfactual < 0.0 {
        both_negative(factual, counterfactual, stack, table, units, params)
    } else if factual > 0.0 && counterfactual < 0.0 {
        positive_to_negative(factual, counterfactual, stack, table, units, params)
    } else {
        negative_to_positive(factual, counterfactual, stack, table, units, params)
    }
}

fn both_positive(
    factual: f64,
    counterfactual: f64,
    stack: &SettlementStack,
    table: &[BidOfferPair],
    units: &Map<UnitId, BalancingUnit>,
    params: &PriceParameters,
) -> SettlementStack {
    if counterfactual > factual {
        let offers = offer_stack(table);
        accept_until_quota_met(
            factual,
            counterfactual,
            stack,
            &offers,
            Direction::Offer,
            units,
            params,
        )
    } else {
        let (revised, removed) = remove_offers_until_quota_met(factual, counterfactual, stack);
        if factual - removed > counterfactual {
            // The trim overshot: buy back the residual with bids.
            let bid_volume_to_accept = (factual - removed) - counterfactual;
            let bids = bid_stack(table);
            accept_until_quota_met(
                bid_volume_to_accept,
                0.0,
                &revised,
                &bids,
                Direction::Bid,
                units,
                params,
            )
        } else {
            revised
        }
    }
}

fn both_negative(
    factual: f64,
    counterfactual: f64,
    stack: &SettlementStack,
    table: &[BidOfferPair],
    units: &Map<UnitId, BalancingUnit>,
    params: &PriceParameters,
) -> SettlementStack {
    if counterfactual < factual {
        let bids = bid_stack(table);
        accept_until_quota_met(
            factual,
            counterfactual,
            stack,
            &bids,
            Direction::Bid,
            units,
            params,
        )
    } else {
        let (revised, removed) = remove_bids_until_quota_met(factual, counterfactual, stack);
        if factual - removed < counterfactual {
            let offer_volume_to_accept = counterfactual - (factual - removed);
            let offers = offer_stack(table);
            accept_until_quota_met(
                0.0,
                offer_volume_to_accept,
                &revised,
                &offers,
                Direction::Offer,
                units,
                params,
            )
        } else {
            revised
        }
    }
}

fn positive_to_negative(
    factual: f64,
    counterfactual: f64,
    stack: &SettlementStack,
    table: &[BidOfferPair],
    units: &Map<UnitId, BalancingUnit>,
    params: &PriceParameters,
) -> SettlementStack {
    let (without_offers, removed) = remove_offers_until_quota_met(factual, 0.0, stack);
    let remaining = factual - removed;
    let bids = bid_stack(table);
    accept_until_quota_met(
        remaining,
        counterfactual,
        &without_offers,
        &bids,
        Direction::Bid,
        units,
        params,
    )
}

fn negative_to_positive(
    factual: f64,
    counterfactual: f64,
    stack: &SettlementStack,
    table: &[BidOfferPair],
    units: &Map<UnitId, BalancingUnit>,
    params: &PriceParameters,
) -> SettlementStack {
    let (without_bids, removed) = remove_bids_until_quota_met(factual, 0.0, stack);
    let remaining = factual - removed;
    let offers = offer_stack(table);
    accept_until_quota_met(
        remaining,
        counterfactual,
        &without_bids,
        &offers,
        Direction::Offer,
        units,
        params,
    )
}

/// Accept actions from the ranked side until the energy target is met.
///
/// The walk resumes at the marginal action's row and takes from each
/// subsequent (unit, pair) the lesser (offers) or greater (bids) of the
/// pair's remaining capacity and the outstanding target. Rows whose unit is
/// unknown are skipped. If the side is exhausted first, the target is
/// under-met and the walk simply ends.
pub fn accept_until_quota_met(
    energy_before: f64,
    energy_after: f64,
    stack: &SettlementStack,
    ranked: &[BidOfferPair],
    direction: Direction,
    units: &Map<UnitId, BalancingUnit>,
    params: &PriceParameters,
) -> SettlementStack {
    let energy_target = energy_after - energy_before;

    let marginal = marginal_action(stack, direction, params);
    let Some(start) = locate_marginal_index(&marginal, ranked, direction) else {
        return stack.clone();
    };

    let mut total_accepted = 0.0;
    let mut acceptances: Vec<BalancingAction> = Vec::new();
    for row in &ranked[start..] {
        let Some(unit) = units.get(&row.unit) else {
            continue;
        };
        let remaining = unit.remaining_volume(row.pair);
        let outstanding = energy_target - total_accepted;
        let (volume, price) = match direction {
            // Remaining capacity and the outstanding target share a sign.
            Direction::Bid => (remaining.max(outstanding), row.bid_price),
            Direction::Offer => (remaining.min(outstanding), row.offer_price),
        };
        total_accepted += volume;
        if volume != 0.0 {
            acceptances.push(BalancingAction {
                unit: row.unit.clone(),
                pair: row.pair,
                so_flag: false,
                cadl_flag: false,
                price,
                volume,
            });
        }
        if total_accepted.abs() >= energy_target.abs() {
            break;
        }
    }

    if acceptances.is_empty() {
        return stack.clone();
    }
    stack
        .actions()
        .iter()
        .cloned()
        .chain(acceptances)
        .collect()
}

/// Remove accepted offer volume from the out-of-merit (most expensive) end
/// of the stack until the surplus is met.
///
/// Whole rows are dropped until the boundary row, which is reduced in place;
/// SO-flagged rows are skipped, not counted. Returns the revised stack and
/// the total volume removed (which under-meets the surplus if the stack runs
/// out of removable rows).
pub fn remove_offers_until_quota_met(
    factual: f64,
    counterfactual: f64,
    stack: &SettlementStack,
) -> (SettlementStack, f64) {
    let energy_surplus = factual - counterfactual;
    let mut actions = stack.actions().to_vec();
    let mut total_removed = 0.0;
    let mut dropped: Vec<usize> = Vec::new();

    for index in (0..actions.len()).rev() {
        if actions[index].so_flag {
            continue;
        }
        let accepted_volume = actions[index].volume;
        let volume_to_remove = accepted_volume.min(energy_surplus - total_removed);
        total_removed += volume_to_remove;

        if total_removed >= energy_surplus {
            actions[index].volume -= volume_to_remove;
            break;
        } else {
            dropped.push(index);
        }
    }

    // Indices were gathered tail-first, so removal order is already safe.
    for index in dropped {
        actions.remove(index);
    }
    (SettlementStack::new(actions), total_removed)
}

/// Mirror of [`remove_offers_until_quota_met`] for bids: walk from the head
/// (most extreme bid) forward, with negative volumes throughout.
///
/// Quota is met once the cumulative removed volume is at or below the
/// (negative) deficit — bids are negative volumes, so the signed comparison
/// runs the other way.
pub fn remove_bids_until_quota_met(
    factual: f64,
    counterfactual: f64,
    stack: &SettlementStack,
) -> (SettlementStack, f64) {
    let energy_deficit = factual - counterfactual;
    let mut actions = stack.actions().to_vec();
    let mut total_removed = 0.0;
    let mut dropped: Vec<usize> = Vec::new();

    for index in 0..actions.len() {
        if actions[index].so_flag {
            continue;
        }
        let accepted_volume = actions[index].volume;
        let volume_to_remove = accepted_volume.max(energy_deficit - total_removed);
        total_removed += volume_to_remove;

        if total_removed <= energy_deficit {
            actions[index].volume -= volume_to_remove;
            break;
        } else {
            dropped.push(index);
        }
    }

    for index in dropped.into_iter().rev() {
        actions.remove(index);
    }
    (SettlementStack::new(actions), total_removed)
}
