#![allow(dead_code)]

use sip_core::models::{
    BalancingAction, BidOfferPair, Map, PairId, PhysicalLimits, PriceParameters, SettlementDate,
    SettlementKey, SettlementStack, UnitId,
};
use sip_engine::BalancingUnit;

pub fn key(period: u8) -> SettlementKey {
    SettlementKey::new(SettlementDate::parse("2024-06-01").unwrap(), period).unwrap()
}

pub fn action(unit: &str, pair: i32, price: f64, volume: f64) -> BalancingAction {
    BalancingAction {
        unit: UnitId::from(unit),
        pair: PairId::new(pair),
        so_flag: false,
        cadl_flag: false,
        price,
        volume,
    }
}

pub fn so_action(unit: &str, pair: i32, price: f64, volume: f64) -> BalancingAction {
    BalancingAction {
        so_flag: true,
        ..action(unit, pair, price, volume)
    }
}

pub fn row(unit: &str, pair: i32, bid: f64, offer: f64, level_from: f64) -> BidOfferPair {
    BidOfferPair {
        unit: UnitId::from(unit),
        pair: PairId::new(pair),
        bid_price: bid,
        offer_price: offer,
        level_from,
    }
}

/// Limits generous enough never to bind.
pub fn wide_limits() -> PhysicalLimits {
    PhysicalLimits {
        pn: 0.0,
        mels: 1_000.0,
        mils: -1_000.0,
    }
}

/// Pricing parameters with the threshold stages effectively disabled, so a
/// scenario's arithmetic is not truncated unless it means to be.
pub fn relaxed_params() -> PriceParameters {
    PriceParameters {
        par_volume: 1_000.0,
        rpar_volume: 1_000.0,
        ..Default::default()
    }
}

/// One volume model per unit in the table, seeded with the factual
/// acceptance volume the stack records against each pair.
pub fn build_units(
    table: &[BidOfferPair],
    stack: &SettlementStack,
    limits: PhysicalLimits,
) -> Map<UnitId, BalancingUnit> {
    let mut accepted: Map<(UnitId, PairId), f64> = Map::default();
    for action in stack.actions() {
        *accepted
            .entry((action.unit.clone(), action.pair))
            .or_insert(0.0) += action.volume;
    }
    let mut pairs_by_unit: Map<UnitId, Vec<BidOfferPair>> = Map::default();
    for row in table {
        pairs_by_unit
            .entry(row.unit.clone())
            .or_default()
            .push(row.clone());
    }
    pairs_by_unit
        .into_iter()
        .map(|(unit, pairs)| {
            let factual: Map<PairId, f64> = pairs
                .iter()
                .map(|pair| {
                    let volume = accepted
                        .get(&(unit.clone(), pair.pair))
                        .copied()
                        .unwrap_or(0.0);
                    (pair.pair, volume)
                })
                .collect();
            let model = BalancingUnit::new(unit.clone(), pairs, &factual, limits);
            (unit, model)
        })
        .collect()
}
