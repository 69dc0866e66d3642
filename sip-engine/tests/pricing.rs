use approx::assert_relative_eq;
use sip_core::models::{PriceParameters, PriceReference, SettlementStack, TlmTable, UnitId};
use sip_engine::{
    arbitrage_tagging, classification, de_minimis_tagging, derive_imbalance_price, niv_tagging,
    par_tagging, ranked_sets,
};

mod common;
use common::*;

fn reference(market_index_price: f64) -> PriceReference {
    PriceReference {
        market_index_price,
        buy_price_adjustment: None,
        sell_price_adjustment: None,
    }
}

#[test]
fn empty_stack_falls_back_to_market_index_price() {
    let price = derive_imbalance_price(
        &SettlementStack::default(),
        &reference(75.0),
        &TlmTable::default(),
        10.0,
        &PriceParameters::default(),
    );
    assert_eq!(price, 75.0);
}

#[test]
fn empty_active_side_falls_back_to_market_index_price() {
    // Counterfactually short system, but the stack holds only bids.
    let stack = SettlementStack::new(vec![action("T_A", -1, 5.0, -4.0)]);
    let price = derive_imbalance_price(
        &stack,
        &reference(75.0),
        &TlmTable::default(),
        10.0,
        &PriceParameters::default(),
    );
    assert_eq!(price, 75.0);
}

#[test]
fn absent_adjustment_data_adds_zero() {
    let stack = SettlementStack::new(vec![action("T_A", 1, 30.0, 5.0)]);
    let price = derive_imbalance_price(
        &stack,
        &reference(75.0),
        &TlmTable::default(),
        5.0,
        &relaxed_params(),
    );
    assert_relative_eq!(price, 30.0);
}

#[test]
fn de_minimis_tagging_is_idempotent() {
    let stack = SettlementStack::new(vec![
        action("T_A", 1, 20.0, 0.05),
        action("T_A", 2, 40.0, 5.0),
        action("T_B", 1, 30.0, 0.04),
        action("T_B", 1, 31.0, 0.04),
        action("T_C", -1, 5.0, -0.05),
        action("T_C", -1, 5.0, -3.0),
    ]);
    let (buy, sell) = ranked_sets(&stack);
    let (buy, sell) = de_minimis_tagging(buy, sell, &PriceParameters::default());

    // Feed the adjusted volumes back through as if they were the originals.
    let reapplied = SettlementStack::new(
        buy.iter()
            .chain(sell.iter())
            .map(|ranked| {
                let mut action = ranked.action.clone();
                action.volume = ranked.dmat_volume;
                action
            })
            .collect(),
    );
    let (buy2, sell2) = ranked_sets(&reapplied);
    let (buy2, sell2) = de_minimis_tagging(buy2, sell2, &PriceParameters::default());

    let volumes = |side: &[sip_engine::RankedAction]| -> Vec<f64> {
        side.iter().map(|ranked| ranked.dmat_volume).collect()
    };
    assert_eq!(volumes(&buy), volumes(&buy2));
    assert_eq!(volumes(&sell), volumes(&sell2));
}

#[test]
fn small_volumes_survive_when_their_pair_total_is_large() {
    // 0.04 + 0.04 on the same (unit, pair) still dies; a 0.05 slice of a
    // 5.0 MWh pair does not.
    let stack = SettlementStack::new(vec![
        action("T_A", 1, 20.0, 0.05),
        action("T_A", 1, 20.0, 4.95),
        action("T_B", 1, 30.0, 0.04),
        action("T_B", 1, 31.0, 0.04),
    ]);
    let (buy, sell) = ranked_sets(&stack);
    let (buy, _) = de_minimis_tagging(buy, sell, &PriceParameters::default());

    for ranked in &buy {
        if ranked.action.unit == UnitId::from("T_A") {
            assert_eq!(ranked.dmat_volume, ranked.action.volume);
        } else {
            assert_eq!(ranked.dmat_volume, 0.0);
        }
    }
}

#[test]
fn arbitrage_tagging_conserves_net_volume() {
    let stack = SettlementStack::new(vec![
        action("T_A", 1, 10.0, 5.0),
        action("T_B", 1, 30.0, 3.0),
        action("T_C", -1, 25.0, -4.0),
        action("T_D", -1, 12.0, -2.0),
    ]);
    let (buy, sell) = ranked_sets(&stack);
    let (buy, sell) = de_minimis_tagging(buy, sell, &PriceParameters::default());
    let before: f64 = buy
        .iter()
        .chain(sell.iter())
        .map(|ranked| ranked.dmat_volume)
        .sum();

    let (buy, sell) = arbitrage_tagging(buy, sell);
    let after: f64 = buy
        .iter()
        .chain(sell.iter())
        .map(|ranked| ranked.arbitrage_volume)
        .sum();

    assert_relative_eq!(before, after, max_relative = 1e-12);
    // The sell at 25 found cheaper buy volume to net against.
    let netted_sell = sell
        .iter()
        .find(|ranked| ranked.action.unit == UnitId::from("T_C"))
        .unwrap();
    assert!(netted_sell.arbitrage_volume > -4.0);
}

#[test]
fn niv_tagging_nets_the_short_side_down() {
    let stack = SettlementStack::new(vec![
        action("T_A", 1, 20.0, 10.0),
        action("T_B", 1, 40.0, 5.0),
        action("T_C", -1, 15.0, -3.0),
    ]);
    let (buy, sell) = ranked_sets(&stack);
    let (buy, sell) = de_minimis_tagging(buy, sell, &PriceParameters::default());
    let (buy, sell) = arbitrage_tagging(buy, sell);
    let (buy, sell) = classification(buy, sell);
    let (buy, sell) = niv_tagging(buy, sell);

    // Net length +12: the sell side is consumed entirely, peeling volume off
    // the most expensive buy first.
    assert_eq!(sell[0].niv_volume, 0.0);
    let by_unit = |unit: &str| {
        buy.iter()
            .find(|ranked| ranked.action.unit == UnitId::from(unit))
            .unwrap()
            .niv_volume
    };
    assert_relative_eq!(by_unit("T_B"), 2.0);
    assert_relative_eq!(by_unit("T_A"), 10.0);
    let total: f64 = buy.iter().map(|ranked| ranked.niv_volume).sum();
    assert_relative_eq!(total, 12.0);
}

#[test]
fn par_tagging_retains_at_most_the_threshold_volume() {
    let stack = SettlementStack::new(vec![
        action("T_A", 1, 20.0, 0.5),
        action("T_B", 1, 30.0, 0.7),
        action("T_C", 1, 40.0, 0.6),
    ]);
    let (buy, sell) = ranked_sets(&stack);
    let params = PriceParameters::default();
    let (buy, sell) = de_minimis_tagging(buy, sell, &params);
    let (buy, sell) = arbitrage_tagging(buy, sell);
    let (buy, sell) = classification(buy, sell);
    let (buy, _) = niv_tagging(buy, sell);

    let tagged = par_tagging(buy, 1.8, &params);
    let retained: f64 = tagged.iter().map(|ranked| ranked.par_volume).sum();
    assert_relative_eq!(retained, params.par_volume);
    // Only the extreme-priced end is kept: the 0.6 at 40 in full, then 0.4
    // of the 0.7 at 30.
    assert_eq!(tagged.len(), 2);
    assert_relative_eq!(tagged[0].par_volume, 0.4);
    assert_relative_eq!(tagged[1].par_volume, 0.6);
}

#[test]
fn flagged_actions_take_the_replacement_price() {
    // The constraint-deload action at 90 cannot set the first-stage
    // threshold, so it is repriced to the unflagged volume-weighted average.
    let mut expensive = action("T_B", 1, 90.0, 5.0);
    expensive.cadl_flag = true;
    let stack = SettlementStack::new(vec![action("T_A", 1, 20.0, 5.0), expensive]);

    let price = derive_imbalance_price(
        &stack,
        &reference(75.0),
        &TlmTable::default(),
        10.0,
        &relaxed_params(),
    );
    assert_relative_eq!(price, 20.0);
}

#[test]
fn fully_flagged_side_reprices_to_market_index() {
    let stack = SettlementStack::new(vec![
        so_action("T_A", 1, 120.0, 3.0),
        so_action("T_B", 1, 150.0, 2.0),
    ]);
    let price = derive_imbalance_price(
        &stack,
        &reference(62.0),
        &TlmTable::default(),
        5.0,
        &relaxed_params(),
    );
    assert_relative_eq!(price, 62.0);
}

#[test]
fn loss_multipliers_weight_the_final_price() {
    let stack = SettlementStack::new(vec![
        action("T_A", 1, 20.0, 5.0),
        action("T_B", 1, 40.0, 5.0),
    ]);
    let tlm = TlmTable::new([(UnitId::from("T_B"), 0.5)]);
    let price = derive_imbalance_price(
        &stack,
        &reference(75.0),
        &tlm,
        10.0,
        &relaxed_params(),
    );
    // (20*5 + 40*2.5) / (5 + 2.5)
    assert_relative_eq!(price, 200.0 / 7.5);
}

#[test]
fn null_priced_actions_are_never_newly_classified() {
    let stack = SettlementStack::new(vec![
        action("T_A", 1, 20.0, 5.0),
        action("T_N", 1, f64::NAN, 2.0),
    ]);
    let (buy, sell) = ranked_sets(&stack);
    let params = PriceParameters::default();
    let (buy, sell) = de_minimis_tagging(buy, sell, &params);
    let (buy, sell) = arbitrage_tagging(buy, sell);
    let (buy, _) = classification(buy, sell);

    let null_priced = buy
        .iter()
        .find(|ranked| ranked.action.unit == UnitId::from("T_N"))
        .unwrap();
    assert_eq!(null_priced.second_stage_flagged, None);
}
