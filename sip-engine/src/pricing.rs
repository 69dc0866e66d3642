use crate::Map;
use sip_core::models::{
    BalancingAction, Direction, PairId, PriceParameters, PriceReference, SettlementStack,
    TlmTable, UnitId,
};

/// A settlement-stack action carrying the volumes and flags attached as it
/// moves through the price derivation pipeline.
///
/// Each stage consumes and produces ranked lists of these; stages never
/// mutate shared state, so any stage can be exercised in isolation.
#[derive(Debug, Clone)]
pub struct RankedAction {
    /// The underlying accepted action.
    pub action: BalancingAction,
    /// Volume after de-minimis tagging.
    pub dmat_volume: f64,
    /// Volume after arbitrage netting.
    pub arbitrage_volume: f64,
    /// Second-stage classification: `Some(true)` flagged for repricing,
    /// `Some(false)` unflagged, `None` unresolved (null-priced actions are
    /// never newly classified).
    pub second_stage_flagged: Option<bool>,
    /// Whether the final price was replaced.
    pub repriced: bool,
    /// Price used in the final calculation.
    pub final_price: f64,
    /// Volume after netting buy and sell totals against each other.
    pub niv_volume: f64,
    /// Volume retained inside the price average reference threshold.
    pub par_volume: f64,
    /// Loss-adjusted volume.
    pub tlm_volume: f64,
    /// Loss-adjusted cost.
    pub tlm_cost: f64,
}

impl From<BalancingAction> for RankedAction {
    fn from(action: BalancingAction) -> Self {
        Self {
            action,
            dmat_volume: 0.0,
            arbitrage_volume: 0.0,
            second_stage_flagged: None,
            repriced: false,
            final_price: f64::NAN,
            niv_volume: 0.0,
            par_volume: 0.0,
            tlm_volume: 0.0,
            tlm_cost: 0.0,
        }
    }
}

/// Split a stack into its ranked buy and sell sets.
///
/// Buy side: non-negative volumes, ascending by (price, pair id). Sell side:
/// negative volumes, descending by (price, pair id).
pub fn ranked_sets(stack: &SettlementStack) -> (Vec<RankedAction>, Vec<RankedAction>) {
    let mut buy: Vec<RankedAction> = Vec::new();
    let mut sell: Vec<RankedAction> = Vec::new();
    for action in stack.actions() {
        if action.volume >= 0.0 {
            buy.push(action.clone().into());
        } else {
            sell.push(action.clone().into());
        }
    }
    buy.sort_by(|a, b| {
        a.action
            .price
            .total_cmp(&b.action.price)
            .then_with(|| a.action.pair.cmp(&b.action.pair))
    });
    sell.sort_by(|a, b| {
        b.action
            .price
            .total_cmp(&a.action.price)
            .then_with(|| b.action.pair.cmp(&a.action.pair))
    });
    (buy, sell)
}

/// The de-minimis rule for a single action.
///
/// A volume is zeroed only when both it and its (unit, pair) total fall
/// inside the threshold on the side's own sign.
pub(crate) fn dmat_adjusted(
    volume: f64,
    pair_total: f64,
    threshold: f64,
    direction: Direction,
) -> f64 {
    let sign = direction.sign();
    let negligible = sign * volume < threshold && sign * pair_total < threshold;
    if negligible { 0.0 } else { volume }
}

fn volume_by_unit_pair(side: &[RankedAction]) -> Map<(UnitId, PairId), f64> {
    let mut totals: Map<(UnitId, PairId), f64> = Map::default();
    for ranked in side {
        *totals
            .entry((ranked.action.unit.clone(), ranked.action.pair))
            .or_insert(0.0) += ranked.action.volume;
    }
    totals
}

/// Stage 1: zero volumes too small to set a price.
pub fn de_minimis_tagging(
    mut buy: Vec<RankedAction>,
    mut sell: Vec<RankedAction>,
    params: &PriceParameters,
) -> (Vec<RankedAction>, Vec<RankedAction>) {
    let buy_totals = volume_by_unit_pair(&buy);
    let sell_totals = volume_by_unit_pair(&sell);

    for ranked in &mut buy {
        let total = buy_totals[&(ranked.action.unit.clone(), ranked.action.pair)];
        ranked.dmat_volume = dmat_adjusted(
            ranked.action.volume,
            total,
            params.de_minimis_volume,
            Direction::Offer,
        );
    }
    for ranked in &mut sell {
        let total = sell_totals[&(ranked.action.unit.clone(), ranked.action.pair)];
        ranked.dmat_volume = dmat_adjusted(
            ranked.action.volume,
            total,
            params.de_minimis_volume,
            Direction::Bid,
        );
    }
    (buy, sell)
}

/// Stage 2: net out apparent self-arbitrage between simultaneously accepted
/// buy and sell actions.
///
/// For each sell action, buy actions priced at or below it absorb its volume.
/// Whether a single buy absorbs the whole remainder is decided by comparing
/// total values (price × volume), not prices alone.
pub fn arbitrage_tagging(
    mut buy: Vec<RankedAction>,
    mut sell: Vec<RankedAction>,
) -> (Vec<RankedAction>, Vec<RankedAction>) {
    for ranked in &mut buy {
        ranked.arbitrage_volume = ranked.dmat_volume;
    }
    for ranked in &mut sell {
        ranked.arbitrage_volume = ranked.dmat_volume;
    }

    for sell_action in &mut sell {
        if sell_action.arbitrage_volume == 0.0 {
            continue;
        }
        let sell_price = sell_action.action.price;
        for buy_action in &mut buy {
            if sell_action.arbitrage_volume == 0.0 {
                break;
            }
            if !(buy_action.action.price <= sell_price) {
                continue;
            }
            let buy_volume = buy_action.arbitrage_volume;
            if buy_volume == 0.0 {
                continue;
            }
            let sell_volume = sell_action.arbitrage_volume;
            // Positive-valued comparison per the settlement methodology.
            let sell_value = -sell_price * sell_volume;
            let buy_value = buy_action.action.price * buy_volume;

            let transfer = (-sell_volume).min(buy_volume);
            buy_action.arbitrage_volume -= transfer;
            sell_action.arbitrage_volume += transfer;
            if buy_value >= sell_value {
                break;
            }
        }
    }
    (buy, sell)
}

/// Stage 3: flag actions priced beyond their side's first-stage threshold
/// for second-stage repricing.
///
/// The threshold on each side is the most extreme price among unflagged
/// (non-SO, non-constraint-deload) actions that survived the earlier stages.
/// Null-priced actions are never newly classified.
pub fn classification(
    mut buy: Vec<RankedAction>,
    mut sell: Vec<RankedAction>,
) -> (Vec<RankedAction>, Vec<RankedAction>) {
    classify_side(&mut buy, Direction::Offer);
    classify_side(&mut sell, Direction::Bid);
    (buy, sell)
}

fn classify_side(side: &mut [RankedAction], direction: Direction) {
    let threshold = side
        .iter()
        .filter(|ranked| {
            !ranked.action.so_flag && !ranked.action.cadl_flag && ranked.arbitrage_volume != 0.0
        })
        .next_back()
        .map(|ranked| ranked.action.price);

    match threshold {
        None => {
            for ranked in side.iter_mut() {
                ranked.second_stage_flagged = Some(true);
            }
        }
        Some(threshold) => {
            for ranked in side.iter_mut() {
                if ranked.action.price.is_nan() {
                    continue;
                }
                let beyond = match direction {
                    Direction::Offer => ranked.action.price > threshold,
                    Direction::Bid => ranked.action.price < threshold,
                };
                ranked.second_stage_flagged = Some(beyond);
            }
        }
    }
    for ranked in side.iter_mut() {
        ranked.repriced = false;
    }
}

/// Stage 4: net the whole buy side against the whole sell side, so each
/// action's remaining volume reflects its true contribution to system length.
pub fn niv_tagging(
    mut buy: Vec<RankedAction>,
    mut sell: Vec<RankedAction>,
) -> (Vec<RankedAction>, Vec<RankedAction>) {
    for ranked in &mut buy {
        ranked.niv_volume = ranked.arbitrage_volume;
    }
    for ranked in &mut sell {
        ranked.niv_volume = ranked.arbitrage_volume;
    }

    let total_buy: f64 = buy.iter().map(|ranked| ranked.arbitrage_volume).sum();
    let total_sell: f64 = sell.iter().map(|ranked| ranked.arbitrage_volume).sum();

    if total_buy + total_sell > 0.0 {
        for buy_index in (0..buy.len()).rev() {
            for sell_action in &mut sell {
                let buy_volume = buy[buy_index].niv_volume;
                let sell_volume = sell_action.niv_volume;
                if sell_volume == 0.0 {
                    continue;
                }
                if sell_volume + buy_volume <= 0.0 {
                    sell_action.niv_volume += buy_volume;
                    buy[buy_index].niv_volume = 0.0;
                    break;
                } else {
                    sell_action.niv_volume = 0.0;
                    buy[buy_index].niv_volume += sell_volume;
                }
            }
        }
    } else {
        for sell_index in (0..sell.len()).rev() {
            for buy_action in &mut buy {
                let buy_volume = buy_action.niv_volume;
                let sell_volume = sell[sell_index].niv_volume;
                if buy_volume == 0.0 {
                    continue;
                }
                if sell_volume + buy_volume >= 0.0 {
                    buy_action.niv_volume += sell_volume;
                    sell[sell_index].niv_volume = 0.0;
                    break;
                } else {
                    buy_action.niv_volume = 0.0;
                    sell[sell_index].niv_volume += buy_volume;
                }
            }
        }
    }
    (buy, sell)
}

/// Stage 5: give every second-stage-flagged action a single replacement
/// price, then re-rank by final price.
///
/// The replacement price is the volume-weighted average of up to
/// `rpar_volume` of unflagged volume taken from the extreme-priced end of
/// the ranked set, falling back to the market index price when no unflagged
/// action exists.
pub fn replace_flagged_prices(
    mut active: Vec<RankedAction>,
    market_index_price: f64,
    counterfactual_niv: f64,
    params: &PriceParameters,
) -> Vec<RankedAction> {
    for ranked in &mut active {
        ranked.final_price = ranked.action.price;
    }
    if active
        .iter()
        .any(|ranked| ranked.second_stage_flagged == Some(true))
    {
        let replacement = {
            let unflagged: Vec<&RankedAction> = active
                .iter()
                .filter(|ranked| ranked.second_stage_flagged == Some(false))
                .collect();
            if unflagged.is_empty() {
                market_index_price
            } else {
                replacement_price(&unflagged, params)
            }
        };
        for ranked in &mut active {
            if ranked.second_stage_flagged == Some(true) {
                ranked.repriced = true;
                ranked.final_price = replacement;
            }
        }
        if counterfactual_niv > 0.0 {
            active.sort_by(|a, b| a.final_price.total_cmp(&b.final_price));
        } else {
            active.sort_by(|a, b| b.final_price.total_cmp(&a.final_price));
        }
    }
    active
}

fn replacement_price(unflagged: &[&RankedAction], params: &PriceParameters) -> f64 {
    let mut total_volume = 0.0;
    let mut weighted_price = 0.0;
    for ranked in unflagged.iter().rev() {
        let volume = ranked.niv_volume.abs();
        let price = ranked.action.price;
        if volume + total_volume > params.rpar_volume {
            let partial = params.rpar_volume - total_volume;
            weighted_price += partial * price;
            total_volume += partial;
            break;
        }
        weighted_price += volume * price;
        total_volume += volume;
    }
    weighted_price / total_volume
}

/// Stage 6: retain only the most extreme `par_volume` of volume, walking
/// from the tail of the final-price ranking inward. The boundary action is
/// partially included; everything beyond it is discarded.
pub fn par_tagging(
    mut active: Vec<RankedAction>,
    counterfactual_niv: f64,
    params: &PriceParameters,
) -> Vec<RankedAction> {
    let mut total = 0.0;
    if counterfactual_niv > 0.0 {
        for ranked in active.iter_mut().rev() {
            let volume = ranked.niv_volume;
            if volume + total > params.par_volume {
                ranked.par_volume = params.par_volume - total;
                break;
            }
            ranked.par_volume = volume;
            total += volume;
        }
    } else {
        for ranked in active.iter_mut().rev() {
            let volume = ranked.niv_volume;
            if volume + total < -params.par_volume {
                ranked.par_volume = -params.par_volume - total;
                break;
            }
            ranked.par_volume = volume;
            total += volume;
        }
    }
    active.retain(|ranked| ranked.par_volume != 0.0);
    active
}

/// Stage 7a: apply each unit's transmission loss multiplier.
pub fn tlm_adjust(mut active: Vec<RankedAction>, tlm: &TlmTable) -> Vec<RankedAction> {
    for ranked in &mut active {
        let multiplier = tlm.multiplier_for(&ranked.action.unit);
        ranked.tlm_volume = ranked.par_volume * multiplier;
        ranked.tlm_cost = ranked.tlm_volume * ranked.final_price;
    }
    active
}

/// Stage 7b: the clearing price of the retained, loss-adjusted actions.
fn imbalance_price(active: &[RankedAction], price_adjustment: f64) -> f64 {
    let total_volume: f64 = active.iter().map(|ranked| ranked.tlm_volume).sum();
    let total_cost: f64 = active.iter().map(|ranked| ranked.tlm_cost).sum();
    total_cost / total_volume + price_adjustment
}

/// Derive the system imbalance price implied by a (possibly revised)
/// settlement stack.
///
/// Whenever the stack cannot set a price — it is empty, the active side is
/// empty, or the netted volume is zero — the market index price stands in as
/// a conservative fallback, with no adjustment applied.
pub fn derive_imbalance_price(
    stack: &SettlementStack,
    reference: &PriceReference,
    tlm: &TlmTable,
    counterfactual_niv: f64,
    params: &PriceParameters,
) -> f64 {
    if stack.is_empty() {
        return reference.market_index_price;
    }

    let (buy, sell) = ranked_sets(stack);
    let (buy, sell) = de_minimis_tagging(buy, sell, params);
    let (buy, sell) = arbitrage_tagging(buy, sell);
    let (buy, sell) = classification(buy, sell);
    let (buy, sell) = niv_tagging(buy, sell);

    let active = if counterfactual_niv > 0.0 { buy } else { sell };
    if active.is_empty() {
        return reference.market_index_price;
    }
    let active: Vec<RankedAction> = active
        .into_iter()
        .filter(|ranked| ranked.niv_volume != 0.0)
        .collect();
    if active.iter().map(|ranked| ranked.niv_volume).sum::<f64>() == 0.0 {
        return reference.market_index_price;
    }

    let active = replace_flagged_prices(
        active,
        reference.market_index_price,
        counterfactual_niv,
        params,
    );
    let active = par_tagging(active, counterfactual_niv, params);
    let active = tlm_adjust(active, tlm);
    imbalance_price(&active, reference.adjustment(counterfactual_niv))
}
