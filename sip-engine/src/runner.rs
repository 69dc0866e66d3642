use crate::{BalancingUnit, Map, Set, derive_imbalance_price, recalculate_stack};
use sip_core::models::{
    BidOfferPair, ImbalanceRecord, PairId, PhysicalLimits, PriceParameters, SettlementDate,
    SettlementKey, SettlementStack, TlmTable, UnitId,
};
use sip_core::ports::MarketDataSource;
use std::sync::Arc;

/// The keyed outputs of a recalculation run.
#[derive(Debug, Default)]
pub struct RecalculationOutcome {
    /// Revised settlement stack per period.
    pub stacks: Map<SettlementKey, SettlementStack>,
    /// Recalculated imbalance price per period.
    pub prices: Map<SettlementKey, f64>,
    /// Periods skipped because a required input was unavailable.
    pub missing: Set<SettlementKey>,
}

enum PeriodOutput {
    Missing,
    Recalculated { stack: SettlementStack, price: f64 },
}

/// Recalculate stacks and prices for every requested period.
///
/// Periods are independent, so each one runs as its own task; results are
/// gathered day by day. A period missing any required input (imbalance
/// record, a non-empty factual stack, bid/offer table, physical limits, or
/// price reference) is recorded in the outcome's `missing` set and skipped
/// whole — only fetch failures that survived the source's retry policy
/// propagate as errors.
pub async fn recalculate<S>(
    source: Arc<S>,
    keys: impl IntoIterator<Item = SettlementKey>,
    imbalances: &Map<SettlementKey, ImbalanceRecord>,
    params: &PriceParameters,
    tlm: &TlmTable,
) -> Result<RecalculationOutcome, S::Error>
where
    S: MarketDataSource + Send + Sync + 'static,
    S::Error: Send + 'static,
{
    let tlm = Arc::new(tlm.clone());
    let mut by_date: Map<SettlementDate, Vec<SettlementKey>> = Map::default();
    for key in keys {
        by_date.entry(key.date).or_default().push(key);
    }

    let mut outcome = RecalculationOutcome::default();
    for (date, keys) in by_date {
        let mut tasks = tokio::task::JoinSet::new();
        for key in keys {
            let source = Arc::clone(&source);
            let tlm = Arc::clone(&tlm);
            let imbalance = imbalances.get(&key).copied();
            let params = *params;
            tasks.spawn(async move {
                let result = process_period(source.as_ref(), key, imbalance, &params, &tlm).await;
                (key, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let (key, result) = joined.expect("settlement period task panicked");
            match result? {
                PeriodOutput::Missing => {
                    outcome.missing.insert(key);
                }
                PeriodOutput::Recalculated { stack, price } => {
                    outcome.stacks.insert(key, stack);
                    outcome.prices.insert(key, price);
                }
            }
        }
        tracing::info!(%date, "recalculated stacks and prices");
    }

    // Tasks complete in arbitrary order; keep the outputs deterministic.
    outcome.stacks.sort_keys();
    outcome.prices.sort_keys();
    outcome.missing.sort();
    Ok(outcome)
}

async fn process_period<S: MarketDataSource>(
    source: &S,
    key: SettlementKey,
    imbalance: Option<ImbalanceRecord>,
    params: &PriceParameters,
    tlm: &TlmTable,
) -> Result<PeriodOutput, S::Error> {
    let Some(imbalance) = imbalance else {
        return Ok(PeriodOutput::Missing);
    };
    let Some(stack) = source.settlement_stack(&key).await? else {
        return Ok(PeriodOutput::Missing);
    };
    if stack.is_empty() {
        return Ok(PeriodOutput::Missing);
    }
    let Some(table) = source.bid_offer_table(&key).await? else {
        return Ok(PeriodOutput::Missing);
    };
    if table.is_empty() {
        return Ok(PeriodOutput::Missing);
    }

    let unit_ids: Vec<UnitId> = {
        let mut seen: Set<UnitId> = Set::default();
        for row in &table {
            seen.insert(row.unit.clone());
        }
        seen.into_iter().collect()
    };
    let Some(limits) = source.physical_limits(&key, &unit_ids).await? else {
        return Ok(PeriodOutput::Missing);
    };
    let Some(units) = build_units(&table, &stack, &limits) else {
        return Ok(PeriodOutput::Missing);
    };

    let revised = recalculate_stack(&imbalance, &stack, &table, &units, params);

    let Some(reference) = source.price_reference(&key).await? else {
        return Ok(PeriodOutput::Missing);
    };
    let price = derive_imbalance_price(&revised, &reference, tlm, imbalance.counterfactual, params);
    tracing::debug!(%key, price, "recalculated period");

    Ok(PeriodOutput::Recalculated {
        stack: revised,
        price,
    })
}

/// Build one [`BalancingUnit`] per unit in the pair table, seeding each with
/// the factual acceptance volume recorded against its pairs in the existing
/// stack. Returns `None` when any unit lacks physical limits — the period
/// must then be skipped entirely, not partially computed.
fn build_units(
    table: &[BidOfferPair],
    stack: &SettlementStack,
    limits: &Map<UnitId, PhysicalLimits>,
) -> Option<Map<UnitId, BalancingUnit>> {
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

    let mut units: Map<UnitId, BalancingUnit> = Map::default();
    for (unit, pairs) in pairs_by_unit {
        let unit_limits = *limits.get(&unit)?;
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
        let model = BalancingUnit::new(unit.clone(), pairs, &factual, unit_limits);
        units.insert(unit, model);
    }
    Some(units)
}
