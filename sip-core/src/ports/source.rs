use crate::models::{
    BidOfferPair, Map, PhysicalLimits, PriceReference, SettlementKey, SettlementStack, UnitId,
};

/// Interface for the external collaborator that supplies market data.
///
/// Implementations own all I/O framing: remote reporting APIs, spreadsheet
/// ingestion, caching, and retry of transient failures (see
/// [`with_retries`](crate::ports::with_retries)). The engine only sees
/// already-parsed tabular inputs.
///
/// Every method distinguishes two non-success outcomes:
/// - `Ok(None)` — the data is genuinely absent for this period. The caller
///   records the period as missing and skips it entirely.
/// - `Err(_)` — a fetch failed even after the implementation's own retries.
///   The caller propagates the failure.
pub trait MarketDataSource {
    /// Error type for fetch failures that survived the retry policy.
    type Error: std::error::Error + Send;

    /// The factual settlement stack for the period, in merit order.
    fn settlement_stack(
        &self,
        key: &SettlementKey,
    ) -> impl Future<Output = Result<Option<SettlementStack>, Self::Error>> + Send;

    /// All bid/offer pairs submitted for the period, across all units.
    fn bid_offer_table(
        &self,
        key: &SettlementKey,
    ) -> impl Future<Output = Result<Option<Vec<BidOfferPair>>, Self::Error>> + Send;

    /// Physical delivery limits for the given units in the period.
    ///
    /// `Ok(Some(_))` must hold a complete map: if limits cannot be resolved
    /// for any requested unit, implementations return `Ok(None)` so the
    /// period is skipped whole rather than partially computed.
    fn physical_limits(
        &self,
        key: &SettlementKey,
        units: &[UnitId],
    ) -> impl Future<Output = Result<Option<Map<UnitId, PhysicalLimits>>, Self::Error>> + Send;

    /// Market index price and price adjustments for the period.
    fn price_reference(
        &self,
        key: &SettlementKey,
    ) -> impl Future<Output = Result<Option<PriceReference>, Self::Error>> + Send;
}
