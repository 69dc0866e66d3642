/**
 * Counterfactual settlement-stack and imbalance-price recalculation.
 *
 * Given a period's factual settlement stack and a counterfactual net
 * imbalance volume, the engine revises the stack through a quota-matching
 * state machine and derives the imbalance price the revised stack implies.
 * Everything here is synchronous, pure, and per-period; the async runner
 * fans periods out and gathers the results.
 */
mod analysis;
pub use analysis::*;

mod pricing;
pub use pricing::*;

mod quota;
pub use quota::*;

mod runner;
pub use runner::*;

mod stack;
pub use stack::*;

mod unit;
pub use unit::*;

// Deterministically-ordered collections, shared with the core models.
pub(crate) use sip_core::models::{Map, Set};
