use super::BalancingAction;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The settlement stack for one settlement period.
///
/// An ordered sequence of accepted balancing actions, always sorted ascending
/// by (price, pair id). The sort is total and deterministic — prices are
/// compared with `f64::total_cmp`, and pair id breaks ties — so two stacks
/// built from the same rows are identical regardless of input order.
///
/// Only the quota-matching engine mutates a stack, and it does so by
/// constructing a new one; the price derivation pipeline reads it only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<BalancingAction>", into = "Vec<BalancingAction>")]
pub struct SettlementStack {
    actions: Vec<BalancingAction>,
}

impl SettlementStack {
    /// Build a stack from rows in any order; the result is in merit order.
    pub fn new(mut actions: Vec<BalancingAction>) -> Self {
        actions.sort_by(merit_order);
        Self { actions }
    }

    /// The actions in ascending (price, pair id) order.
    pub fn actions(&self) -> &[BalancingAction] {
        &self.actions
    }

    /// Consume the stack, yielding its rows in merit order.
    pub fn into_actions(self) -> Vec<BalancingAction> {
        self.actions
    }

    /// Whether the stack holds no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of actions in the stack.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Net accepted volume across all actions, MWh.
    pub fn net_volume(&self) -> f64 {
        self.actions.iter().map(|action| action.volume).sum()
    }

    /// Total cost of the stack: Σ price × volume.
    pub fn cost(&self) -> f64 {
        self.actions
            .iter()
            .map(|action| action.price * action.volume)
            .sum()
    }
}

impl From<Vec<BalancingAction>> for SettlementStack {
    fn from(actions: Vec<BalancingAction>) -> Self {
        Self::new(actions)
    }
}

impl From<SettlementStack> for Vec<BalancingAction> {
    fn from(stack: SettlementStack) -> Self {
        stack.actions
    }
}

impl FromIterator<BalancingAction> for SettlementStack {
    fn from_iter<T: IntoIterator<Item = BalancingAction>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SettlementStack {
    type Item = &'a BalancingAction;
    type IntoIter = std::slice::Iter<'a, BalancingAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

fn merit_order(a: &BalancingAction, b: &BalancingAction) -> Ordering {
    a.price
        .total_cmp(&b.price)
        .then_with(|| a.pair.cmp(&b.pair))
}
