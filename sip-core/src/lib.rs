#![warn(missing_docs)]
//! Domain models and ports for counterfactual imbalance settlement analysis.
//!
//! A balancing market settles each half-hour period by stacking the accepted
//! balancing actions in merit order and deriving a single system imbalance
//! price from that stack. This crate holds the data types that describe one
//! period of that process, together with the interface traits that external
//! data collaborators implement to supply them.

/// Core domain models for the settlement recalculation engine.
///
/// These are primarily data structures with minimal business logic: the
/// settlement stack and its actions, submitted bid/offer pairs, physical
/// delivery limits, imbalance records, and pricing reference data. The
/// algorithms that operate on them live in the engine crate.
pub mod models;

/// Interface traits for the settlement recalculation engine.
///
/// These traits define the contract between the engine and external adapters
/// (remote reporting APIs, spreadsheet ingestion, and so on) without
/// specifying implementation details, so infrastructure can be swapped out
/// without touching the core logic.
pub mod ports;
