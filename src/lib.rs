//! mp-rebalancer: model-portfolio order generation.
//!
//! Loads target allocations from an MP master CSV, takes a base-currency
//! position snapshot, computes deposit/withdrawal/rebalance trade
//! instructions, and writes them as an order ticket CSV with an audit trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod model;
pub mod orders;
pub mod rebalance;
pub mod snapshot;
pub mod ticket;
