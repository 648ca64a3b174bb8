//! Derived reporting views over the treasury ledger
//!
//! Read-only projections (cash-flow statement, multi-period comparison)
//! computed on demand from the transaction log's period summaries. Nothing
//! here is persisted as separate truth, so these views cannot drift from
//! the log.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod cash_flow;
pub mod comparison;

pub use cash_flow::{cash_flow, CashFlowLine, CashFlowReport};
pub use comparison::{compare, ComparisonReport, PeriodNet, Trend};
