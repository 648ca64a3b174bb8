//! Agency Treasury Core
//!
//! Append-only money ledger with a singleton bank-balance aggregate.
//!
//! # Architecture
//!
//! - **Fact Log**: every money movement is an immutable transaction row
//! - **Single Writer**: one actor task serializes all balance mutations
//! - **Atomic Commits**: fact row and aggregate row land in one batch
//! - **Compensating Reversals**: mistakes are cancelled, never deleted
//!
//! # Invariants
//!
//! - Reconciliation: in-flight balance == signed sum of in-flight facts
//! - Append-only: transactions are never modified or deleted, only
//!   state-transitioned and linked
//! - Consolidated facts are immutable forever

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod money;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use engine::Treasury;
pub use error::{Error, Result};
pub use money::Currency;
pub use storage::Storage;
pub use types::{
    BankAggregate, BankSnapshot, Direction, Movement, Origin, Page, Period, PeriodSummary,
    Transaction, TransactionFilter, TransactionState,
};
