//! Main ledger orchestration layer
//!
//! Ties together storage, the single-writer actor, and metrics into the
//! high-level API the rest of the back office calls. Producers (payroll,
//! commissions, fixed-cost tracking) funnel every money movement through
//! [`Treasury::apply_movement`]; nothing else writes the aggregate.
//!
//! # Example
//!
//! ```no_run
//! use treasury_core::{Config, Treasury};
//!
//! #[tokio::main]
//! async fn main() -> treasury_core::Result<()> {
//!     let config = Config::default();
//!     let treasury = Treasury::open(config).await?;
//!
//!     let snapshot = treasury.snapshot()?;
//!     println!("in flight: {}", snapshot.in_flight_display);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_treasury_actor, TreasuryHandle},
    metrics::Metrics,
    money,
    types::{
        BankAggregate, BankSnapshot, Direction, Movement, Origin, OriginBreakdown, Page, Period,
        PeriodSummary, Transaction, TransactionFilter, TransactionState,
    },
    Config, Error, Result, Storage,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main treasury interface
pub struct Treasury {
    /// Actor handle for mutations
    handle: TreasuryHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Treasury {
    /// Open treasury with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let handle = spawn_treasury_actor(storage.clone(), config.currency);

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Metrics collector, for exposing the registry
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Apply a signed money movement.
    ///
    /// Appends an in-flight fact to the transaction log and adjusts the
    /// aggregate's in-flight balance, atomically. This is the only write
    /// path that moves money.
    pub async fn apply_movement(&self, movement: Movement) -> Result<BankSnapshot> {
        if movement.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "movement magnitude must be positive, got {}",
                movement.amount
            )));
        }

        let started = Instant::now();
        let snapshot = self.handle.apply_movement(movement).await?;

        self.metrics.record_movement();
        self.metrics
            .record_apply_duration(started.elapsed().as_secs_f64());
        self.metrics
            .update_in_flight(snapshot.in_flight.to_f64().unwrap_or(0.0));

        Ok(snapshot)
    }

    /// Consolidate a period: move the in-flight balance into the
    /// consolidated balance and close out the period's in-flight facts.
    pub async fn consolidate_period(
        &self,
        period: Period,
        actor: impl Into<String>,
        notes: Option<String>,
    ) -> Result<BankSnapshot> {
        let snapshot = self
            .handle
            .consolidate_period(period, actor.into(), notes)
            .await?;

        self.metrics.record_consolidation();
        self.metrics
            .update_in_flight(snapshot.in_flight.to_f64().unwrap_or(0.0));

        Ok(snapshot)
    }

    /// Revert a transaction by appending an equal-and-opposite
    /// compensating entry; returns the compensating transaction.
    pub async fn revert_transaction(
        &self,
        id: Uuid,
        reason: impl Into<String>,
        actor: impl Into<String>,
    ) -> Result<Transaction> {
        let compensating = self
            .handle
            .revert_transaction(id, reason.into(), actor.into())
            .await?;

        self.metrics.record_reversal();

        Ok(compensating)
    }

    /// Add a forward-looking cost projection to the simulated balance.
    /// Projections never touch the transaction log or the real balances.
    pub async fn record_projected_cost(&self, amount: Decimal) -> Result<BankSnapshot> {
        self.handle.record_projected_cost(amount).await
    }

    /// Reset the simulated-cost balance
    pub async fn clear_projected_costs(&self) -> Result<BankSnapshot> {
        self.handle.clear_projected_costs().await
    }

    /// Current snapshot of the bank aggregate.
    ///
    /// Before the first movement the aggregate does not exist yet; a
    /// zero-balance snapshot is returned without persisting anything.
    pub fn snapshot(&self) -> Result<BankSnapshot> {
        let bank = self
            .storage
            .get_bank()?
            .unwrap_or_else(|| BankAggregate::new(self.config.currency, Period::current()));
        Ok(bank.snapshot())
    }

    /// List transactions matching a filter, newest first
    pub fn list_transactions(&self, filter: &TransactionFilter) -> Result<Page<Transaction>> {
        self.storage.list_transactions(filter)
    }

    /// Summarize one period's transaction log.
    ///
    /// Pure aggregation over the log: the source of truth used to
    /// validate the aggregate's balance and to guard consolidation.
    /// Reverted facts and their compensating entries are both included;
    /// they cancel in the totals.
    pub fn period_summary(&self, period: &Period) -> Result<PeriodSummary> {
        let txns = self.storage.transactions_for_period(period.as_str())?;
        let currency = self.config.currency;

        let mut count_in_flight = 0u64;
        let mut count_consolidated = 0u64;
        let mut by_origin = Vec::with_capacity(Origin::ALL.len());

        for origin in Origin::ALL {
            let mut inflow_stored = 0i64;
            let mut outflow_stored = 0i64;
            let mut count = 0u64;

            for txn in txns.iter().filter(|t| t.origin == origin) {
                match txn.direction {
                    Direction::Inflow => inflow_stored += txn.amount_stored,
                    Direction::Outflow => outflow_stored += txn.amount_stored,
                }
                count += 1;
            }

            let inflow = money::from_stored(inflow_stored);
            let outflow = money::from_stored(outflow_stored);
            by_origin.push(OriginBreakdown {
                origin,
                inflow,
                outflow,
                net: inflow - outflow,
                count,
            });
        }

        for txn in &txns {
            match txn.state {
                TransactionState::InFlight => count_in_flight += 1,
                TransactionState::Consolidated => count_consolidated += 1,
                TransactionState::Reverted => {}
            }
        }

        let total_inflow: Decimal = by_origin.iter().map(|b| b.inflow).sum();
        let total_outflow: Decimal = by_origin.iter().map(|b| b.outflow).sum();

        Ok(PeriodSummary {
            period: period.clone(),
            currency,
            total_inflow,
            total_outflow,
            net_balance: total_inflow - total_outflow,
            by_origin,
            count_in_flight,
            count_consolidated,
        })
    }

    /// Check the reconciliation invariant: the aggregate's in-flight
    /// balance equals the signed sum of the period's facts whose effect
    /// has not been consolidated yet.
    ///
    /// A reverted fact's effect stays in the in-flight balance (only its
    /// compensating entry cancels it), so it keeps counting until the
    /// consolidation that sweeps its compensating entry out.
    pub fn verify_reconciliation(&self, period: &Period) -> Result<bool> {
        let bank = match self.storage.get_bank()? {
            Some(bank) => bank,
            None => return Ok(true), // nothing recorded yet
        };

        let mut log_sum = 0i64;
        for txn in self.storage.transactions_for_period(period.as_str())? {
            match txn.state {
                TransactionState::InFlight => log_sum += txn.signed_stored(),
                TransactionState::Reverted => {
                    let swept = match txn.reverted_by {
                        Some(comp_id) => {
                            self.storage.get_transaction(comp_id)?.state
                                == TransactionState::Consolidated
                        }
                        None => false,
                    };
                    if !swept {
                        log_sum += txn.signed_stored();
                    }
                }
                TransactionState::Consolidated => {}
            }
        }

        Ok(bank.in_flight_stored == log_sum)
    }

    /// Approximate number of facts in the log
    pub fn transaction_count(&self) -> Result<u64> {
        self.storage.transaction_count()
    }

    /// Shutdown treasury
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    async fn create_test_treasury() -> (Treasury, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Treasury::open(config).await.unwrap(), temp_dir)
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_open_and_zero_snapshot() {
        let (treasury, _temp) = create_test_treasury().await;

        let snapshot = treasury.snapshot().unwrap();
        assert_eq!(snapshot.in_flight, Decimal::ZERO);
        assert_eq!(snapshot.consolidated, Decimal::ZERO);
        assert_eq!(snapshot.movements_total, 0);

        treasury.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_movement_rejects_non_positive() {
        let (treasury, _temp) = create_test_treasury().await;

        let result = treasury
            .apply_movement(Movement::new(
                Direction::Inflow,
                Decimal::ZERO,
                Origin::ModelEarnings,
                "zero",
            ))
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))));

        let result = treasury
            .apply_movement(Movement::new(
                Direction::Outflow,
                dec("-5"),
                Origin::FixedCost,
                "negative",
            ))
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))));

        treasury.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_movement_rejects_excess_precision() {
        let (treasury, _temp) = create_test_treasury().await;

        let result = treasury
            .apply_movement(Movement::new(
                Direction::Inflow,
                dec("1.000001"),
                Origin::ModelEarnings,
                "too precise",
            ))
            .await;
        assert!(matches!(result, Err(Error::Precision(_))));

        treasury.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_period_summary_breakdown() {
        let (treasury, _temp) = create_test_treasury().await;
        let period = Period::parse("2025-10").unwrap();

        treasury
            .apply_movement(
                Movement::new(
                    Direction::Inflow,
                    dec("1960.00"),
                    Origin::ModelEarnings,
                    "october earnings",
                )
                .with_period(period.clone()),
            )
            .await
            .unwrap();
        treasury
            .apply_movement(
                Movement::new(
                    Direction::Outflow,
                    dec("200.00"),
                    Origin::FixedCost,
                    "hosting",
                )
                .with_period(period.clone()),
            )
            .await
            .unwrap();

        let summary = treasury.period_summary(&period).unwrap();
        assert_eq!(summary.total_inflow, dec("1960"));
        assert_eq!(summary.total_outflow, dec("200"));
        assert_eq!(summary.net_balance, dec("1760"));
        assert_eq!(summary.count_in_flight, 2);
        assert_eq!(summary.count_consolidated, 0);

        let earnings = summary
            .by_origin
            .iter()
            .find(|b| b.origin == Origin::ModelEarnings)
            .unwrap();
        assert_eq!(earnings.inflow, dec("1960"));
        assert_eq!(earnings.count, 1);

        let payroll = summary
            .by_origin
            .iter()
            .find(|b| b.origin == Origin::Payroll)
            .unwrap();
        assert_eq!(payroll.count, 0);
        assert_eq!(payroll.net, Decimal::ZERO);

        treasury.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_projected_costs_isolated_from_real_balances() {
        let (treasury, _temp) = create_test_treasury().await;

        treasury
            .apply_movement(Movement::new(
                Direction::Inflow,
                dec("100.00"),
                Origin::ModelEarnings,
                "real money",
            ))
            .await
            .unwrap();

        let snapshot = treasury.record_projected_cost(dec("40.00")).await.unwrap();
        assert_eq!(snapshot.projected_cost, dec("40"));
        assert_eq!(snapshot.in_flight, dec("100"));
        assert_eq!(snapshot.consolidated, Decimal::ZERO);

        let snapshot = treasury.record_projected_cost(dec("10.00")).await.unwrap();
        assert_eq!(snapshot.projected_cost, dec("50"));

        let snapshot = treasury.clear_projected_costs().await.unwrap();
        assert_eq!(snapshot.projected_cost, Decimal::ZERO);
        assert_eq!(snapshot.in_flight, dec("100"));

        treasury.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_reconciliation() {
        let (treasury, _temp) = create_test_treasury().await;
        let period = Period::current();

        assert!(treasury.verify_reconciliation(&period).unwrap());

        treasury
            .apply_movement(Movement::new(
                Direction::Inflow,
                dec("75.50"),
                Origin::ModelEarnings,
                "entry",
            ))
            .await
            .unwrap();
        treasury
            .apply_movement(Movement::new(
                Direction::Outflow,
                dec("25.50"),
                Origin::Payroll,
                "salary slice",
            ))
            .await
            .unwrap();

        assert!(treasury.verify_reconciliation(&period).unwrap());

        treasury.shutdown().await.unwrap();
    }
}
