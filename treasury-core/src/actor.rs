//! Actor-based concurrency for the ledger
//!
//! Single-writer pattern using a Tokio actor: every balance mutation
//! (apply-movement, consolidation transfer, reversal, projected-cost
//! updates) is a message processed by one task. Each mutation reads the
//! singleton aggregate, adjusts it, and commits in one `WriteBatch`, so
//! concurrent producers cannot lose an update and the transaction log
//! cannot diverge from the balance.
//!
//! Reads (snapshots, listings, summaries) do not go through the mailbox;
//! they hit storage directly and are advisory with respect to concurrent
//! appends.

use crate::money::{self, Currency};
use crate::types::{
    BankAggregate, BankSnapshot, Direction, Movement, Origin, Period, Transaction,
    TransactionState,
};
use crate::{Error, Result, Storage};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the treasury actor
pub enum TreasuryMessage {
    /// Apply a signed money movement
    ApplyMovement {
        movement: Movement,
        response: oneshot::Sender<Result<BankSnapshot>>,
    },

    /// Consolidate a period: transfer in-flight into consolidated
    ConsolidatePeriod {
        period: Period,
        actor_id: String,
        notes: Option<String>,
        response: oneshot::Sender<Result<BankSnapshot>>,
    },

    /// Revert a transaction via a compensating entry
    RevertTransaction {
        id: Uuid,
        reason: String,
        actor_id: String,
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Add to the simulated-cost balance
    RecordProjectedCost {
        amount: Decimal,
        response: oneshot::Sender<Result<BankSnapshot>>,
    },

    /// Reset the simulated-cost balance
    ClearProjectedCosts {
        response: oneshot::Sender<Result<BankSnapshot>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that serializes all aggregate mutations
pub struct TreasuryActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Ledger currency
    currency: Currency,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<TreasuryMessage>,
}

impl TreasuryActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        currency: Currency,
        mailbox: mpsc::Receiver<TreasuryMessage>,
    ) -> Self {
        Self {
            storage,
            currency,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                TreasuryMessage::Shutdown => break,

                TreasuryMessage::ApplyMovement { movement, response } => {
                    let _ = response.send(self.handle_apply(movement));
                }

                TreasuryMessage::ConsolidatePeriod {
                    period,
                    actor_id,
                    notes,
                    response,
                } => {
                    let _ = response.send(self.handle_consolidate(period, actor_id, notes));
                }

                TreasuryMessage::RevertTransaction {
                    id,
                    reason,
                    actor_id,
                    response,
                } => {
                    let _ = response.send(self.handle_revert(id, reason, actor_id));
                }

                TreasuryMessage::RecordProjectedCost { amount, response } => {
                    let _ = response.send(self.handle_record_projected_cost(amount));
                }

                TreasuryMessage::ClearProjectedCosts { response } => {
                    let _ = response.send(self.handle_clear_projected_costs());
                }
            }
        }
    }

    /// Build the fact row for a movement
    fn next_transaction(&self, movement: &Movement, now: DateTime<Utc>) -> Result<Transaction> {
        let amount_stored = money::to_stored(movement.amount, self.currency)?;
        if amount_stored <= 0 {
            return Err(Error::InvalidAmount(format!(
                "movement magnitude must be positive, got {}",
                movement.amount
            )));
        }

        let period = movement
            .period
            .clone()
            .unwrap_or_else(|| Period::from_datetime(&now));

        Ok(Transaction {
            id: Uuid::now_v7(),
            period,
            direction: movement.direction,
            origin: movement.origin,
            amount_stored,
            currency: self.currency,
            reason: movement.reason.clone(),
            reference: movement.reference,
            owner_ref: movement.owner_ref.clone(),
            created_by: movement
                .actor
                .clone()
                .unwrap_or_else(|| "system".to_string()),
            created_at: now,
            state: TransactionState::InFlight,
            consolidated_at: None,
            consolidated_by: None,
            reverted_by: None,
            reversal_reason: None,
            reverted_at: None,
        })
    }

    /// Fold one transaction into the aggregate
    fn apply_to_bank(bank: &mut BankAggregate, txn: &Transaction) {
        bank.in_flight_stored += txn.signed_stored();
        bank.movements_total += 1;
        match txn.direction {
            Direction::Inflow => bank.inflow_volume_stored += txn.amount_stored,
            Direction::Outflow => bank.outflow_volume_stored += txn.amount_stored,
        }
        if txn.period > bank.current_period {
            bank.current_period = txn.period.clone();
        }
    }

    /// Idempotent get-or-create for the singleton aggregate
    fn get_or_create_bank(&self, period: &Period) -> Result<BankAggregate> {
        Ok(self
            .storage
            .get_bank()?
            .unwrap_or_else(|| BankAggregate::new(self.currency, period.clone())))
    }

    fn handle_apply(&self, movement: Movement) -> Result<BankSnapshot> {
        let now = Utc::now();
        let txn = self.next_transaction(&movement, now)?;
        let mut bank = self.get_or_create_bank(&txn.period)?;

        Self::apply_to_bank(&mut bank, &txn);
        if let Err(e) = self.storage.apply_movement_atomic(&txn, &bank) {
            // Not retried: retry policy belongs to the caller
            tracing::error!(
                direction = %txn.direction,
                amount = %txn.amount(),
                reason = %txn.reason,
                error = %e,
                "Movement failed to commit"
            );
            return Err(e);
        }

        tracing::info!(
            txn_id = %txn.id,
            direction = %txn.direction,
            amount = %txn.amount(),
            period = %txn.period,
            reason = %txn.reason,
            "Movement applied"
        );

        Ok(bank.snapshot())
    }

    fn handle_consolidate(
        &self,
        period: Period,
        actor_id: String,
        notes: Option<String>,
    ) -> Result<BankSnapshot> {
        let mut bank = self.get_or_create_bank(&period)?;

        // An empty consolidation is valid; it means no activity occurred
        if bank.in_flight_stored == 0 {
            tracing::warn!(period = %period, "Consolidating with zero in-flight balance");
        }

        // Guard against double-consolidation and against drift between
        // the aggregate and the log
        let in_flight_count = self
            .storage
            .transactions_for_period(period.as_str())?
            .iter()
            .filter(|t| t.state == TransactionState::InFlight)
            .count();
        if in_flight_count == 0 {
            return Err(Error::NothingToConsolidate(period.to_string()));
        }

        let now = Utc::now();
        bank.consolidated_stored += bank.in_flight_stored;
        bank.in_flight_stored = 0;
        bank.periods_consolidated += 1;
        bank.last_consolidated_at = Some(now);
        self.storage.put_bank(&bank)?;

        // Separate, idempotent step: a partial failure leaves rows still
        // in-flight, repaired by running consolidation's transition again
        let moved = self
            .storage
            .mark_period_consolidated(period.as_str(), &actor_id, now)?;

        tracing::info!(
            period = %period,
            moved,
            actor = %actor_id,
            notes = ?notes,
            "Period consolidated"
        );

        Ok(bank.snapshot())
    }

    fn handle_revert(&self, id: Uuid, reason: String, actor_id: String) -> Result<Transaction> {
        let mut original = self.storage.get_transaction(id)?;

        match original.state {
            TransactionState::Consolidated => {
                return Err(Error::AlreadyConsolidated(id.to_string()))
            }
            TransactionState::Reverted => return Err(Error::AlreadyReverted(id.to_string())),
            TransactionState::InFlight => {}
        }

        let now = Utc::now();
        let mut movement = Movement::new(
            original.direction.opposite(),
            original.amount(),
            Origin::ManualAdjustment,
            format!("reversal of {}: {}", original.id, reason),
        )
        .with_reference(original.id)
        .with_actor(actor_id.clone())
        .with_period(original.period.clone());
        // The compensating entry stays attributable to the same owner
        movement.owner_ref = original.owner_ref.clone();

        let compensating = self.next_transaction(&movement, now)?;
        let mut bank = self.get_or_create_bank(&original.period)?;
        Self::apply_to_bank(&mut bank, &compensating);

        original.state = TransactionState::Reverted;
        original.reverted_by = Some(compensating.id);
        original.reversal_reason = Some(reason);
        original.reverted_at = Some(now);

        self.storage
            .apply_reversal_atomic(&original, &compensating, &bank)?;

        tracing::info!(
            original = %original.id,
            compensating = %compensating.id,
            actor = %actor_id,
            "Transaction reverted"
        );

        Ok(compensating)
    }

    fn handle_record_projected_cost(&self, amount: Decimal) -> Result<BankSnapshot> {
        let stored = money::to_stored(amount, self.currency)?;
        if stored <= 0 {
            return Err(Error::InvalidAmount(format!(
                "projected cost must be positive, got {}",
                amount
            )));
        }

        let mut bank = self.get_or_create_bank(&Period::current())?;
        bank.projected_cost_stored += stored;
        self.storage.put_bank(&bank)?;

        tracing::debug!(amount = %amount, "Projected cost recorded");

        Ok(bank.snapshot())
    }

    fn handle_clear_projected_costs(&self) -> Result<BankSnapshot> {
        let mut bank = self.get_or_create_bank(&Period::current())?;
        bank.projected_cost_stored = 0;
        self.storage.put_bank(&bank)?;

        Ok(bank.snapshot())
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct TreasuryHandle {
    sender: mpsc::Sender<TreasuryMessage>,
}

impl TreasuryHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<TreasuryMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        msg: TreasuryMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Apply a movement
    pub async fn apply_movement(&self, movement: Movement) -> Result<BankSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.request(
            TreasuryMessage::ApplyMovement {
                movement,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Consolidate a period
    pub async fn consolidate_period(
        &self,
        period: Period,
        actor_id: String,
        notes: Option<String>,
    ) -> Result<BankSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.request(
            TreasuryMessage::ConsolidatePeriod {
                period,
                actor_id,
                notes,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Revert a transaction
    pub async fn revert_transaction(
        &self,
        id: Uuid,
        reason: String,
        actor_id: String,
    ) -> Result<Transaction> {
        let (tx, rx) = oneshot::channel();
        self.request(
            TreasuryMessage::RevertTransaction {
                id,
                reason,
                actor_id,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Record a projected cost
    pub async fn record_projected_cost(&self, amount: Decimal) -> Result<BankSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.request(
            TreasuryMessage::RecordProjectedCost {
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Clear projected costs
    pub async fn clear_projected_costs(&self) -> Result<BankSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.request(TreasuryMessage::ClearProjectedCosts { response: tx }, rx)
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(TreasuryMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the treasury actor
pub fn spawn_treasury_actor(storage: Arc<Storage>, currency: Currency) -> TreasuryHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = TreasuryActor::new(storage, currency, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    TreasuryHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use crate::Config;

    fn test_storage() -> (Arc<Storage>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Arc::new(Storage::open(&config).unwrap()), temp_dir)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (storage, _temp) = test_storage();
        let handle = spawn_treasury_actor(storage, Currency::EUR);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_apply_movement() {
        let (storage, _temp) = test_storage();
        let handle = spawn_treasury_actor(storage.clone(), Currency::EUR);

        let snapshot = handle
            .apply_movement(Movement::new(
                Direction::Inflow,
                Decimal::new(50000, 2), // 500.00
                Origin::ModelEarnings,
                "october commissions",
            ))
            .await
            .unwrap();

        assert_eq!(snapshot.in_flight, Decimal::new(500, 0));
        assert_eq!(snapshot.movements_total, 1);

        // The fact row landed with the aggregate
        let bank = storage.get_bank().unwrap().unwrap();
        assert_eq!(bank.in_flight_stored, 50_000_000);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_concurrent_movements_lose_nothing() {
        let (storage, _temp) = test_storage();
        let handle = spawn_treasury_actor(storage, Currency::EUR);

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .apply_movement(Movement::new(
                        Direction::Inflow,
                        Decimal::new(1000, 2), // 10.00
                        Origin::ModelEarnings,
                        "concurrent entry",
                    ))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let period = Period::current();
        let snapshot = handle
            .consolidate_period(period, "ops".to_string(), None)
            .await
            .unwrap();
        assert_eq!(snapshot.consolidated, Decimal::new(200, 0));
        assert_eq!(snapshot.in_flight, Decimal::ZERO);

        handle.shutdown().await.unwrap();
    }
}
