//! Core types for the treasury ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (scaled-integer magnitudes, Decimal at the boundary)
//! - Append-only history (facts are never edited, only linked)

use crate::error::{Error, Result};
use crate::money::{self, Currency};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Accounting period label (`YYYY-MM`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period(String);

impl Period {
    /// Build from year and month
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::Other(format!("invalid month: {}", month)));
        }
        Ok(Self(format!("{:04}-{:02}", year, month)))
    }

    /// Parse a `YYYY-MM` label
    pub fn parse(s: &str) -> Result<Self> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| Error::Other(format!("invalid period label: {}", s)))?;
        let year: i32 = year
            .parse()
            .map_err(|_| Error::Other(format!("invalid period label: {}", s)))?;
        let month: u32 = month
            .parse()
            .map_err(|_| Error::Other(format!("invalid period label: {}", s)))?;
        Self::new(year, month)
    }

    /// Period a timestamp falls in
    pub fn from_datetime(at: &DateTime<Utc>) -> Self {
        Self(format!("{:04}-{:02}", at.year(), at.month()))
    }

    /// Current wall-clock period
    pub fn current() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Money entering the bank balance
    Inflow,
    /// Money leaving the bank balance
    Outflow,
}

impl Direction {
    /// Sign applied to the magnitude when summing movements
    pub fn sign(&self) -> i64 {
        match self {
            Direction::Inflow => 1,
            Direction::Outflow => -1,
        }
    }

    /// Opposite direction, used by compensating transactions
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Inflow => Direction::Outflow,
            Direction::Outflow => Direction::Inflow,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inflow => write!(f, "inflow"),
            Direction::Outflow => write!(f, "outflow"),
        }
    }
}

/// Categorical reason code for a transaction.
///
/// Closed enumeration: report builders match exhaustively, so adding an
/// origin is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Commission earnings from represented models
    ModelEarnings,
    /// Recurring fixed cost (hosting, office, subscriptions)
    FixedCost,
    /// Staff payroll
    Payroll,
    /// Manual correction entered by an operator (includes reversals)
    ManualAdjustment,
    /// Bulk cost entry produced by period-close tooling
    CostConsolidation,
}

impl Origin {
    /// Every origin, in report order
    pub const ALL: [Origin; 5] = [
        Origin::ModelEarnings,
        Origin::FixedCost,
        Origin::Payroll,
        Origin::ManualAdjustment,
        Origin::CostConsolidation,
    ];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Origin::ModelEarnings => "model earnings",
            Origin::FixedCost => "fixed cost",
            Origin::Payroll => "payroll",
            Origin::ManualAdjustment => "manual adjustment",
            Origin::CostConsolidation => "cost consolidation",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionState {
    /// Recognized but not yet closed out for a period
    InFlight = 1,
    /// Permanently settled at period close (terminal)
    Consolidated = 2,
    /// Cancelled by a compensating transaction (terminal)
    Reverted = 3,
}

/// One signed monetary fact in the append-only log.
///
/// Immutable once written, except for the lifecycle-state and
/// reversal/consolidation linkage fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Accounting period the fact belongs to
    pub period: Period,

    /// Movement direction; the magnitude itself is unsigned
    pub direction: Direction,

    /// Business origin category
    pub origin: Origin,

    /// Magnitude in stored units (scaled by 10^5, strictly positive)
    pub amount_stored: i64,

    /// Currency
    pub currency: Currency,

    /// Free-text business reason
    pub reason: String,

    /// Originating business record, if any
    pub reference: Option<Uuid>,

    /// Owning entity (model, employee, cost center), if any
    pub owner_ref: Option<String>,

    /// Identity of the creator
    pub created_by: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Lifecycle state
    pub state: TransactionState,

    /// Consolidation timestamp (set when state becomes Consolidated)
    pub consolidated_at: Option<DateTime<Utc>>,

    /// Actor who ran the consolidation
    pub consolidated_by: Option<String>,

    /// Compensating transaction (set when state becomes Reverted)
    pub reverted_by: Option<Uuid>,

    /// Why the transaction was reverted
    pub reversal_reason: Option<String>,

    /// Reversal timestamp
    pub reverted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Magnitude with the direction's sign applied, in stored units
    pub fn signed_stored(&self) -> i64 {
        self.direction.sign() * self.amount_stored
    }

    /// Magnitude as a decimal value
    pub fn amount(&self) -> Decimal {
        money::from_stored(self.amount_stored)
    }
}

/// Singleton mutable balance aggregate.
///
/// Exactly one row exists; it is created lazily with zero balances and
/// mutated only through the ledger engine's single-writer actor. The core
/// invariant: before the next consolidation, `in_flight_stored` equals the
/// signed sum of all in-flight transactions of the current period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAggregate {
    /// Permanently settled balance, adjusted only by consolidation
    pub consolidated_stored: i64,

    /// Balance of movements not yet consolidated
    pub in_flight_stored: i64,

    /// Forward-looking cost projections, not yet real movements
    pub projected_cost_stored: i64,

    /// Ledger currency
    pub currency: Currency,

    /// Period of the most recent movement
    pub current_period: Period,

    /// When the last consolidation ran
    pub last_consolidated_at: Option<DateTime<Utc>>,

    /// Number of period consolidations performed
    pub periods_consolidated: u64,

    /// Lifetime count of movements applied
    pub movements_total: u64,

    /// Lifetime gross inflow volume, stored units
    pub inflow_volume_stored: i64,

    /// Lifetime gross outflow volume, stored units
    pub outflow_volume_stored: i64,
}

impl BankAggregate {
    /// Fresh aggregate with all balances zero
    pub fn new(currency: Currency, period: Period) -> Self {
        Self {
            consolidated_stored: 0,
            in_flight_stored: 0,
            projected_cost_stored: 0,
            currency,
            current_period: period,
            last_consolidated_at: None,
            periods_consolidated: 0,
            movements_total: 0,
            inflow_volume_stored: 0,
            outflow_volume_stored: 0,
        }
    }

    /// Caller-facing view; raw stored magnitudes never cross the boundary
    pub fn snapshot(&self) -> BankSnapshot {
        let consolidated = money::from_stored(self.consolidated_stored);
        let in_flight = money::from_stored(self.in_flight_stored);
        let projected_cost = money::from_stored(self.projected_cost_stored);

        BankSnapshot {
            consolidated,
            in_flight,
            projected_cost,
            total: consolidated + in_flight,
            currency: self.currency,
            current_period: self.current_period.clone(),
            last_consolidated_at: self.last_consolidated_at,
            periods_consolidated: self.periods_consolidated,
            movements_total: self.movements_total,
            consolidated_display: money::format_amount(consolidated, self.currency),
            in_flight_display: money::format_amount(in_flight, self.currency),
        }
    }
}

/// Read-only view of the bank aggregate, in decimal form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankSnapshot {
    /// Permanently settled balance
    pub consolidated: Decimal,

    /// Balance awaiting consolidation
    pub in_flight: Decimal,

    /// Projected (simulated) costs
    pub projected_cost: Decimal,

    /// Consolidated plus in-flight
    pub total: Decimal,

    /// Ledger currency
    pub currency: Currency,

    /// Period of the most recent movement
    pub current_period: Period,

    /// When the last consolidation ran
    pub last_consolidated_at: Option<DateTime<Utc>>,

    /// Number of period consolidations performed
    pub periods_consolidated: u64,

    /// Lifetime count of movements applied
    pub movements_total: u64,

    /// Formatted consolidated balance
    pub consolidated_display: String,

    /// Formatted in-flight balance
    pub in_flight_display: String,
}

/// A money movement submitted to the ledger engine
#[derive(Debug, Clone)]
pub struct Movement {
    /// Movement direction
    pub direction: Direction,

    /// Decimal magnitude (must be strictly positive)
    pub amount: Decimal,

    /// Business reason
    pub reason: String,

    /// Business origin category
    pub origin: Origin,

    /// Originating business record, if any
    pub reference: Option<Uuid>,

    /// Owning entity, if any
    pub owner_ref: Option<String>,

    /// Acting identity; defaults to "system"
    pub actor: Option<String>,

    /// Originating business period; wall-clock period when absent
    pub period: Option<Period>,
}

impl Movement {
    /// New movement with no optional attributes set
    pub fn new(
        direction: Direction,
        amount: Decimal,
        origin: Origin,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            direction,
            amount,
            reason: reason.into(),
            origin,
            reference: None,
            owner_ref: None,
            actor: None,
            period: None,
        }
    }

    /// Attach the originating business record
    pub fn with_reference(mut self, reference: Uuid) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Attach the owning entity
    pub fn with_owner(mut self, owner_ref: impl Into<String>) -> Self {
        self.owner_ref = Some(owner_ref.into());
        self
    }

    /// Attach the acting identity
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Pin the movement to a business period instead of the wall clock
    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }
}

/// Per-origin slice of a period summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginBreakdown {
    /// Origin category
    pub origin: Origin,

    /// Gross inflow for this origin
    pub inflow: Decimal,

    /// Gross outflow for this origin
    pub outflow: Decimal,

    /// Inflow minus outflow
    pub net: Decimal,

    /// Number of transactions
    pub count: u64,
}

/// Aggregation of one period's transaction log.
///
/// Pure projection over the log; the source of truth used to validate the
/// aggregate's in-flight balance and to guard consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// Period summarized
    pub period: Period,

    /// Ledger currency
    pub currency: Currency,

    /// Gross inflow across all origins
    pub total_inflow: Decimal,

    /// Gross outflow across all origins
    pub total_outflow: Decimal,

    /// Inflow minus outflow
    pub net_balance: Decimal,

    /// Per-origin breakdown, covering every origin
    pub by_origin: Vec<OriginBreakdown>,

    /// In-flight transaction count
    pub count_in_flight: u64,

    /// Consolidated transaction count
    pub count_consolidated: u64,
}

/// Filters for listing transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to one period
    pub period: Option<Period>,

    /// Restrict to one direction
    pub direction: Option<Direction>,

    /// Restrict to one origin
    pub origin: Option<Origin>,

    /// Restrict to one lifecycle state
    pub state: Option<TransactionState>,

    /// Restrict to one owning entity
    pub owner_ref: Option<String>,

    /// Restrict to one originating record
    pub reference: Option<Uuid>,

    /// Created at or after this instant
    pub created_after: Option<DateTime<Utc>>,

    /// Created before this instant
    pub created_before: Option<DateTime<Utc>>,

    /// Number of matches to skip
    pub offset: usize,

    /// Page size; 0 means the default of 50
    pub limit: usize,
}

impl TransactionFilter {
    /// Default page size
    pub const DEFAULT_LIMIT: usize = 50;

    /// Effective page size
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            Self::DEFAULT_LIMIT
        } else {
            self.limit
        }
    }

    /// Whether a transaction matches every set filter
    pub fn matches(&self, txn: &Transaction) -> bool {
        if let Some(ref period) = self.period {
            if &txn.period != period {
                return false;
            }
        }
        if let Some(direction) = self.direction {
            if txn.direction != direction {
                return false;
            }
        }
        if let Some(origin) = self.origin {
            if txn.origin != origin {
                return false;
            }
        }
        if let Some(state) = self.state {
            if txn.state != state {
                return false;
            }
        }
        if let Some(ref owner_ref) = self.owner_ref {
            if txn.owner_ref.as_deref() != Some(owner_ref.as_str()) {
                return false;
            }
        }
        if let Some(reference) = self.reference {
            if txn.reference != Some(reference) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if txn.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if txn.created_at >= before {
                return false;
            }
        }
        true
    }
}

/// One page of query results, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Matching items for this page
    pub items: Vec<T>,

    /// Total number of matches across all pages
    pub total: usize,

    /// Offset this page starts at
    pub offset: usize,

    /// Page size used
    pub limit: usize,
}
