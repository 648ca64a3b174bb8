//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `treasury_movements_total` - Total number of movements applied
//! - `treasury_consolidations_total` - Total number of period consolidations
//! - `treasury_reversals_total` - Total number of reversals
//! - `treasury_apply_duration_seconds` - Histogram of apply-movement latencies
//! - `treasury_in_flight_balance` - Current in-flight balance (decimal units)

use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total movements applied
    pub movements_total: IntCounter,

    /// Total period consolidations
    pub consolidations_total: IntCounter,

    /// Total reversals
    pub reversals_total: IntCounter,

    /// Apply-movement duration histogram
    pub apply_duration: Histogram,

    /// Current in-flight balance (decimal units)
    pub in_flight_balance: Gauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let movements_total = IntCounter::with_opts(Opts::new(
            "treasury_movements_total",
            "Total number of movements applied",
        ))?;
        registry.register(Box::new(movements_total.clone()))?;

        let consolidations_total = IntCounter::with_opts(Opts::new(
            "treasury_consolidations_total",
            "Total number of period consolidations",
        ))?;
        registry.register(Box::new(consolidations_total.clone()))?;

        let reversals_total = IntCounter::with_opts(Opts::new(
            "treasury_reversals_total",
            "Total number of reversals",
        ))?;
        registry.register(Box::new(reversals_total.clone()))?;

        let apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "treasury_apply_duration_seconds",
                "Histogram of apply-movement latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(apply_duration.clone()))?;

        let in_flight_balance = Gauge::with_opts(Opts::new(
            "treasury_in_flight_balance",
            "Current in-flight balance (decimal units)",
        ))?;
        registry.register(Box::new(in_flight_balance.clone()))?;

        Ok(Self {
            movements_total,
            consolidations_total,
            reversals_total,
            apply_duration,
            in_flight_balance,
            registry,
        })
    }

    /// Record a movement
    pub fn record_movement(&self) {
        self.movements_total.inc();
    }

    /// Record a consolidation
    pub fn record_consolidation(&self) {
        self.consolidations_total.inc();
    }

    /// Record a reversal
    pub fn record_reversal(&self) {
        self.reversals_total.inc();
    }

    /// Record apply-movement duration
    pub fn record_apply_duration(&self, duration_seconds: f64) {
        self.apply_duration.observe(duration_seconds);
    }

    /// Update the in-flight balance gauge
    pub fn update_in_flight(&self, balance: f64) {
        self.in_flight_balance.set(balance);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
