//! Multi-period comparison with trend classification
//!
//! Compares the net balances of a list of periods and classifies the
//! overall tendency by weighing the mean net of the first third of the
//! periods against the mean of the last third. Differences inside a small
//! tolerance band count as flat, so noise does not read as a trend.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use treasury_core::{Currency, Error, Period, Result, Treasury};

/// Overall tendency across the compared periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    /// Net balances are improving
    Rising,
    /// No meaningful change
    Flat,
    /// Net balances are deteriorating
    Falling,
}

/// One period's contribution to the comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodNet {
    /// Period
    pub period: Period,

    /// Gross inflow
    pub total_inflow: Decimal,

    /// Gross outflow
    pub total_outflow: Decimal,

    /// Inflow minus outflow
    pub net: Decimal,
}

/// Comparison across several periods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Per-period nets, in the order supplied
    pub periods: Vec<PeriodNet>,

    /// Ledger currency
    pub currency: Currency,

    /// Mean net of the first third of the periods
    pub mean_first: Decimal,

    /// Mean net of the last third of the periods
    pub mean_last: Decimal,

    /// Classified tendency
    pub trend: Trend,
}

/// Minimum absolute difference that still counts as flat
const FLAT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

/// Relative tolerance: one percent of the larger mean
const FLAT_TOLERANCE_RATIO: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

/// Compare a list of periods and classify the trend
pub fn compare(treasury: &Treasury, periods: &[Period]) -> Result<ComparisonReport> {
    if periods.is_empty() {
        return Err(Error::Other(
            "comparison requires at least one period".to_string(),
        ));
    }

    let mut period_nets = Vec::with_capacity(periods.len());
    for period in periods {
        let summary = treasury.period_summary(period)?;
        period_nets.push(PeriodNet {
            period: period.clone(),
            total_inflow: summary.total_inflow,
            total_outflow: summary.total_outflow,
            net: summary.net_balance,
        });
    }

    let nets: Vec<Decimal> = period_nets.iter().map(|p| p.net).collect();
    let (mean_first, mean_last, trend) = classify_trend(&nets);

    tracing::debug!(
        periods = periods.len(),
        ?trend,
        "Period comparison computed"
    );

    Ok(ComparisonReport {
        periods: period_nets,
        currency: treasury.snapshot()?.currency,
        mean_first,
        mean_last,
        trend,
    })
}

/// Classify the tendency of a series of net balances.
///
/// Compares the mean of the first third against the mean of the last
/// third (at least one period each); returns the two means and the trend.
pub fn classify_trend(nets: &[Decimal]) -> (Decimal, Decimal, Trend) {
    if nets.is_empty() {
        return (Decimal::ZERO, Decimal::ZERO, Trend::Flat);
    }

    let chunk = (nets.len() / 3).max(1);
    let mean_first = mean(&nets[..chunk]);
    let mean_last = mean(&nets[nets.len() - chunk..]);

    let tolerance = FLAT_TOLERANCE.max(mean_first.abs().max(mean_last.abs()) * FLAT_TOLERANCE_RATIO);
    let diff = mean_last - mean_first;

    let trend = if diff.abs() <= tolerance {
        Trend::Flat
    } else if diff > Decimal::ZERO {
        Trend::Rising
    } else {
        Trend::Falling
    };

    (mean_first, mean_last, trend)
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = values.iter().copied().sum();
    sum / Decimal::from(values.len() as u64)
}
