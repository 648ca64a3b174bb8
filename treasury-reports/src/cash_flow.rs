//! Cash-flow statement for one period

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use treasury_core::{Currency, Origin, Period, PeriodSummary, Result, Treasury};

/// One line of a cash-flow statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowLine {
    /// Origin category
    pub origin: Origin,

    /// Gross amount moved by this origin
    pub amount: Decimal,

    /// Share of the side's total (0.0 - 1.0)
    pub share: f64,
}

/// Cash-flow statement for one period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowReport {
    /// Period covered
    pub period: Period,

    /// Ledger currency
    pub currency: Currency,

    /// Inflow lines, largest first
    pub inflows: Vec<CashFlowLine>,

    /// Outflow lines, largest first
    pub outflows: Vec<CashFlowLine>,

    /// Gross inflow
    pub total_inflow: Decimal,

    /// Gross outflow
    pub total_outflow: Decimal,

    /// Inflow minus outflow
    pub net_movement: Decimal,
}

/// Build the cash-flow statement for one period
pub fn cash_flow(treasury: &Treasury, period: &Period) -> Result<CashFlowReport> {
    let summary = treasury.period_summary(period)?;
    Ok(from_summary(summary))
}

/// Derive the statement from an already-computed period summary
pub fn from_summary(summary: PeriodSummary) -> CashFlowReport {
    let mut inflows = Vec::new();
    let mut outflows = Vec::new();

    for breakdown in &summary.by_origin {
        if breakdown.inflow > Decimal::ZERO {
            inflows.push(CashFlowLine {
                origin: breakdown.origin,
                amount: breakdown.inflow,
                share: side_share(breakdown.inflow, summary.total_inflow),
            });
        }
        if breakdown.outflow > Decimal::ZERO {
            outflows.push(CashFlowLine {
                origin: breakdown.origin,
                amount: breakdown.outflow,
                share: side_share(breakdown.outflow, summary.total_outflow),
            });
        }
    }

    inflows.sort_by(|a, b| b.amount.cmp(&a.amount));
    outflows.sort_by(|a, b| b.amount.cmp(&a.amount));

    CashFlowReport {
        period: summary.period,
        currency: summary.currency,
        inflows,
        outflows,
        total_inflow: summary.total_inflow,
        total_outflow: summary.total_outflow,
        net_movement: summary.net_balance,
    }
}

fn side_share(amount: Decimal, total: Decimal) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    (amount / total).to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use treasury_core::types::OriginBreakdown;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn summary_with(breakdowns: Vec<OriginBreakdown>) -> PeriodSummary {
        let total_inflow: Decimal = breakdowns.iter().map(|b| b.inflow).sum();
        let total_outflow: Decimal = breakdowns.iter().map(|b| b.outflow).sum();
        PeriodSummary {
            period: Period::parse("2025-10").unwrap(),
            currency: Currency::EUR,
            total_inflow,
            total_outflow,
            net_balance: total_inflow - total_outflow,
            by_origin: breakdowns,
            count_in_flight: 0,
            count_consolidated: 0,
        }
    }

    fn breakdown(origin: Origin, inflow: &str, outflow: &str) -> OriginBreakdown {
        let inflow = dec(inflow);
        let outflow = dec(outflow);
        OriginBreakdown {
            origin,
            inflow,
            outflow,
            net: inflow - outflow,
            count: 1,
        }
    }

    #[test]
    fn test_sides_are_split_and_sorted() {
        let report = from_summary(summary_with(vec![
            breakdown(Origin::ModelEarnings, "1000", "0"),
            breakdown(Origin::FixedCost, "0", "300"),
            breakdown(Origin::Payroll, "0", "700"),
        ]));

        assert_eq!(report.inflows.len(), 1);
        assert_eq!(report.inflows[0].origin, Origin::ModelEarnings);

        assert_eq!(report.outflows.len(), 2);
        assert_eq!(report.outflows[0].origin, Origin::Payroll);
        assert_eq!(report.outflows[1].origin, Origin::FixedCost);

        assert_eq!(report.total_inflow, dec("1000"));
        assert_eq!(report.total_outflow, dec("1000"));
        assert_eq!(report.net_movement, Decimal::ZERO);
    }

    #[test]
    fn test_shares_sum_to_one() {
        let report = from_summary(summary_with(vec![
            breakdown(Origin::FixedCost, "0", "250"),
            breakdown(Origin::Payroll, "0", "750"),
        ]));

        assert!((report.outflows[0].share - 0.75).abs() < 1e-9);
        assert!((report.outflows[1].share - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_empty_period_yields_empty_statement() {
        let report = from_summary(summary_with(vec![]));
        assert!(report.inflows.is_empty());
        assert!(report.outflows.is_empty());
        assert_eq!(report.net_movement, Decimal::ZERO);
    }
}
