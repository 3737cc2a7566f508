//! Read-side aggregations over a snapshot
//!
//! Pure helpers the presentation layer uses for dashboards and reports;
//! nothing here mutates state.

use crate::model::{FuelLog, Transaction};

/// Total fuel spend and volume
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FuelTotals {
    pub total_paid: f64,
    pub total_liters: f64,
}

/// Sum of transaction amounts
pub fn total_sales(transactions: &[Transaction]) -> f64 {
    transactions.iter().map(|t| t.amount).sum()
}

/// Sum of units sold; a missing or zero quantity counts as one unit
pub fn total_units(transactions: &[Transaction]) -> i64 {
    transactions
        .iter()
        .map(|t| if t.quantity > 0 { t.quantity } else { 1 })
        .sum()
}

/// Sales with a timestamp inside `[from, to]`
pub fn sales_between(transactions: &[Transaction], from: i64, to: i64) -> f64 {
    transactions
        .iter()
        .filter(|t| t.timestamp >= from && t.timestamp <= to)
        .map(|t| t.amount)
        .sum()
}

/// Sales since a point in time, typically the start of the week
pub fn weekly_sales(transactions: &[Transaction], since: i64) -> f64 {
    transactions
        .iter()
        .filter(|t| t.timestamp >= since)
        .map(|t| t.amount)
        .sum()
}

/// Progress toward the weekly target, capped at 100
pub fn target_percent(weekly_sales: f64, weekly_target: f64) -> u8 {
    if weekly_target <= 0.0 {
        return 0;
    }
    let percent = (weekly_sales / weekly_target * 100.0).round();
    percent.min(100.0).max(0.0) as u8
}

/// Total spend and liters across fuel logs
pub fn fuel_totals(logs: &[FuelLog]) -> FuelTotals {
    logs.iter().fold(FuelTotals::default(), |acc, log| FuelTotals {
        total_paid: acc.total_paid + log.amount_paid,
        total_liters: acc.total_liters + log.liters,
    })
}
