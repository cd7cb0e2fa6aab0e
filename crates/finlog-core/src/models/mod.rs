use std::fmt::Display;
use std::str::FromStr;

use prettytable::{row, Table};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

pub mod write;

pub const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Revenue,
    Expense,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Revenue => "revenue",
            RecordKind::Expense => "expense",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "revenue" => Ok(RecordKind::Revenue),
            "expense" => Ok(RecordKind::Expense),
            other => Err(format!("unknown record kind: {}", other)),
        }
    }
}

/// A single dated revenue or expense entry, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub id: String,
    pub date: Date,
    pub kind: RecordKind,
    pub amount: Decimal,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub updated_at: OffsetDateTime,
}

impl FinancialRecord {
    /// Identity used for near-duplicate detection. Matches are warned
    /// about at validation time, never rejected.
    pub fn duplicate_key(&self) -> (Date, Decimal, RecordKind) {
        (self.date, self.amount, self.kind)
    }
}

/// Derived totals for one calendar month. `purchases` collects expenses
/// filed under the `purchases` category; `losses` collects every other
/// expense.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyAggregate {
    pub month: u8,
    pub revenue: Decimal,
    pub losses: Decimal,
    pub purchases: Decimal,
}

impl MonthlyAggregate {
    pub fn empty(month: u8) -> Self {
        Self {
            month,
            revenue: Decimal::ZERO,
            losses: Decimal::ZERO,
            purchases: Decimal::ZERO,
        }
    }

    pub fn expenses(&self) -> Decimal {
        self.losses + self.purchases
    }

    pub fn net(&self) -> Decimal {
        self.revenue - self.expenses()
    }

    pub fn is_empty(&self) -> bool {
        self.revenue.is_zero() && self.losses.is_zero() && self.purchases.is_zero()
    }
}

/// Twelve monthly aggregates for a calendar year. Built on demand from the
/// record collection; months without records stay zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSeries {
    pub year: i32,
    pub months: [MonthlyAggregate; 12],
}

impl YearSeries {
    pub fn empty(year: i32) -> Self {
        let months = std::array::from_fn(|m| MonthlyAggregate::empty(m as u8));
        Self { year, months }
    }

    pub fn from_records(year: i32, records: &[FinancialRecord]) -> Self {
        let mut series = Self::empty(year);
        for record in records {
            if record.date.year() != year {
                continue;
            }
            let slot = &mut series.months[record.date.month() as usize - 1];
            match record.kind {
                RecordKind::Revenue => slot.revenue += record.amount,
                RecordKind::Expense => {
                    if record.category.eq_ignore_ascii_case("purchases") {
                        slot.purchases += record.amount;
                    } else {
                        slot.losses += record.amount;
                    }
                }
            }
        }
        series
    }

    pub fn revenue_by_month(&self) -> Vec<f64> {
        self.months.iter().map(|m| decimal_to_f64(m.revenue)).collect()
    }

    pub fn expenses_by_month(&self) -> Vec<f64> {
        self.months.iter().map(|m| decimal_to_f64(m.expenses())).collect()
    }

    pub fn net_by_month(&self) -> Vec<f64> {
        self.months.iter().map(|m| decimal_to_f64(m.net())).collect()
    }

    /// Number of leading months up to and including the last month with any
    /// activity. Trend fitting runs over this window so trailing empty
    /// months do not drag the slope down.
    pub fn observed_len(&self) -> usize {
        self.months
            .iter()
            .rposition(|m| !m.is_empty())
            .map_or(0, |i| i + 1)
    }

    pub fn total_revenue(&self) -> Decimal {
        self.months.iter().map(|m| m.revenue).sum()
    }

    pub fn total_expenses(&self) -> Decimal {
        self.months.iter().map(|m| m.expenses()).sum()
    }
}

pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

impl Display for YearSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Month", "Revenue", "Losses", "Purchases", "Net"]);
        table.add_empty_row();

        for m in &self.months {
            table.add_row(row![
                MONTH_NAMES[m.month as usize],
                m.revenue,
                m.losses,
                m.purchases,
                m.net()
            ]);
        }
        table.add_empty_row();
        table.add_row(row![
            "Total",
            self.total_revenue(),
            "",
            "",
            self.total_revenue() - self.total_expenses()
        ]);

        write!(f, "\n{}\n", table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::Month;

    fn record(date: Date, kind: RecordKind, amount: Decimal, category: &str) -> FinancialRecord {
        let now = OffsetDateTime::UNIX_EPOCH;
        FinancialRecord {
            id: "r1".to_string(),
            date,
            kind,
            amount,
            category: category.to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn year_series_buckets_by_month_and_category() {
        let d = |m, day| Date::from_calendar_date(2023, m, day).unwrap();
        let records = vec![
            record(d(Month::January, 5), RecordKind::Revenue, dec!(1000), "sales"),
            record(d(Month::January, 9), RecordKind::Expense, dec!(200), "rent"),
            record(d(Month::January, 12), RecordKind::Expense, dec!(300), "Purchases"),
            record(d(Month::March, 1), RecordKind::Revenue, dec!(500), "sales"),
            // Wrong year, must be ignored
            record(
                Date::from_calendar_date(2022, Month::March, 1).unwrap(),
                RecordKind::Revenue,
                dec!(999),
                "sales",
            ),
        ];

        let series = YearSeries::from_records(2023, &records);
        assert_eq!(series.months[0].revenue, dec!(1000));
        assert_eq!(series.months[0].losses, dec!(200));
        assert_eq!(series.months[0].purchases, dec!(300));
        assert_eq!(series.months[0].net(), dec!(500));
        assert_eq!(series.months[2].revenue, dec!(500));
        assert_eq!(series.observed_len(), 3);
        assert_eq!(series.total_revenue(), dec!(1500));
    }

    #[test]
    fn empty_series_has_no_observed_months() {
        assert_eq!(YearSeries::empty(2023).observed_len(), 0);
    }

    #[test]
    fn record_kind_parses_case_insensitively() {
        assert_eq!("Revenue".parse::<RecordKind>().unwrap(), RecordKind::Revenue);
        assert_eq!("EXPENSE".parse::<RecordKind>().unwrap(), RecordKind::Expense);
        assert!("transfer".parse::<RecordKind>().is_err());
    }
}
