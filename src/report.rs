use std::fmt::Display;

use prettytable::{row, Table};
use rust_decimal::Decimal;
use serde::Serialize;

use finlog_core::models::decimal_to_f64;
use finlog_core::{FinancialRecord, YearSeries, MONTH_NAMES};

use crate::anomaly::{self, Anomaly};
use crate::forecast::{Forecast, ForecastConfig, TrendAnalysis, TrendDirection, TrendForecaster};
use crate::stats::{self, SeriesSummary};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportConfig {
    pub forecast: ForecastConfig,
    pub forecast_periods: u32,
    pub anomaly_threshold: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            forecast: ForecastConfig::default(),
            forecast_periods: 6,
            anomaly_threshold: anomaly::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub net: Decimal,
    pub margin_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterRollup {
    pub quarter: u8,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportStatistics {
    pub revenue: SeriesSummary,
    pub expenses: SeriesSummary,
    pub net: SeriesSummary,
}

/// Everything the presentation layer needs for one year: plain data, no
/// behavior. Anomalies are detected on the monthly expense series; the
/// trend and forecasts run over monthly net income.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub year: i32,
    pub summary: Summary,
    pub quarters: Vec<QuarterRollup>,
    pub statistics: ReportStatistics,
    pub anomalies: Vec<Anomaly>,
    pub trend: TrendAnalysis,
    pub forecasts: Vec<Forecast>,
    pub recommendations: Vec<String>,
}

pub struct ReportBuilder {
    config: ReportConfig,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(ReportConfig::default())
    }
}

impl ReportBuilder {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, records: &[FinancialRecord], year: i32) -> Report {
        let series = YearSeries::from_records(year, records);
        let observed = series.observed_len();

        let revenue = &series.revenue_by_month()[..observed];
        let expenses = &series.expenses_by_month()[..observed];
        let net = &series.net_by_month()[..observed];
        let observations: Vec<(u8, f64)> =
            net.iter().enumerate().map(|(m, v)| (m as u8, *v)).collect();

        let total_revenue = series.total_revenue();
        let total_expenses = series.total_expenses();
        let net_total = total_revenue - total_expenses;
        let margin_pct = if total_revenue.is_zero() {
            0.0
        } else {
            decimal_to_f64(net_total) / decimal_to_f64(total_revenue) * 100.0
        };

        let forecaster = TrendForecaster::new(self.config.forecast);
        let trend = forecaster.trend_analysis(&observations);
        let forecasts = match forecaster.linear_forecast(net, self.config.forecast_periods) {
            Ok(forecasts) => forecasts,
            Err(e) => {
                tracing::debug!(year, "skipping forecast: {}", e);
                Vec::new()
            }
        };
        let anomalies = anomaly::detect(expenses, self.config.anomaly_threshold);

        let summary = Summary {
            total_revenue,
            total_expenses,
            net: net_total,
            margin_pct,
        };

        let recommendations =
            recommendations(&summary, &trend, &anomalies, observed);

        Report {
            year,
            summary,
            quarters: quarter_rollups(&series),
            statistics: ReportStatistics {
                revenue: stats::describe(revenue),
                expenses: stats::describe(expenses),
                net: stats::describe(net),
            },
            anomalies,
            trend,
            forecasts,
            recommendations,
        }
    }
}

fn quarter_rollups(series: &YearSeries) -> Vec<QuarterRollup> {
    (0..4u8)
        .map(|q| {
            let months = &series.months[q as usize * 3..q as usize * 3 + 3];
            let revenue: Decimal = months.iter().map(|m| m.revenue).sum();
            let expenses: Decimal = months.iter().map(|m| m.expenses()).sum();
            QuarterRollup {
                quarter: q + 1,
                revenue,
                expenses,
                net: revenue - expenses,
            }
        })
        .collect()
}

/// Threshold-based recommendation rules. Pure consumer-facing text; the
/// numbers behind them are all in the report itself.
fn recommendations(
    summary: &Summary,
    trend: &TrendAnalysis,
    anomalies: &[Anomaly],
    observed_months: usize,
) -> Vec<String> {
    let mut out = Vec::new();

    if observed_months < 3 {
        out.push("Fewer than three months of data; statistics are preliminary.".to_string());
    }
    if summary.net < Decimal::ZERO {
        out.push("Expenses exceed revenue; review discretionary spending.".to_string());
    }
    if trend.direction == TrendDirection::Falling {
        out.push("Net income is trending down month over month.".to_string());
    }
    if trend.volatility > 0.5 {
        out.push("Monthly results are highly volatile; consider smoothing large purchases.".to_string());
    }
    if !anomalies.is_empty() {
        out.push(format!(
            "{} month(s) show unusual expense levels; review the flagged entries.",
            anomalies.len()
        ));
    }
    if summary.margin_pct > 20.0 {
        out.push("Healthy margin; consider allocating the surplus to reserves.".to_string());
    }
    if out.is_empty() {
        out.push("Finances look stable; keep recording monthly entries.".to_string());
    }

    out
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut summary = Table::new();
        summary.add_row(row!["Revenue", "Expenses", "Net", "Margin %"]);
        summary.add_empty_row();
        summary.add_row(row![
            self.summary.total_revenue,
            self.summary.total_expenses,
            self.summary.net,
            format!("{:.1}", self.summary.margin_pct)
        ]);

        let mut quarters = Table::new();
        quarters.add_row(row!["Quarter", "Revenue", "Expenses", "Net"]);
        quarters.add_empty_row();
        for q in &self.quarters {
            quarters.add_row(row![format!("Q{}", q.quarter), q.revenue, q.expenses, q.net]);
        }

        writeln!(f, "Report for {}", self.year)?;
        writeln!(f, "{}", summary)?;
        writeln!(f, "{}", quarters)?;

        if !self.forecasts.is_empty() {
            let mut forecasts = Table::new();
            forecasts.add_row(row!["Period", "Projected", "Low", "High", "Confidence"]);
            forecasts.add_empty_row();
            for fc in &self.forecasts {
                forecasts.add_row(row![
                    format!("+{}", fc.period),
                    fc.projected,
                    fc.lower,
                    fc.upper,
                    format!("{:.0}%", fc.confidence * 100.0)
                ]);
            }
            writeln!(f, "{}", forecasts)?;
        }

        for a in &self.anomalies {
            writeln!(
                f,
                "Anomaly: {} expenses of {} (z-score {:.2}, {:?})",
                MONTH_NAMES[a.index.min(11)], a.value, a.z_score, a.severity
            )?;
        }
        for r in &self.recommendations {
            writeln!(f, "- {}", r)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finlog_core::RecordKind;
    use rust_decimal_macros::dec;
    use time::{Date, Month, OffsetDateTime};

    fn record(month: Month, kind: RecordKind, amount: Decimal) -> FinancialRecord {
        FinancialRecord {
            id: format!("{:?}-{}-{}", month, kind, amount),
            date: Date::from_calendar_date(2023, month, 15).unwrap(),
            kind,
            amount,
            category: "general".to_string(),
            description: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn seeded_records() -> Vec<FinancialRecord> {
        let months = [
            Month::January,
            Month::February,
            Month::March,
            Month::April,
            Month::May,
            Month::June,
        ];
        let mut records = Vec::new();
        for (i, month) in months.into_iter().enumerate() {
            records.push(record(month, RecordKind::Revenue, dec!(1000) + Decimal::from(i as u32 * 100)));
            records.push(record(month, RecordKind::Expense, dec!(400)));
        }
        records
    }

    #[test]
    fn summary_and_quarters_add_up() {
        let report = ReportBuilder::default().generate(&seeded_records(), 2023);

        assert_eq!(report.summary.total_revenue, dec!(7500));
        assert_eq!(report.summary.total_expenses, dec!(2400));
        assert_eq!(report.summary.net, dec!(5100));
        assert_eq!(report.quarters.len(), 4);
        assert_eq!(report.quarters[0].revenue, dec!(3300));
        assert_eq!(report.quarters[3].revenue, Decimal::ZERO);

        let quarter_net: Decimal = report.quarters.iter().map(|q| q.net).sum();
        assert_eq!(quarter_net, report.summary.net);
    }

    #[test]
    fn rising_revenue_produces_forecasts_and_healthy_margin_advice() {
        let report = ReportBuilder::default().generate(&seeded_records(), 2023);

        assert_eq!(report.forecasts.len(), 6);
        assert_eq!(report.trend.direction, TrendDirection::Rising);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Healthy margin")));
    }

    #[test]
    fn losing_year_recommends_spending_review() {
        let records = vec![
            record(Month::January, RecordKind::Revenue, dec!(100)),
            record(Month::January, RecordKind::Expense, dec!(500)),
            record(Month::February, RecordKind::Expense, dec!(500)),
        ];
        let report = ReportBuilder::default().generate(&records, 2023);

        assert!(report.summary.net < Decimal::ZERO);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Expenses exceed revenue")));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("preliminary")));
    }

    #[test]
    fn empty_year_degrades_gracefully() {
        let report = ReportBuilder::default().generate(&[], 2023);
        assert_eq!(report.summary.net, Decimal::ZERO);
        assert!(report.forecasts.is_empty());
        assert!(report.anomalies.is_empty());
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn report_serializes_for_export_consumers() {
        let report = ReportBuilder::default().generate(&seeded_records(), 2023);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"margin_pct\""));
        assert!(json.contains("\"recommendations\""));
    }
}
