use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::stats;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("insufficient data: need at least {needed} data points, got {got}")]
    InsufficientData { needed: usize, got: usize },
}

/// Confidence decay policy shared by all forecast methods: confidence starts
/// at `1 - decay_rate` for the first projected period, decreases linearly
/// with distance, and never drops below `floor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastConfig {
    pub decay_rate: f64,
    pub confidence_floor: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.1,
            confidence_floor: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub period: u32,
    pub projected: Decimal,
    pub confidence: f64,
    pub lower: Decimal,
    pub upper: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

/// Trend summary over a monthly series. Seasonal offsets here are additive
/// (month average minus overall average); the multiplicative ratio form is
/// reserved for `seasonal_forecast`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub slope: f64,
    pub direction: TrendDirection,
    pub growth_rate: f64,
    pub volatility: f64,
    pub seasonal_offsets: Vec<f64>,
}

/// Ordinary least-squares slope of `values` against the index `0..n`.
/// Series shorter than two points have no trend and short-circuit to 0.
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, v)| i as f64 * v).sum();
    let sum_x2: f64 = (0..n).map(|i| (i as f64).powi(2)).sum();

    let denominator = nf * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (nf * sum_xy - sum_x * sum_y) / denominator
}

/// Geometric mean growth per period over the strictly positive values:
/// `(last/first)^(1/(k-1)) - 1`. Fewer than two positive values yield 0.
pub fn growth_rate(values: &[f64]) -> f64 {
    let positives: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if positives.len() < 2 {
        return 0.0;
    }
    let first = positives[0];
    let last = positives[positives.len() - 1];
    (last / first).powf(1.0 / (positives.len() - 1) as f64) - 1.0
}

/// Multiplicative seasonal index: the average of `month`'s observations
/// divided by the overall average. Neutral (1.0) when the month was never
/// observed or the overall average is zero.
pub fn seasonal_ratio(observations: &[(u8, f64)], month: u8) -> f64 {
    let overall = stats::mean(&observations.iter().map(|(_, v)| *v).collect::<Vec<_>>());
    if overall == 0.0 {
        return 1.0;
    }
    let month_values: Vec<f64> = observations
        .iter()
        .filter(|(m, _)| *m == month)
        .map(|(_, v)| *v)
        .collect();
    if month_values.is_empty() {
        return 1.0;
    }
    stats::mean(&month_values) / overall
}

/// Additive seasonal index: the average of `month`'s observations minus the
/// overall average. Zero when the month was never observed.
pub fn seasonal_offset(observations: &[(u8, f64)], month: u8) -> f64 {
    let month_values: Vec<f64> = observations
        .iter()
        .filter(|(m, _)| *m == month)
        .map(|(_, v)| *v)
        .collect();
    if month_values.is_empty() {
        return 0.0;
    }
    let overall = stats::mean(&observations.iter().map(|(_, v)| *v).collect::<Vec<_>>());
    stats::mean(&month_values) - overall
}

pub struct TrendForecaster {
    config: ForecastConfig,
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self::new(ForecastConfig::default())
    }
}

impl TrendForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    fn confidence(&self, period: u32) -> f64 {
        (1.0 - self.config.decay_rate * period as f64).max(self.config.confidence_floor)
    }

    fn build(&self, period: u32, projected: f64, spread: f64) -> Forecast {
        let projected = projected.max(0.0);
        let margin = spread * (period as f64).sqrt();
        Forecast {
            period,
            projected: to_money(projected),
            confidence: self.confidence(period),
            lower: to_money((projected - margin).max(0.0)),
            upper: to_money(projected + margin),
        }
    }

    /// Projects `last + slope * i` for each future period, floored at zero.
    pub fn linear_forecast(
        &self,
        values: &[f64],
        periods: u32,
    ) -> Result<Vec<Forecast>, ForecastError> {
        if values.len() < 2 {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                got: values.len(),
            });
        }
        let slope = slope(values);
        let last = values[values.len() - 1];
        let spread = stats::std_dev(values);

        Ok((1..=periods)
            .map(|i| self.build(i, last + slope * i as f64, spread))
            .collect())
    }

    /// Projects `last * (1 + growth_rate)^i` for each future period.
    pub fn exponential_forecast(
        &self,
        values: &[f64],
        periods: u32,
    ) -> Result<Vec<Forecast>, ForecastError> {
        if values.len() < 2 {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                got: values.len(),
            });
        }
        let rate = growth_rate(values);
        let last = values[values.len() - 1];
        let spread = stats::std_dev(values);

        Ok((1..=periods)
            .map(|i| self.build(i, last * (1.0 + rate).powi(i as i32), spread))
            .collect())
    }

    /// Combines the linear trend projection with the multiplicative seasonal
    /// ratio of each target month. Needs a full year of observations; with
    /// fewer than 12 points the result is an empty sequence by policy, not
    /// an error.
    pub fn seasonal_forecast(
        &self,
        observations: &[(u8, f64)],
        periods: u32,
    ) -> Vec<Forecast> {
        if observations.len() < 12 {
            return Vec::new();
        }
        let values: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
        let slope = slope(&values);
        let last = values[values.len() - 1];
        let last_month = observations[observations.len() - 1].0;
        let spread = stats::std_dev(&values);

        (1..=periods)
            .map(|i| {
                let target_month = (u32::from(last_month) + i) % 12;
                let trend = last + slope * i as f64;
                let projected = trend * seasonal_ratio(observations, target_month as u8);
                self.build(i, projected, spread)
            })
            .collect()
    }

    /// Slope, direction, growth and volatility for a monthly series, with
    /// additive seasonal offsets per calendar month.
    pub fn trend_analysis(&self, observations: &[(u8, f64)]) -> TrendAnalysis {
        let values: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
        let slope = slope(&values);
        let mean = stats::mean(&values);
        let volatility = if mean == 0.0 {
            0.0
        } else {
            stats::std_dev(&values) / mean.abs()
        };
        let direction = if slope > 0.0 {
            TrendDirection::Rising
        } else if slope < 0.0 {
            TrendDirection::Falling
        } else {
            TrendDirection::Flat
        };

        TrendAnalysis {
            slope,
            direction,
            growth_rate: growth_rate(&values),
            volatility,
            seasonal_offsets: (0..12u8)
                .map(|m| seasonal_offset(observations, m))
                .collect(),
        }
    }
}

fn to_money(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
}
