use serde::Serialize;

/// Descriptive statistics over a numeric series.
///
/// `skewness` and `kurtosis` are `None` when the series is too short for
/// their closed-form estimators (n < 3 / n < 4) or when the standard
/// deviation is zero. A constant series has no defined shape, so the
/// undefined case is surfaced as an explicit sentinel instead of a NaN
/// leaking out of a division by zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, not the sample estimator.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Adjusted Fisher-Pearson skewness: `(n/((n-1)(n-2))) * sum(((v-mean)/sd)^3)`.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let sd = std_dev(values);
    if sd == 0.0 {
        return None;
    }
    let m = mean(values);
    let nf = n as f64;
    let sum_cubes: f64 = values.iter().map(|v| ((v - m) / sd).powi(3)).sum();
    Some(nf / ((nf - 1.0) * (nf - 2.0)) * sum_cubes)
}

/// Excess kurtosis with the standard small-sample correction:
/// `(n(n+1))/((n-1)(n-2)(n-3)) * sum(((v-mean)/sd)^4) - 3(n-1)^2/((n-2)(n-3))`.
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let sd = std_dev(values);
    if sd == 0.0 {
        return None;
    }
    let m = mean(values);
    let nf = n as f64;
    let sum_quads: f64 = values.iter().map(|v| ((v - m) / sd).powi(4)).sum();
    let lead = nf * (nf + 1.0) / ((nf - 1.0) * (nf - 2.0) * (nf - 3.0));
    let correction = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    Some(lead * sum_quads - correction)
}

/// Percentile by linear interpolation between the floor and ceil ranks of
/// `p * (n-1)`. Input must already be sorted ascending; `p` is clamped to
/// `[0, 1]`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let weight = rank - lo as f64;
    sorted[lo] + weight * (sorted[hi] - sorted[lo])
}

pub fn describe(values: &[f64]) -> SeriesSummary {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    SeriesSummary {
        count: values.len(),
        mean: mean(values),
        variance: variance(values),
        std_dev: std_dev(values),
        skewness: skewness(values),
        kurtosis: kurtosis(values),
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
        p25: percentile(&sorted, 0.25),
        median: percentile(&sorted, 0.5),
        p75: percentile(&sorted, 0.75),
    }
}
