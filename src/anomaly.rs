use serde::Serialize;

use crate::stats;

pub const DEFAULT_THRESHOLD: f64 = 2.5;
const HIGH_SEVERITY_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub index: usize,
    pub value: f64,
    pub z_score: f64,
    pub severity: Severity,
}

/// Flags points whose z-score against the population mean exceeds the
/// threshold. A zero standard deviation means every value is identical and
/// nothing can be anomalous.
pub fn detect(values: &[f64], threshold: f64) -> Vec<Anomaly> {
    let sd = stats::std_dev(values);
    if sd == 0.0 {
        return Vec::new();
    }
    let mean = stats::mean(values);

    values
        .iter()
        .enumerate()
        .filter_map(|(index, &value)| {
            let z_score = (value - mean).abs() / sd;
            if z_score > threshold {
                let severity = if z_score > HIGH_SEVERITY_THRESHOLD {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Some(Anomaly {
                    index,
                    value,
                    z_score,
                    severity,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn z_score_follows_population_variance() {
        // mean = 28, population variance = 1296, so z(100) = 72 / 36 = 2.0
        let values = [10.0, 10.0, 10.0, 10.0, 100.0];

        let flagged = detect(&values, 1.5);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].index, 4);
        assert!((flagged[0].value - 100.0).abs() < EPS);
        assert!((flagged[0].z_score - 2.0).abs() < EPS);
        assert_eq!(flagged[0].severity, Severity::Medium);

        // 2.0 sits below the default threshold, so nothing is flagged there
        assert!(detect(&values, DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn extreme_outlier_is_high_severity() {
        let mut values = vec![10.0; 19];
        values.push(100.0);
        // mean = 14.5, population variance = 384.75, z(100) ≈ 4.36
        let flagged = detect(&values, DEFAULT_THRESHOLD);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].index, 19);
        assert!(flagged[0].z_score > 3.0);
        assert_eq!(flagged[0].severity, Severity::High);
    }

    #[test]
    fn constant_series_reports_nothing() {
        assert!(detect(&[7.0, 7.0, 7.0], DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn threshold_bounds_are_exclusive() {
        // z-scores of [1, -1] are exactly 1.0; threshold 1.0 must not flag
        assert!(detect(&[1.0, -1.0], 1.0).is_empty());
        assert_eq!(detect(&[1.0, -1.0], 0.9).len(), 2);
    }
}
