//! Descriptive statistics and Student-t confidence intervals.

use statrs::distribution::{ContinuousCDF, StudentsT};

use super::types::{MetricStatistics, Spread};

/// Two-tailed significance level for the reported interval
pub const CONFIDENCE_ALPHA: f64 = 0.05;

/// Calculate mean of a slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Calculate median of a slice
pub fn median(values: &[f64]) -> f64 {
    median_of_sorted(&sorted(values))
}

/// Sample standard deviation (n - 1 denominator); zero below two samples
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Standard error of the mean
pub fn standard_error(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    sample_std_dev(values) / (values.len() as f64).sqrt()
}

/// Two-tailed Student-t critical value at `1 - alpha/2` for `df` degrees of freedom
pub fn t_critical(df: usize, alpha: f64) -> Option<f64> {
    if df == 0 {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, df as f64).ok()?;
    let t = dist.inverse_cdf(1.0 - alpha / 2.0);
    t.is_finite().then_some(t)
}

/// Half-width of the 95% confidence interval of the mean; zero when n < 2
pub fn ci_half_width_95(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    match t_critical(n - 1, CONFIDENCE_ALPHA) {
        Some(t) => standard_error(values) * t,
        None => {
            log::warn!("No Student-t quantile for {} degrees of freedom", n - 1);
            0.0
        }
    }
}

/// Median, min and max of a slice
pub fn spread(values: &[f64]) -> Spread {
    let sorted = sorted(values);
    Spread {
        median: median_of_sorted(&sorted),
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
    }
}

/// Full statistics for one metric over a group of samples
pub fn describe(values: &[f64]) -> MetricStatistics {
    let m = mean(values);
    let half_width = ci_half_width_95(values);
    let Spread { median, min, max } = spread(values);

    MetricStatistics {
        mean: m,
        stderr: standard_error(values),
        ci_half_width_95: half_width,
        ci_lower: m - half_width,
        ci_upper: m + half_width,
        median,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_sample_std_dev() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((sample_std_dev(&values) - 1.5811).abs() < 0.001);
        assert!((standard_error(&values) - 0.7071).abs() < 0.001);
    }

    #[test]
    fn test_t_critical_values() {
        // Standard table values for the 97.5th percentile
        assert!((t_critical(1, 0.05).unwrap() - 12.706).abs() < 0.01);
        assert!((t_critical(4, 0.05).unwrap() - 2.776).abs() < 0.001);
        assert!((t_critical(30, 0.05).unwrap() - 2.042).abs() < 0.001);
        assert!(t_critical(0, 0.05).is_none());
    }

    #[test]
    fn test_describe_single_sample() {
        let stats = describe(&[42.5]);
        assert_eq!(stats.ci_half_width_95, 0.0);
        assert_eq!(stats.stderr, 0.0);
        assert_eq!(stats.mean, 42.5);
        assert_eq!(stats.median, 42.5);
        assert_eq!(stats.min, 42.5);
        assert_eq!(stats.max, 42.5);
        assert_eq!(stats.ci_lower, stats.ci_upper);
    }

    #[test]
    fn test_describe_interval() {
        let stats = describe(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(stats.mean, 3.0);
        // 0.7071 * 2.776
        assert!((stats.ci_half_width_95 - 1.963).abs() < 0.01);
        assert!((stats.ci_upper - stats.ci_lower - 2.0 * stats.ci_half_width_95).abs() < 1e-9);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
    }
}
