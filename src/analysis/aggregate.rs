//! Grouping of run-level samples by experiment key.

use super::stats::describe;
use super::types::*;

/// Anything that can be grouped by experiment key and read per metric
pub trait Sample {
    fn experiment_key(&self) -> f64;
    fn metric(&self, metric: Metric) -> f64;
}

impl Sample for RunSummary {
    fn experiment_key(&self) -> f64 {
        self.experiment_key
    }

    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::LatencyMs => self.average_delay_ms,
            Metric::PacketDeliveryRatio => self.packet_delivery_ratio_percent,
            Metric::Throughput => self.throughput_bytes_per_second,
        }
    }
}

/// A single node's metrics tagged with the key of the run it came from
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSample {
    pub experiment_key: f64,
    pub metrics: NodeMetrics,
}

impl Sample for NodeSample {
    fn experiment_key(&self) -> f64 {
        self.experiment_key
    }

    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::LatencyMs => self.metrics.average_delay_ms,
            Metric::PacketDeliveryRatio => self.metrics.packet_delivery_ratio_percent,
            Metric::Throughput => self.metrics.throughput_bytes_per_second,
        }
    }
}

/// Group samples by key, ascending; NaN keys are dropped
pub fn group_by_key<S: Sample>(samples: &[S]) -> Vec<(f64, Vec<&S>)> {
    let mut sorted: Vec<&S> = samples
        .iter()
        .filter(|s| !s.experiment_key().is_nan())
        .collect();
    sorted.sort_by(|a, b| a.experiment_key().total_cmp(&b.experiment_key()));

    let mut groups: Vec<(f64, Vec<&S>)> = Vec::new();
    for sample in sorted {
        let key = sample.experiment_key();
        if let Some((last_key, members)) = groups.last_mut() {
            if *last_key == key {
                members.push(sample);
                continue;
            }
        }
        groups.push((key, vec![sample]));
    }
    groups
}

/// Compute per-group statistics, ordered by ascending experiment key
pub fn aggregate<S: Sample>(samples: &[S]) -> Vec<GroupStatistics> {
    group_by_key(samples)
        .into_iter()
        .map(|(key, members)| {
            let values = |metric: Metric| -> Vec<f64> {
                members.iter().map(|s| s.metric(metric)).collect()
            };
            let throughput = values(Metric::Throughput);
            let bitrate: Vec<f64> = throughput.iter().map(|bps| bps * 8.0).collect();

            GroupStatistics {
                experiment_key: key,
                runs: members.len(),
                latency_ms: describe(&values(Metric::LatencyMs)),
                packet_delivery_ratio_percent: describe(&values(Metric::PacketDeliveryRatio)),
                throughput_bytes_per_second: describe(&throughput),
                bitrate_bits_per_second: describe(&bitrate),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        key: f64,
        value: f64,
    }

    impl Sample for Point {
        fn experiment_key(&self) -> f64 {
            self.key
        }

        fn metric(&self, _metric: Metric) -> f64 {
            self.value
        }
    }

    fn p(key: f64, value: f64) -> Point {
        Point { key, value }
    }

    #[test]
    fn test_groups_sorted_by_key() {
        let samples = vec![p(20.0, 1.0), p(5.0, 2.0), p(10.0, 3.0)];
        let keys: Vec<f64> = aggregate(&samples).iter().map(|g| g.experiment_key).collect();
        assert_eq!(keys, vec![5.0, 10.0, 20.0]);
    }

    #[test]
    fn test_single_run_group() {
        let groups = aggregate(&[p(5.0, 7.5)]);
        assert_eq!(groups.len(), 1);
        let latency = groups[0].latency_ms;
        assert_eq!(latency.ci_half_width_95, 0.0);
        assert_eq!(latency.mean, 7.5);
        assert_eq!(latency.median, 7.5);
        assert_eq!(latency.min, 7.5);
        assert_eq!(latency.max, 7.5);
    }

    #[test]
    fn test_group_statistics() {
        let samples = vec![p(10.0, 1.0), p(10.0, 3.0), p(30.0, 9.0), p(10.0, 2.0)];
        let groups = aggregate(&samples);
        assert_eq!(groups.len(), 2);

        let first = &groups[0];
        assert_eq!(first.runs, 3);
        assert_eq!(first.throughput_bytes_per_second.mean, 2.0);
        assert_eq!(first.throughput_bytes_per_second.median, 2.0);
        assert_eq!(first.bitrate_bits_per_second.mean, 16.0);
        // s = 1, se = 1/sqrt(3), t(2) = 4.303
        assert!((first.latency_ms.ci_half_width_95 - 4.303 / 3f64.sqrt()).abs() < 0.01);
    }

    #[test]
    fn test_nan_keys_dropped() {
        let groups = aggregate(&[p(f64::NAN, 1.0), p(1.0, 1.0)]);
        assert_eq!(groups.len(), 1);
    }
}
