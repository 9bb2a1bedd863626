//! Aggregator service for reducing stats samples

use crate::types::{FieldReport, Sample, Trend};

/// Aggregator for summing sample fields
pub struct Aggregator;

impl Aggregator {
    /// Sum one field across samples. Samples without the field contribute zero.
    pub fn sum_field(samples: &[Sample], field: &str) -> f64 {
        samples.iter().map(|s| s.value(field)).sum()
    }

    /// Sum each of `fields` across samples, in field order
    pub fn sum_fields<S: AsRef<str>>(samples: &[Sample], fields: &[S]) -> Vec<(String, f64)> {
        fields
            .iter()
            .map(|f| (f.as_ref().to_string(), Self::sum_field(samples, f.as_ref())))
            .collect()
    }
}

/// Human-readable magnitude: "1.5K (1500)" from 1000 upwards, the plain
/// integer below.
pub fn format_magnitude(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.1}K ({})", value / 1000.0, value as i64)
    } else {
        format!("{}", value as i64)
    }
}

/// Per-field accumulation across the intervals of one streaming session
#[derive(Debug, Clone)]
pub struct RunningTotal {
    fields: Vec<String>,
    totals: Vec<f64>,
    last_interval: Vec<f64>,
    previous_interval: Vec<f64>,
    intervals: u32,
}

impl RunningTotal {
    /// Zeroed totals over a fixed set of tracked fields
    pub fn new<S: AsRef<str>>(fields: &[S]) -> Self {
        let fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
        let zeros = vec![0.0; fields.len()];
        Self {
            fields,
            totals: zeros.clone(),
            last_interval: zeros.clone(),
            previous_interval: zeros,
            intervals: 0,
        }
    }

    /// Fold one interval's samples in. Returns the interval sums per field.
    pub fn add_interval(&mut self, samples: &[Sample]) -> Vec<(String, f64)> {
        let sums = Aggregator::sum_fields(samples, &self.fields);
        self.previous_interval = std::mem::take(&mut self.last_interval);
        self.last_interval = sums.iter().map(|(_, v)| *v).collect();
        for (total, (_, v)) in self.totals.iter_mut().zip(&sums) {
            *total += v;
        }
        self.intervals += 1;
        sums
    }

    pub fn total(&self, field: &str) -> Option<f64> {
        self.fields
            .iter()
            .position(|f| f == field)
            .map(|i| self.totals[i])
    }

    pub fn intervals(&self) -> u32 {
        self.intervals
    }

    /// Cumulative view with last-interval values and trend vs. the interval before
    pub fn reports(&self) -> Vec<FieldReport> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, field)| FieldReport {
                field: field.clone(),
                total: self.totals[i],
                last_interval: Some(self.last_interval[i]),
                trend: if self.intervals == 0 {
                    Trend::Flat
                } else {
                    Trend::between(self.previous_interval[i], self.last_interval[i])
                },
            })
            .collect()
    }

    /// Cumulative view without interval detail
    pub fn totals(&self) -> Vec<FieldReport> {
        self.fields
            .iter()
            .zip(&self.totals)
            .map(|(field, total)| FieldReport {
                field: field.clone(),
                total: *total,
                last_interval: None,
                trend: Trend::Flat,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pairs: &[(&str, f64)]) -> Sample {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    // ========== sum_field ==========

    #[test]
    fn test_sum_field_missing_is_zero() {
        let samples = vec![sample(&[("a", 1.0)]), sample(&[("b", 2.0)])];
        assert_eq!(Aggregator::sum_field(&samples, "a"), 1.0);
        assert_eq!(Aggregator::sum_field(&samples, "b"), 2.0);
        assert_eq!(Aggregator::sum_field(&samples, "c"), 0.0);
    }

    #[test]
    fn test_sum_field_empty() {
        assert_eq!(Aggregator::sum_field(&[], "requests"), 0.0);
    }

    #[test]
    fn test_sum_fields_keeps_order() {
        let samples = vec![
            sample(&[("hits", 3.0), ("miss", 1.0)]),
            sample(&[("hits", 4.0), ("requests", 10.0)]),
        ];
        let sums = Aggregator::sum_fields(&samples, &["requests", "hits", "miss"]);
        assert_eq!(
            sums,
            vec![
                ("requests".to_string(), 10.0),
                ("hits".to_string(), 7.0),
                ("miss".to_string(), 1.0),
            ]
        );
    }

    // ========== format_magnitude ==========

    #[test]
    fn test_format_below_thousand() {
        assert_eq!(format_magnitude(0.0), "0");
        assert_eq!(format_magnitude(42.0), "42");
        assert_eq!(format_magnitude(999.0), "999");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_magnitude(1000.0), "1.0K (1000)");
        assert_eq!(format_magnitude(1530.0), "1.5K (1530)");
        assert_eq!(format_magnitude(12_345.0), "12.3K (12345)");
        assert_eq!(format_magnitude(2_000_000.0), "2000.0K (2000000)");
    }

    // ========== RunningTotal ==========

    #[test]
    fn test_running_total_starts_zeroed() {
        let running = RunningTotal::new(&["hits", "miss"]);
        assert_eq!(running.total("hits"), Some(0.0));
        assert_eq!(running.total("nope"), None);
        assert_eq!(running.intervals(), 0);
        assert!(running.reports().iter().all(|r| r.trend == Trend::Flat));
    }

    #[test]
    fn test_running_total_accumulates_intervals() {
        let mut running = RunningTotal::new(&["hits", "miss"]);

        let first = running.add_interval(&[sample(&[("hits", 5.0)]), sample(&[("hits", 1.0)])]);
        assert_eq!(first[0], ("hits".to_string(), 6.0));

        running.add_interval(&[sample(&[("hits", 2.0), ("miss", 3.0)])]);

        assert_eq!(running.total("hits"), Some(8.0));
        assert_eq!(running.total("miss"), Some(3.0));
        assert_eq!(running.intervals(), 2);
    }

    #[test]
    fn test_running_total_trend_vs_previous_interval() {
        let mut running = RunningTotal::new(&["hits", "miss", "requests"]);
        running.add_interval(&[sample(&[("hits", 5.0), ("miss", 1.0), ("requests", 4.0)])]);
        running.add_interval(&[sample(&[("hits", 2.0), ("miss", 3.0), ("requests", 4.0)])]);

        let reports = running.reports();
        assert_eq!(reports[0].trend, Trend::Down);
        assert_eq!(reports[0].last_interval, Some(2.0));
        assert_eq!(reports[1].trend, Trend::Up);
        assert_eq!(reports[2].trend, Trend::Flat);
        assert_eq!(reports[2].total, 8.0);
    }

    #[test]
    fn test_first_interval_trend_vs_zero() {
        let mut running = RunningTotal::new(&["hits"]);
        running.add_interval(&[sample(&[("hits", 1.0)])]);
        assert_eq!(running.reports()[0].trend, Trend::Up);
    }
}
