//! In-memory fetch latency histograms, one per metric.
//! The feed records successful provider fetches; the stats API reads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::types::MetricKind;

/// Percentiles in microseconds plus the sample count for one metric.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencySummary {
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub samples: u64,
}

/// Shared fetch latency stats, keyed by metric.
pub struct FetchLatency {
    inner: Mutex<HashMap<MetricKind, hdrhistogram::Histogram<u64>>>,
}

impl FetchLatency {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record one successful fetch. Histograms track 1us to 100s at
    /// 3 significant figures; samples past the bound saturate at it.
    pub fn record(&self, kind: MetricKind, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        let histogram = map.entry(kind).or_insert_with(|| {
            hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
                .expect("valid histogram bounds")
        });
        histogram.saturating_record(us.max(1));
    }

    /// Summary for one metric. None until the first sample lands.
    pub fn summary(&self, kind: MetricKind) -> Option<LatencySummary> {
        let map = self.inner.lock().ok()?;
        let histogram = map.get(&kind)?;
        if histogram.len() == 0 {
            return None;
        }
        Some(LatencySummary {
            p50_us: histogram.value_at_quantile(0.5),
            p95_us: histogram.value_at_quantile(0.95),
            p99_us: histogram.value_at_quantile(0.99),
            samples: histogram.len(),
        })
    }

    /// Per-metric summaries, ordered by metric name.
    pub fn summaries(&self) -> Vec<(MetricKind, LatencySummary)> {
        let Ok(map) = self.inner.lock() else {
            return Vec::new();
        };
        let mut out: Vec<(MetricKind, LatencySummary)> = map
            .iter()
            .filter(|(_, h)| h.len() > 0)
            .map(|(kind, h)| {
                (
                    *kind,
                    LatencySummary {
                        p50_us: h.value_at_quantile(0.5),
                        p95_us: h.value_at_quantile(0.95),
                        p99_us: h.value_at_quantile(0.99),
                        samples: h.len(),
                    },
                )
            })
            .collect();
        out.sort_by_key(|(kind, _)| kind.as_str());
        out
    }

    /// Total samples across all metrics.
    pub fn len(&self) -> u64 {
        self.inner
            .lock()
            .map(|map| map.values().map(|h| h.len()).sum())
            .unwrap_or(0)
    }
}

impl Default for FetchLatency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_are_tracked_per_metric() {
        let latency = FetchLatency::new();
        latency.record(MetricKind::Sentiment, Duration::from_millis(120));
        latency.record(MetricKind::Sentiment, Duration::from_millis(80));
        latency.record(MetricKind::Breadth, Duration::from_millis(40));

        let sentiment = latency.summary(MetricKind::Sentiment).unwrap();
        assert_eq!(sentiment.samples, 2);
        assert!(sentiment.p95_us >= sentiment.p50_us);

        assert_eq!(latency.summaries().len(), 2);
        assert_eq!(latency.len(), 3);
        assert!(latency.summary(MetricKind::LeaderStocks).is_none());
    }

    #[test]
    fn samples_past_the_bound_saturate_instead_of_dropping() {
        let latency = FetchLatency::new();
        latency.record(MetricKind::Anomalies, Duration::from_secs(1_000));

        let summary = latency.summary(MetricKind::Anomalies).unwrap();
        assert_eq!(summary.samples, 1);
        // Clamped to the 100s bound, modulo bucket rounding.
        assert!(summary.p50_us >= 99_000_000 && summary.p50_us <= 101_000_000);
    }
}
