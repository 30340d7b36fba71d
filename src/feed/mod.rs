pub mod cache;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::api::latency::FetchLatency;
use crate::config::{metric_ttl_secs, PROVIDER_RETRY_ATTEMPTS, PROVIDER_RETRY_DELAY_MS};
use crate::providers::ProviderBackend;
use crate::types::{
    BreadthStats, LeaderRow, MacroEvent, MetricKind, MetricPayload, MetricReading, RawAnomaly,
    SectorRow, SentimentStats,
};
use cache::TtlCache;

/// Front door for every metric the pipeline and the API consume. Owns the
/// per-metric provider chains and the TTL cache; absorbs provider failures by
/// retrying, failing over, then serving stale or empty data. `get` never
/// returns an error.
pub struct MarketFeed {
    chains: HashMap<MetricKind, Vec<Arc<dyn ProviderBackend>>>,
    cache: TtlCache<MetricKind, MetricPayload>,
    latency: Arc<FetchLatency>,
    retry_attempts: u32,
    retry_delay: Duration,
    ttl_override: Option<Duration>,
}

impl MarketFeed {
    pub fn new(latency: Arc<FetchLatency>) -> Self {
        Self {
            chains: HashMap::new(),
            cache: TtlCache::new(),
            latency,
            retry_attempts: PROVIDER_RETRY_ATTEMPTS,
            retry_delay: Duration::from_millis(PROVIDER_RETRY_DELAY_MS),
            ttl_override: None,
        }
    }

    /// Providers are tried in the given order; first success wins.
    pub fn register(&mut self, kind: MetricKind, chain: Vec<Arc<dyn ProviderBackend>>) {
        self.chains.insert(kind, chain);
    }

    pub fn with_retry_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Replace every metric's TTL with a fixed value. Tests use this to force
    /// immediate expiry.
    pub fn with_metric_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_override = Some(ttl);
        self
    }

    fn ttl_for(&self, kind: MetricKind) -> Duration {
        self.ttl_override
            .unwrap_or_else(|| Duration::from_secs(metric_ttl_secs(kind)))
    }

    pub async fn get(&self, kind: MetricKind) -> MetricReading {
        if let Some(hit) = self.cache.fresh(&kind) {
            return MetricReading {
                payload: hit,
                degraded: false,
            };
        }

        let Some(chain) = self.chains.get(&kind) else {
            warn!(metric = %kind, "no providers registered");
            return self.degraded(kind);
        };

        for provider in chain {
            for attempt in 1..=self.retry_attempts {
                let started = Instant::now();
                match provider.fetch(kind).await {
                    Ok(payload) => {
                        self.latency.record(kind, started.elapsed());
                        self.cache.put(kind, payload.clone(), self.ttl_for(kind));
                        return MetricReading {
                            payload,
                            degraded: false,
                        };
                    }
                    Err(e) => {
                        let unsupported = matches!(e, crate::error::ProviderError::Unsupported { .. });
                        warn!(
                            metric = %kind,
                            provider = provider.name(),
                            attempt,
                            "fetch failed: {e}"
                        );
                        if unsupported {
                            break;
                        }
                        if attempt < self.retry_attempts {
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
        }

        self.degraded(kind)
    }

    /// Every backend is down: last cached value of any age, else the empty
    /// payload. Both are flagged degraded.
    fn degraded(&self, kind: MetricKind) -> MetricReading {
        if let Some(stale) = self.cache.stale(&kind) {
            warn!(metric = %kind, "all providers failed; serving stale data");
            return MetricReading {
                payload: stale,
                degraded: true,
            };
        }
        warn!(metric = %kind, "all providers failed with cold cache; serving empty data");
        MetricReading {
            payload: MetricPayload::empty(kind),
            degraded: true,
        }
    }

    // -----------------------------------------------------------------------
    // Typed accessors — (value, degraded)
    // -----------------------------------------------------------------------

    pub async fn sentiment(&self) -> (SentimentStats, bool) {
        match self.get(MetricKind::Sentiment).await {
            MetricReading {
                payload: MetricPayload::Sentiment(s),
                degraded,
            } => (s, degraded),
            _ => (SentimentStats::default(), true),
        }
    }

    pub async fn breadth(&self) -> (BreadthStats, bool) {
        match self.get(MetricKind::Breadth).await {
            MetricReading {
                payload: MetricPayload::Breadth(b),
                degraded,
            } => (b, degraded),
            _ => (BreadthStats::default(), true),
        }
    }

    pub async fn anomalies(&self) -> (Vec<RawAnomaly>, bool) {
        match self.get(MetricKind::Anomalies).await {
            MetricReading {
                payload: MetricPayload::Anomalies(a),
                degraded,
            } => (a, degraded),
            _ => (Vec::new(), true),
        }
    }

    pub async fn heatmap(&self) -> (Vec<SectorRow>, bool) {
        match self.get(MetricKind::SectorHeatmap).await {
            MetricReading {
                payload: MetricPayload::SectorHeatmap(h),
                degraded,
            } => (h, degraded),
            _ => (Vec::new(), true),
        }
    }

    pub async fn leaders(&self) -> (Vec<LeaderRow>, bool) {
        match self.get(MetricKind::LeaderStocks).await {
            MetricReading {
                payload: MetricPayload::LeaderStocks(l),
                degraded,
            } => (l, degraded),
            _ => (Vec::new(), true),
        }
    }

    pub async fn calendar(&self) -> (Vec<MacroEvent>, bool) {
        match self.get(MetricKind::MacroCalendar).await {
            MetricReading {
                payload: MetricPayload::MacroCalendar(m),
                degraded,
            } => (m, degraded),
            _ => (Vec::new(), true),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
