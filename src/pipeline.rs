use std::sync::Arc;

use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::config::BURST_WINDOW_SECS;
use crate::db::{AnomalyStore, SignalStore};
use crate::error::Result;
use crate::escalation::Escalator;
use crate::feed::MarketFeed;
use crate::history::MoodHistory;
use crate::rules::classifier::classify;
use crate::rules::engine::{self, BurstCounts, RuleThresholds};
use crate::rules::mood::build_snapshot;
use crate::state::SnapshotStore;
use crate::types::{AnomalyEvent, Trend};

/// One full acquisition → classification → escalation pass. The scheduler
/// drives this through the trait so its loop can be tested without feeds
/// or a database.
#[async_trait::async_trait]
pub trait PollCycle: Send + Sync {
    async fn run_cycle(&self) -> Result<CycleReport>;
}

/// What one cycle did, for the loop log and for tests.
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    pub mood_index: f64,
    pub trend: Trend,
    pub new_events: u64,
    pub signals_created: u32,
    pub signals_deduped: u32,
    pub degraded: bool,
}

pub struct MonitorPipeline {
    feed: Arc<MarketFeed>,
    snapshots: Arc<SnapshotStore>,
    signals: Arc<SignalStore>,
    anomalies: Arc<AnomalyStore>,
    escalator: Arc<Escalator>,
    history: MoodHistory,
    thresholds: RuleThresholds,
    trend_band: f64,
    health: Arc<HealthState>,
}

impl MonitorPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feed: Arc<MarketFeed>,
        snapshots: Arc<SnapshotStore>,
        signals: Arc<SignalStore>,
        anomalies: Arc<AnomalyStore>,
        escalator: Arc<Escalator>,
        history: MoodHistory,
        thresholds: RuleThresholds,
        trend_band: f64,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            feed,
            snapshots,
            signals,
            anomalies,
            escalator,
            history,
            thresholds,
            trend_band,
            health,
        }
    }

    /// Clock-injected cycle body. The dedup window and burst window both
    /// run off `now`, so tests can step time instead of sleeping.
    pub async fn run_cycle_at(&self, now: i64) -> Result<CycleReport> {
        let (sentiment, sentiment_degraded) = self.feed.sentiment().await;
        let (breadth, breadth_degraded) = self.feed.breadth().await;
        let (raw_anomalies, anomalies_degraded) = self.feed.anomalies().await;

        // Classify the intraday stream; rows missing identity fields are
        // skipped without aborting the batch.
        let trade_date = chrono::Utc::now().format("%Y%m%d").to_string();
        let events: Vec<AnomalyEvent> = raw_anomalies
            .iter()
            .filter_map(|raw| classify(raw, &trade_date))
            .collect();
        let skipped = raw_anomalies.len() - events.len();
        if skipped > 0 {
            warn!(skipped, "dropped unclassifiable anomaly rows");
        }
        let new_events = self.anomalies.record_batch_at(&events, now).await?;

        // The snapshot trends against the last *persisted* mood, so the
        // comparison survives restarts.
        let prev_mood = self.history.load();
        let degraded = sentiment_degraded || breadth_degraded;
        let snapshot = build_snapshot(
            &sentiment,
            &breadth,
            prev_mood,
            self.trend_band,
            degraded,
            now,
        );

        let since = now - BURST_WINDOW_SECS;
        let bursts = BurstCounts {
            rockets: self
                .anomalies
                .count_since(crate::types::AnomalyKind::Rocket, since)
                .await?,
            dives: self
                .anomalies
                .count_since(crate::types::AnomalyKind::Dive, since)
                .await?,
        };

        let drafts = engine::evaluate(&snapshot, &bursts, &self.thresholds);

        let mood = snapshot.mood_index;
        let trend = snapshot.trend;
        self.snapshots.publish(snapshot).await;
        if let Err(e) = self.history.save(mood, now) {
            warn!(path = %self.history.path().display(), "failed to save mood history: {e}");
        }

        let mut created = 0u32;
        let mut deduped = 0u32;
        for draft in &drafts {
            let (signal, is_new) = self.signals.create_at(draft, now).await?;
            if is_new {
                created += 1;
                self.escalator.dispatch(&signal);
            } else {
                deduped += 1;
            }
        }

        self.health.record_cycle(now, degraded || anomalies_degraded);

        let report = CycleReport {
            mood_index: mood,
            trend,
            new_events,
            signals_created: created,
            signals_deduped: deduped,
            degraded,
        };
        info!(
            mood = report.mood_index,
            trend = %report.trend,
            new_events = report.new_events,
            signals = report.signals_created,
            deduped = report.signals_deduped,
            degraded = report.degraded,
            "monitor cycle complete"
        );
        Ok(report)
    }
}

#[async_trait::async_trait]
impl PollCycle for MonitorPipeline {
    async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(chrono::Utc::now().timestamp()).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
