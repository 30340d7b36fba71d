use serde_json::json;

use crate::config::{BURST_WINDOW_SECS, Config};
use crate::types::{MarketSnapshot, SignalDraft, SignalLevel};

/// Signal kinds emitted by the rule engine. The store accepts any string;
/// these are the built-in policies.
pub mod kind {
    pub const SENTIMENT_SPIKE: &str = "sentiment_spike";
    pub const RISK_ALERT: &str = "risk_alert";
    pub const RECOVERY_SIGN: &str = "recovery_sign";
    pub const ANOMALY_BURST: &str = "anomaly_burst";
}

#[derive(Debug, Clone, Copy)]
pub struct RuleThresholds {
    pub mood_overheat: f64,
    pub fried_rate_risk: f64,
    pub burst: i64,
}

impl RuleThresholds {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            mood_overheat: cfg.mood_overheat_threshold,
            fried_rate_risk: cfg.fried_rate_risk_threshold,
            burst: cfg.burst_threshold,
        }
    }
}

/// Same-direction anomaly counts over the trailing burst window.
#[derive(Debug, Clone, Copy, Default)]
pub struct BurstCounts {
    pub rockets: i64,
    pub dives: i64,
}

/// Evaluate all rules against one snapshot. Pure: the caller persists and
/// escalates whatever comes back. Messages are stable templates keyed on the
/// threshold crossed — the instantaneous readings ride along in metadata —
/// so the (kind, message) dedup holds while a reading drifts within the
/// window.
pub fn evaluate(
    snapshot: &MarketSnapshot,
    bursts: &BurstCounts,
    th: &RuleThresholds,
) -> Vec<SignalDraft> {
    let mut drafts = Vec::new();

    if snapshot.mood_index > th.mood_overheat {
        drafts.push(SignalDraft {
            kind: kind::SENTIMENT_SPIKE.to_string(),
            level: SignalLevel::Warning,
            message: format!("Market overheating: mood index above {:.0}", th.mood_overheat),
            metadata: json!({
                "mood_index": snapshot.mood_index,
                "limit_up_count": snapshot.limit_up_count,
                "fried_rate": snapshot.fried_rate,
                "premium_rate": snapshot.premium_rate,
                "trend": snapshot.trend,
            }),
        });
    }

    if snapshot.fried_rate > th.fried_rate_risk {
        drafts.push(SignalDraft {
            kind: kind::RISK_ALERT.to_string(),
            level: SignalLevel::Critical,
            message: format!(
                "High risk: fried-board rate above {:.0}%",
                th.fried_rate_risk
            ),
            metadata: json!({
                "fried_rate": snapshot.fried_rate,
                "fried_board_count": snapshot.fried_board_count,
                "limit_up_count": snapshot.limit_up_count,
                "mood_index": snapshot.mood_index,
            }),
        });
    }

    if snapshot.trend == crate::types::Trend::Up && snapshot.mood_index < 50.0 {
        drafts.push(SignalDraft {
            kind: kind::RECOVERY_SIGN.to_string(),
            level: SignalLevel::Info,
            message: "Market recovering: trend turned up from low mood".to_string(),
            metadata: json!({
                "mood_index": snapshot.mood_index,
                "trend": snapshot.trend,
            }),
        });
    }

    if bursts.rockets > th.burst {
        drafts.push(SignalDraft {
            kind: kind::ANOMALY_BURST.to_string(),
            level: SignalLevel::Info,
            message: "Rocket burst: unusually many surges in the last 5 minutes".to_string(),
            metadata: json!({
                "direction": "rocket",
                "count": bursts.rockets,
                "window_secs": BURST_WINDOW_SECS,
            }),
        });
    }

    if bursts.dives > th.burst {
        drafts.push(SignalDraft {
            kind: kind::ANOMALY_BURST.to_string(),
            level: SignalLevel::Warning,
            message: "Dive burst: unusually many plunges in the last 5 minutes".to_string(),
            metadata: json!({
                "direction": "dive",
                "count": bursts.dives,
                "window_secs": BURST_WINDOW_SECS,
            }),
        });
    }

    drafts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Trend;

    fn thresholds() -> RuleThresholds {
        RuleThresholds {
            mood_overheat: 80.0,
            fried_rate_risk: 30.0,
            burst: 5,
        }
    }

    fn snapshot(mood: f64, fried_rate: f64, trend: Trend) -> MarketSnapshot {
        MarketSnapshot {
            mood_index: mood,
            up_count: 2000,
            down_count: 2000,
            flat_count: 300,
            limit_up_count: 40,
            limit_down_count: 5,
            fried_board_count: 10,
            fried_rate,
            premium_rate: 1.0,
            promotion_rate: 40.0,
            trend,
            degraded: false,
            generated_at: 1_700_000_000,
        }
    }

    #[test]
    fn calm_market_raises_nothing() {
        let drafts = evaluate(
            &snapshot(55.0, 10.0, Trend::Flat),
            &BurstCounts::default(),
            &thresholds(),
        );
        assert!(drafts.is_empty());
    }

    #[test]
    fn overheated_mood_raises_a_warning() {
        let drafts = evaluate(
            &snapshot(85.0, 10.0, Trend::Up),
            &BurstCounts::default(),
            &thresholds(),
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, kind::SENTIMENT_SPIKE);
        assert_eq!(drafts[0].level, SignalLevel::Warning);
        assert_eq!(drafts[0].metadata["mood_index"], 85.0);
    }

    #[test]
    fn message_is_stable_while_the_reading_drifts() {
        let th = thresholds();
        let a = evaluate(&snapshot(85.0, 10.0, Trend::Up), &BurstCounts::default(), &th);
        let b = evaluate(&snapshot(86.0, 10.0, Trend::Up), &BurstCounts::default(), &th);
        assert_eq!(a[0].message, b[0].message);
        assert_ne!(a[0].metadata["mood_index"], b[0].metadata["mood_index"]);
    }

    #[test]
    fn fried_rate_over_threshold_is_critical() {
        let drafts = evaluate(
            &snapshot(60.0, 35.0, Trend::Down),
            &BurstCounts::default(),
            &thresholds(),
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, kind::RISK_ALERT);
        assert_eq!(drafts[0].level, SignalLevel::Critical);
    }

    #[test]
    fn upturn_from_low_mood_is_a_recovery_sign() {
        let drafts = evaluate(
            &snapshot(45.0, 10.0, Trend::Up),
            &BurstCounts::default(),
            &thresholds(),
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, kind::RECOVERY_SIGN);
        assert_eq!(drafts[0].level, SignalLevel::Info);
    }

    #[test]
    fn upturn_from_high_mood_is_not_a_recovery() {
        let drafts = evaluate(
            &snapshot(65.0, 10.0, Trend::Up),
            &BurstCounts::default(),
            &thresholds(),
        );
        assert!(drafts.is_empty());
    }

    #[test]
    fn burst_needs_strictly_more_than_threshold() {
        let th = thresholds();
        let snap = snapshot(55.0, 10.0, Trend::Flat);

        let at_threshold = evaluate(&snap, &BurstCounts { rockets: 5, dives: 0 }, &th);
        assert!(at_threshold.is_empty());

        let over = evaluate(&snap, &BurstCounts { rockets: 6, dives: 0 }, &th);
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].kind, kind::ANOMALY_BURST);
        assert_eq!(over[0].level, SignalLevel::Info);
        assert_eq!(over[0].metadata["count"], 6);
    }

    #[test]
    fn dive_burst_escalates_to_warning() {
        let drafts = evaluate(
            &snapshot(55.0, 10.0, Trend::Flat),
            &BurstCounts { rockets: 0, dives: 7 },
            &thresholds(),
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].level, SignalLevel::Warning);
        assert_eq!(drafts[0].metadata["direction"], "dive");
    }

    #[test]
    fn simultaneous_conditions_raise_multiple_drafts() {
        let drafts = evaluate(
            &snapshot(85.0, 35.0, Trend::Up),
            &BurstCounts { rockets: 6, dives: 6 },
            &thresholds(),
        );
        let kinds: Vec<&str> = drafts.iter().map(|d| d.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                kind::SENTIMENT_SPIKE,
                kind::RISK_ALERT,
                kind::ANOMALY_BURST,
                kind::ANOMALY_BURST,
            ]
        );
    }
}
