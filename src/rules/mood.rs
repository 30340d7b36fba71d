use crate::types::{BreadthStats, MarketSnapshot, SentimentStats, Trend};

/// Share of limit-up attempts that broke back open, in percent.
/// Zero when nothing attempted the board.
pub fn fried_rate(limit_up: u32, fried: u32) -> f64 {
    let attempts = limit_up + fried;
    if attempts == 0 {
        return 0.0;
    }
    fried as f64 / attempts as f64 * 100.0
}

/// Composite mood: 50 base, +1 per 5 limit-ups, −0.5 per fried-rate point,
/// +2 per premium-rate point. Clamped to [0, 100], one decimal.
pub fn mood_index(stats: &SentimentStats) -> f64 {
    let rate = fried_rate(stats.limit_up_count, stats.fried_board_count);
    let raw = 50.0 + stats.limit_up_count as f64 / 5.0 - rate * 0.5 + stats.premium_rate * 2.0;
    (raw.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

/// Compare against the previously persisted mood with a hysteresis band:
/// moves inside `prev ± band` read as flat so jitter never flips the trend.
pub fn classify_trend(mood: f64, prev_mood: f64, band: f64) -> Trend {
    if mood > prev_mood + band {
        Trend::Up
    } else if mood < prev_mood - band {
        Trend::Down
    } else {
        Trend::Flat
    }
}

pub fn build_snapshot(
    sentiment: &SentimentStats,
    breadth: &BreadthStats,
    prev_mood: f64,
    band: f64,
    degraded: bool,
    generated_at: i64,
) -> MarketSnapshot {
    let mood = mood_index(sentiment);
    MarketSnapshot {
        mood_index: mood,
        up_count: breadth.up_count,
        down_count: breadth.down_count,
        flat_count: breadth.flat_count,
        limit_up_count: sentiment.limit_up_count,
        limit_down_count: breadth.limit_down_count,
        fried_board_count: sentiment.fried_board_count,
        fried_rate: round2(fried_rate(
            sentiment.limit_up_count,
            sentiment.fried_board_count,
        )),
        premium_rate: round2(sentiment.premium_rate),
        promotion_rate: round2(sentiment.promotion_rate),
        trend: classify_trend(mood, prev_mood, band),
        degraded,
        generated_at,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(limit_up: u32, fried: u32, premium: f64) -> SentimentStats {
        SentimentStats {
            limit_up_count: limit_up,
            fried_board_count: fried,
            premium_rate: premium,
            promotion_rate: 0.0,
        }
    }

    #[test]
    fn quiet_market_sits_at_baseline() {
        assert_eq!(mood_index(&stats(0, 0, 0.0)), 50.0);
    }

    #[test]
    fn no_attempts_means_zero_fried_rate() {
        assert_eq!(fried_rate(0, 0), 0.0);
    }

    #[test]
    fn mood_clamps_at_one_hundred() {
        assert_eq!(mood_index(&stats(100_000, 0, 0.0)), 100.0);
    }

    #[test]
    fn mood_clamps_at_zero() {
        // 50 + 0 − 100×0.5 + (−10)×2 = −20 before the clamp.
        assert_eq!(mood_index(&stats(0, 50, -10.0)), 0.0);
    }

    #[test]
    fn mood_combines_all_three_terms() {
        // 50 + 60/5 − 25×0.5 + 3×2 = 55.5, fried_rate = 20/80×100 = 25.
        assert_eq!(mood_index(&stats(60, 20, 3.0)), 55.5);
    }

    #[test]
    fn moves_inside_the_band_are_flat() {
        assert_eq!(classify_trend(50.05, 50.0, 0.1), Trend::Flat);
        assert_eq!(classify_trend(49.95, 50.0, 0.1), Trend::Flat);
        // The band boundary itself is still flat.
        assert_eq!(classify_trend(50.1, 50.0, 0.1), Trend::Flat);
    }

    #[test]
    fn moves_beyond_the_band_set_the_trend() {
        assert_eq!(classify_trend(50.2, 50.0, 0.1), Trend::Up);
        assert_eq!(classify_trend(49.8, 50.0, 0.1), Trend::Down);
    }

    #[test]
    fn wider_band_absorbs_bigger_jitter() {
        assert_eq!(classify_trend(50.4, 50.0, 0.5), Trend::Flat);
        assert_eq!(classify_trend(50.6, 50.0, 0.5), Trend::Up);
    }

    #[test]
    fn snapshot_merges_sentiment_and_breadth() {
        let sentiment = stats(58, 12, 1.5);
        let breadth = BreadthStats {
            up_count: 3100,
            down_count: 1800,
            flat_count: 200,
            limit_up_count: 60,
            limit_down_count: 4,
            activity: 71.2,
        };
        let snap = build_snapshot(&sentiment, &breadth, 50.0, 0.1, false, 1_700_000_000);
        assert_eq!(snap.up_count, 3100);
        assert_eq!(snap.limit_up_count, 58);
        assert_eq!(snap.limit_down_count, 4);
        assert_eq!(snap.fried_rate, 17.14);
        assert_eq!(snap.trend, Trend::Up);
        assert!(!snap.degraded);
    }
}
