use crate::error::{AppError, Result};
use crate::types::MetricKind;

pub const EASTMONEY_PUSH_URL: &str = "https://push2.eastmoney.com";
pub const EASTMONEY_PUSH_EX_URL: &str = "https://push2ex.eastmoney.com";
pub const EASTMONEY_RANK_URL: &str = "https://emappdata.eastmoney.com";
pub const TONGHUASHUN_DATA_URL: &str = "https://data.10jqka.com.cn";
pub const LEGU_URL: &str = "https://legulegu.com";
pub const BAIDU_FINANCE_URL: &str = "https://finance.pae.baidu.com";

/// How often the monitor loop polls (seconds). Overridable via
/// MONITOR_INTERVAL_SECS.
pub const MONITOR_INTERVAL_SECS: u64 = 60;

/// A (kind, message) pair seen within this window is the same signal.
pub const DEDUP_WINDOW_SECS: i64 = 600;

/// Trailing window for same-direction anomaly burst counting.
pub const BURST_WINDOW_SECS: i64 = 300;

/// Attempts per provider before failing over to the next in the chain.
pub const PROVIDER_RETRY_ATTEMPTS: u32 = 2;

/// Fixed pause between retry attempts (milliseconds).
pub const PROVIDER_RETRY_DELAY_MS: u64 = 1000;

/// Hard timeout for every upstream feed request (seconds).
pub const FEED_HTTP_TIMEOUT_SECS: u64 = 10;

/// Hard timeout for the deep-analysis call (seconds).
pub const ANALYSIS_TIMEOUT_SECS: u64 = 60;

/// Live anomaly scan caps: the unfiltered scan keeps more rows than a
/// watchlist/leaders scan.
pub const SCAN_LIMIT_ALL: usize = 100;
pub const SCAN_LIMIT_FILTERED: usize = 50;

/// Leader stocks below this change percentage are dropped from rankings.
pub const LEADER_MIN_CHANGE_PCT: f64 = 3.0;
pub const LEADER_LIMIT: usize = 30;

/// Default number of signals returned by the signals endpoint.
pub const SIGNALS_DEFAULT_LIMIT: i64 = 10;
pub const SIGNALS_MAX_LIMIT: i64 = 200;

/// Trailing window for the escalated-signal gauge on /health.
pub const HEALTH_ESCALATED_WINDOW_SECS: i64 = 3600;

/// Cache freshness per metric (seconds). Anomalies are near-real-time; the
/// macro calendar barely moves intraday.
pub fn metric_ttl_secs(kind: MetricKind) -> u64 {
    match kind {
        MetricKind::Sentiment => 60,
        MetricKind::Breadth => 300,
        MetricKind::Anomalies => 5,
        MetricKind::SectorHeatmap => 300,
        MetricKind::LeaderStocks => 300,
        MetricKind::MacroCalendar => 3600,
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Poll interval for the monitor loop, seconds (MONITOR_INTERVAL_SECS).
    pub monitor_interval_secs: u64,
    /// Start the monitor loop at boot (MONITOR_AUTOSTART).
    pub monitor_autostart: bool,
    /// Mood above this raises a sentiment_spike warning (MOOD_OVERHEAT_THRESHOLD).
    pub mood_overheat_threshold: f64,
    /// Fried-board rate above this raises a risk_alert critical (FRIED_RATE_RISK_THRESHOLD).
    pub fried_rate_risk_threshold: f64,
    /// Same-direction anomalies above this inside the burst window raise an
    /// anomaly_burst (BURST_THRESHOLD).
    pub burst_threshold: i64,
    /// Hysteresis band for the trend comparison (TREND_BAND, 0.1–0.5).
    pub trend_band: f64,
    /// Mood history file carried across restarts (MOOD_HISTORY_PATH).
    pub mood_history_path: String,
    /// Watchlist JSON maintained by the external CRUD (WATCHLIST_PATH).
    pub watchlist_path: String,
    /// Feishu bot webhook; notifications are skipped when unset (FEISHU_WEBHOOK_URL).
    pub feishu_webhook_url: Option<String>,
    /// OpenAI-compatible endpoint base for deep analysis (LLM_API_URL).
    pub llm_api_url: String,
    /// Analysis is skipped when unset (LLM_API_KEY).
    pub llm_api_key: Option<String>,
    pub llm_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "sentinel.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            monitor_interval_secs: std::env::var("MONITOR_INTERVAL_SECS")
                .unwrap_or_else(|_| MONITOR_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(MONITOR_INTERVAL_SECS),
            monitor_autostart: std::env::var("MONITOR_AUTOSTART")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            mood_overheat_threshold: std::env::var("MOOD_OVERHEAT_THRESHOLD")
                .unwrap_or_else(|_| "80".to_string())
                .parse::<f64>()
                .unwrap_or(80.0),
            fried_rate_risk_threshold: std::env::var("FRIED_RATE_RISK_THRESHOLD")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<f64>()
                .unwrap_or(30.0),
            burst_threshold: std::env::var("BURST_THRESHOLD")
                .unwrap_or_else(|_| "5".to_string())
                .parse::<i64>()
                .unwrap_or(5),
            trend_band: std::env::var("TREND_BAND")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse::<f64>()
                .map(|b| b.clamp(0.1, 0.5))
                .unwrap_or(0.1),
            mood_history_path: std::env::var("MOOD_HISTORY_PATH")
                .unwrap_or_else(|_| "data/mood_history.json".to_string()),
            watchlist_path: std::env::var("WATCHLIST_PATH")
                .unwrap_or_else(|_| "data/watchlist.json".to_string()),
            feishu_webhook_url: std::env::var("FEISHU_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            llm_api_url: std::env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_api_key: std::env::var("LLM_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        })
    }
}
