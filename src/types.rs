use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Metrics served by the feed layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Limit-up / fried-board pools and prior-day pool performance.
    Sentiment,
    /// Advancing / declining / flat counts and limit counts.
    Breadth,
    /// Intraday per-stock change stream (rockets, dives, big orders).
    Anomalies,
    /// Sector / industry board rankings.
    SectorHeatmap,
    /// Most-watched leader stocks.
    LeaderStocks,
    /// Upcoming macro-economic events.
    MacroCalendar,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Sentiment => "sentiment",
            MetricKind::Breadth => "breadth",
            MetricKind::Anomalies => "anomalies",
            MetricKind::SectorHeatmap => "sector_heatmap",
            MetricKind::LeaderStocks => "leader_stocks",
            MetricKind::MacroCalendar => "macro_calendar",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metric payloads
// ---------------------------------------------------------------------------

/// Limit-up pool statistics for the current session plus the prior-day
/// pool's performance today. Counts are pool sizes, rates are percentages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentStats {
    pub limit_up_count: u32,
    /// Stocks that touched limit-up and fell back open ("fried boards").
    pub fried_board_count: u32,
    /// Average gain today of yesterday's limit-up pool, in percent.
    pub premium_rate: f64,
    /// Share of yesterday's limit-up pool still up more than 9.5%, in percent.
    pub promotion_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreadthStats {
    pub up_count: u32,
    pub down_count: u32,
    pub flat_count: u32,
    pub limit_up_count: u32,
    pub limit_down_count: u32,
    /// Source-computed activity gauge, in percent.
    pub activity: f64,
}

/// One row of the intraday change stream, as delivered by the upstream.
/// `raw_label` is the source's category name (e.g. "火箭发射"); `info` is the
/// source's comma-delimited detail record whose layout varies by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAnomaly {
    pub code: String,
    pub name: String,
    pub raw_label: String,
    pub info: String,
    /// Source event time, HH:MM:SS.
    pub event_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorRow {
    pub name: String,
    pub change_pct: f64,
    /// Total traded amount for the board, in yuan. Zero when the backend omits it.
    pub turnover: f64,
    pub leader: String,
    pub leader_change_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderRow {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub change_pct: f64,
    /// Popularity rank, 1 = hottest.
    pub rank: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroEvent {
    pub date: String,
    pub time: String,
    pub region: String,
    pub event: String,
    pub actual: String,
    pub forecast: String,
    pub previous: String,
    /// 1 = routine, 3 = market-moving.
    pub importance: u8,
}

/// What a provider returns for one metric fetch. Every variant has an empty
/// form so total acquisition failure can degrade to "no data" instead of
/// erroring past the feed boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MetricPayload {
    Sentiment(SentimentStats),
    Breadth(BreadthStats),
    Anomalies(Vec<RawAnomaly>),
    SectorHeatmap(Vec<SectorRow>),
    LeaderStocks(Vec<LeaderRow>),
    MacroCalendar(Vec<MacroEvent>),
}

impl MetricPayload {
    pub fn empty(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Sentiment => MetricPayload::Sentiment(SentimentStats::default()),
            MetricKind::Breadth => MetricPayload::Breadth(BreadthStats::default()),
            MetricKind::Anomalies => MetricPayload::Anomalies(Vec::new()),
            MetricKind::SectorHeatmap => MetricPayload::SectorHeatmap(Vec::new()),
            MetricKind::LeaderStocks => MetricPayload::LeaderStocks(Vec::new()),
            MetricKind::MacroCalendar => MetricPayload::MacroCalendar(Vec::new()),
        }
    }
}

/// A metric value as served to consumers. `degraded` is true when the value
/// came from an expired cache entry or is the empty fallback.
#[derive(Debug, Clone)]
pub struct MetricReading {
    pub payload: MetricPayload,
    pub degraded: bool,
}

// ---------------------------------------------------------------------------
// Market snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One poll's composite view of the market. Immutable once built; the
/// snapshot store swaps the previous one out atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Composite mood, clamped to [0, 100].
    pub mood_index: f64,
    pub up_count: u32,
    pub down_count: u32,
    pub flat_count: u32,
    pub limit_up_count: u32,
    pub limit_down_count: u32,
    pub fried_board_count: u32,
    /// fried / (limit_up + fried), in percent.
    pub fried_rate: f64,
    pub premium_rate: f64,
    pub promotion_rate: f64,
    pub trend: Trend,
    /// True when any contributing metric was served stale or empty.
    pub degraded: bool,
    /// Epoch seconds.
    pub generated_at: i64,
}

// ---------------------------------------------------------------------------
// Anomaly classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Rocket,
    Dive,
    BigOrderBuy,
    BigOrderSell,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::Rocket => "rocket",
            AnomalyKind::Dive => "dive",
            AnomalyKind::BigOrderBuy => "big_order_buy",
            AnomalyKind::BigOrderSell => "big_order_sell",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            AnomalyKind::Rocket => "🚀",
            AnomalyKind::Dive => "☢️",
            AnomalyKind::BigOrderBuy => "💰",
            AnomalyKind::BigOrderSell => "💸",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified market event, ready for persistence and the scan API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub code: String,
    pub name: String,
    pub kind: AnomalyKind,
    pub raw_label: String,
    pub severity: Severity,
    pub price: f64,
    pub change_pct: f64,
    pub amount: f64,
    pub message: String,
    /// Source event time, HH:MM:SS.
    pub event_time: String,
    /// Session date, YYYYMMDD. With event_time/code/raw_label this forms the
    /// natural key that de-overlaps consecutive polls of the rolling stream.
    pub trade_date: String,
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalLevel {
    Info,
    Warning,
    Critical,
}

impl SignalLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalLevel::Info => "info",
            SignalLevel::Warning => "warning",
            SignalLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(SignalLevel::Info),
            "warning" => Some(SignalLevel::Warning),
            "critical" => Some(SignalLevel::Critical),
            _ => None,
        }
    }

    /// Only warning and critical signals are escalated.
    pub fn escalates(&self) -> bool {
        matches!(self, SignalLevel::Warning | SignalLevel::Critical)
    }
}

impl std::fmt::Display for SignalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted alerting unit. `kind` is an open set; the rule engine emits
/// sentiment_spike / risk_alert / recovery_sign / anomaly_burst.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: i64,
    pub kind: String,
    pub level: SignalLevel,
    pub message: String,
    /// Deep-analysis text, attached at most once by the escalation pipeline.
    pub analysis: Option<String>,
    pub metadata: serde_json::Value,
    /// Epoch seconds.
    pub created_at: i64,
}

/// What the rule engine hands to the signal store. Messages are stable
/// threshold-keyed templates so the (kind, message) dedup holds while the
/// underlying reading drifts; the reading itself goes in `metadata`.
#[derive(Debug, Clone)]
pub struct SignalDraft {
    pub kind: String,
    pub level: SignalLevel,
    pub message: String,
    pub metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Anomaly scan filtering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Watchlist,
    Leaders,
}

impl FilterMode {
    /// Lenient query-string parsing: unknown values fall back to `All`.
    pub fn parse(s: &str) -> Self {
        match s {
            "watchlist" => FilterMode::Watchlist,
            "leaders" => FilterMode::Leaders,
            _ => FilterMode::All,
        }
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterMode::All => "all",
            FilterMode::Watchlist => "watchlist",
            FilterMode::Leaders => "leaders",
        };
        write!(f, "{s}")
    }
}
