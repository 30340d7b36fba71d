use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{FetchLatency, LatencySummary};
use crate::config::{
    HEALTH_ESCALATED_WINDOW_SECS, SCAN_LIMIT_ALL, SCAN_LIMIT_FILTERED, SIGNALS_DEFAULT_LIMIT,
};
use crate::db::SignalStore;
use crate::error::AppError;
use crate::feed::MarketFeed;
use crate::rules::classifier::classify;
use crate::scheduler::Scheduler;
use crate::state::SnapshotStore;
use crate::types::{
    AnomalyEvent, FilterMode, LeaderRow, MacroEvent, MarketSnapshot, SectorRow, Signal,
};
use crate::watchlist::WatchlistLookup;

#[derive(Clone)]
pub struct ApiState {
    pub feed: Arc<MarketFeed>,
    pub snapshots: Arc<SnapshotStore>,
    pub signals: Arc<SignalStore>,
    pub scheduler: Arc<Scheduler>,
    pub watchlist: Arc<dyn WatchlistLookup>,
    pub health: Arc<HealthState>,
    pub latency: Arc<FetchLatency>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/market/snapshot", get(get_snapshot))
        .route("/api/v1/market/heatmap", get(get_heatmap))
        .route("/api/v1/market/leaders", get(get_leaders))
        .route("/api/v1/market/calendar", get(get_calendar))
        .route("/api/v1/anomaly/scan", get(get_anomaly_scan))
        .route("/api/v1/agent/signals", get(get_signals))
        .route("/api/v1/agent/start", post(post_start))
        .route("/api/v1/agent/stop", post(post_stop))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ScanQuery {
    pub filter: Option<String>,
}

#[derive(Deserialize)]
pub struct SignalsQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HeatmapResponse {
    pub sectors: Vec<SectorRow>,
    pub degraded: bool,
}

#[derive(Serialize)]
pub struct LeadersResponse {
    pub leaders: Vec<LeaderRow>,
    pub degraded: bool,
}

#[derive(Serialize)]
pub struct CalendarResponse {
    pub events: Vec<MacroEvent>,
    pub degraded: bool,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub filter: FilterMode,
    pub events: Vec<AnomalyEvent>,
    pub degraded: bool,
}

#[derive(Serialize)]
pub struct SchedulerResponse {
    pub running: bool,
    pub changed: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub scheduler_running: bool,
    pub last_cycle_at: i64,
    pub cycles_completed: u64,
    pub cycle_errors: u64,
    pub last_cycle_degraded: bool,
    /// Warning/critical signals created in the last hour.
    pub escalated_last_hour: i64,
}

#[derive(Serialize)]
pub struct MetricLatency {
    pub metric: String,
    #[serde(flatten)]
    pub summary: LatencySummary,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_snapshot(State(state): State<ApiState>) -> Result<Json<MarketSnapshot>, AppError> {
    let snapshot = state.snapshots.latest().await.ok_or(AppError::NotReady)?;
    Ok(Json((*snapshot).clone()))
}

async fn get_heatmap(State(state): State<ApiState>) -> Json<HeatmapResponse> {
    let (sectors, degraded) = state.feed.heatmap().await;
    Json(HeatmapResponse { sectors, degraded })
}

async fn get_leaders(State(state): State<ApiState>) -> Json<LeadersResponse> {
    let (leaders, degraded) = state.feed.leaders().await;
    Json(LeadersResponse { leaders, degraded })
}

async fn get_calendar(State(state): State<ApiState>) -> Json<CalendarResponse> {
    let (events, degraded) = state.feed.calendar().await;
    Json(CalendarResponse { events, degraded })
}

/// Live scan: classify the current change stream on demand. Nothing here is
/// persisted — only the monitor cycle writes anomaly history.
async fn get_anomaly_scan(
    State(state): State<ApiState>,
    Query(params): Query<ScanQuery>,
) -> Json<ScanResponse> {
    let filter = params
        .filter
        .as_deref()
        .map(FilterMode::parse)
        .unwrap_or_default();

    let (rows, degraded) = state.feed.anomalies().await;
    let trade_date = chrono::Utc::now().format("%Y%m%d").to_string();

    let keep: Option<HashSet<String>> = match filter {
        FilterMode::All => None,
        FilterMode::Watchlist => Some(state.watchlist.codes()),
        FilterMode::Leaders => {
            let (leaders, _) = state.feed.leaders().await;
            Some(leaders.into_iter().map(|l| l.code).collect())
        }
    };

    let mut events: Vec<AnomalyEvent> = rows
        .iter()
        .filter_map(|raw| classify(raw, &trade_date))
        .filter(|e| keep.as_ref().map_or(true, |codes| codes.contains(&e.code)))
        .collect();

    events.sort_by(|a, b| b.event_time.cmp(&a.event_time));
    let cap = match filter {
        FilterMode::All => SCAN_LIMIT_ALL,
        _ => SCAN_LIMIT_FILTERED,
    };
    events.truncate(cap);

    Json(ScanResponse {
        filter,
        events,
        degraded,
    })
}

async fn get_signals(
    State(state): State<ApiState>,
    Query(params): Query<SignalsQuery>,
) -> Result<Json<Vec<Signal>>, AppError> {
    let limit = params.limit.unwrap_or(SIGNALS_DEFAULT_LIMIT);
    let signals = state.signals.latest(limit).await?;
    Ok(Json(signals))
}

async fn post_start(State(state): State<ApiState>) -> Json<SchedulerResponse> {
    let changed = state.scheduler.start().await;
    Json(SchedulerResponse {
        running: true,
        changed,
    })
}

async fn post_stop(State(state): State<ApiState>) -> Json<SchedulerResponse> {
    let changed = state.scheduler.stop().await;
    Json(SchedulerResponse {
        running: false,
        changed,
    })
}

async fn get_health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, AppError> {
    let since = chrono::Utc::now().timestamp() - HEALTH_ESCALATED_WINDOW_SECS;
    let escalated_last_hour = state.signals.escalated_count_since(since).await?;
    Ok(Json(HealthResponse {
        scheduler_running: state.health.scheduler_running(),
        last_cycle_at: state.health.last_cycle_at(),
        cycles_completed: state.health.cycles_completed(),
        cycle_errors: state.health.cycle_errors(),
        last_cycle_degraded: state.health.last_cycle_degraded(),
        escalated_last_hour,
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<Vec<MetricLatency>> {
    let summaries = state
        .latency
        .summaries()
        .into_iter()
        .map(|(kind, summary)| MetricLatency {
            metric: kind.as_str().to_string(),
            summary,
        })
        .collect();
    Json(summaries)
}
