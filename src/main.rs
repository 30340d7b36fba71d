mod analysis;
mod api;
mod config;
mod db;
mod error;
mod escalation;
mod feed;
mod history;
mod notify;
mod pipeline;
mod providers;
mod rules;
mod scheduler;
mod state;
mod types;
mod watchlist;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::ChatCompletionEngine;
use crate::api::health::HealthState;
use crate::api::latency::FetchLatency;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::escalation::Escalator;
use crate::feed::MarketFeed;
use crate::history::MoodHistory;
use crate::notify::FeishuWebhook;
use crate::pipeline::{MonitorPipeline, PollCycle};
use crate::providers::{
    BaiduProvider, EastMoneyProvider, LeguProvider, ProviderBackend, TonghuashunProvider,
};
use crate::rules::engine::RuleThresholds;
use crate::scheduler::Scheduler;
use crate::state::SnapshotStore;
use crate::types::MetricKind;
use crate::watchlist::FileWatchlist;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Providers and per-metric chains ---
    let eastmoney: Arc<dyn ProviderBackend> =
        Arc::new(EastMoneyProvider::new().map_err(client_error)?);
    let tonghuashun: Arc<dyn ProviderBackend> =
        Arc::new(TonghuashunProvider::new().map_err(client_error)?);
    let legu: Arc<dyn ProviderBackend> = Arc::new(LeguProvider::new().map_err(client_error)?);
    let baidu: Arc<dyn ProviderBackend> = Arc::new(BaiduProvider::new().map_err(client_error)?);

    let latency = Arc::new(FetchLatency::new());
    let mut feed = MarketFeed::new(Arc::clone(&latency));
    feed.register(
        MetricKind::Sentiment,
        vec![Arc::clone(&eastmoney), Arc::clone(&tonghuashun)],
    );
    feed.register(
        MetricKind::Breadth,
        vec![Arc::clone(&legu), Arc::clone(&eastmoney)],
    );
    feed.register(MetricKind::Anomalies, vec![Arc::clone(&eastmoney)]);
    feed.register(
        MetricKind::SectorHeatmap,
        vec![Arc::clone(&tonghuashun), Arc::clone(&eastmoney)],
    );
    feed.register(MetricKind::LeaderStocks, vec![Arc::clone(&eastmoney)]);
    feed.register(MetricKind::MacroCalendar, vec![baidu]);
    let feed = Arc::new(feed);

    // --- Stores ---
    let snapshots = SnapshotStore::new();
    let signals = Arc::new(db::SignalStore::new(pool.clone()));
    let anomalies = Arc::new(db::AnomalyStore::new(pool));
    let health = Arc::new(HealthState::new());

    // --- Escalation: notification channels + analysis engine ---
    let mut escalator = Escalator::new(Arc::clone(&signals));
    match &cfg.feishu_webhook_url {
        Some(url) => escalator = escalator.with_channel(Arc::new(FeishuWebhook::new(url)?)),
        None => warn!("FEISHU_WEBHOOK_URL not set — escalated signals will not be notified"),
    }
    match &cfg.llm_api_key {
        Some(key) => {
            escalator = escalator.with_engine(Arc::new(ChatCompletionEngine::new(
                &cfg.llm_api_url,
                key,
                &cfg.llm_model,
            )?));
        }
        None => warn!("LLM_API_KEY not set — escalated signals will not carry deep analysis"),
    }
    info!(
        channels = escalator.channel_count(),
        "escalation pipeline configured"
    );

    // --- Monitor pipeline + scheduler ---
    let pipeline: Arc<dyn PollCycle> = Arc::new(MonitorPipeline::new(
        Arc::clone(&feed),
        Arc::clone(&snapshots),
        Arc::clone(&signals),
        anomalies,
        Arc::new(escalator),
        MoodHistory::new(&cfg.mood_history_path),
        RuleThresholds::from_config(&cfg),
        cfg.trend_band,
        Arc::clone(&health),
    ));
    let scheduler = Arc::new(Scheduler::new(
        pipeline,
        Arc::clone(&health),
        Duration::from_secs(cfg.monitor_interval_secs),
    ));
    if cfg.monitor_autostart {
        scheduler.start().await;
    } else {
        info!("MONITOR_AUTOSTART disabled — start the loop via POST /api/v1/agent/start");
    }

    // --- HTTP API server ---
    let api_state = ApiState {
        feed,
        snapshots,
        signals,
        scheduler,
        watchlist: Arc::new(FileWatchlist::new(&cfg.watchlist_path)),
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

fn client_error(e: crate::error::ProviderError) -> AppError {
    AppError::Config(format!("failed to build feed client: {e}"))
}
