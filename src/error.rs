use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Failure of a single provider backend while serving one metric fetch.
/// Always treated as transient: the feed layer retries, fails over to the
/// next backend in the chain, and finally degrades to stale or empty data.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected payload shape: {0}")]
    Shape(&'static str),

    #[error("{backend} does not serve {metric}")]
    Unsupported {
        backend: &'static str,
        metric: &'static str,
    },
}

/// Failure of the deep-analysis engine for one signal. Logged, never retried.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("analysis response missing content")]
    EmptyResponse,

    #[error("analysis engine not configured")]
    NotConfigured,
}

/// Failure to deliver one notification. Logged, never blocks the pipeline.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("no market snapshot available yet")]
    NotReady,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
