mod baidu;
mod eastmoney;
mod legu;
mod tonghuashun;

pub use baidu::BaiduProvider;
pub use eastmoney::EastMoneyProvider;
pub use legu::LeguProvider;
pub use tonghuashun::TonghuashunProvider;

use crate::error::ProviderError;
use crate::types::{MetricKind, MetricPayload};

/// One upstream data source. A backend may serve several metrics; the feed
/// layer owns the per-metric failover order. Every failure is transient from
/// the caller's point of view.
#[async_trait::async_trait]
pub trait ProviderBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, kind: MetricKind) -> Result<MetricPayload, ProviderError>;
}

/// Shared client settings for the feed connectors. Upstreams reject requests
/// without a browser user agent.
pub(crate) fn feed_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(
            crate::config::FEED_HTTP_TIMEOUT_SECS,
        ))
        .user_agent(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        )
        .build()
}

/// Numbers arrive as numbers or quoted strings depending on the endpoint.
pub(crate) fn value_as_f64(v: Option<&serde_json::Value>) -> f64 {
    v.and_then(|x| x.as_f64().or_else(|| x.as_str().and_then(|s| s.trim().parse().ok())))
        .unwrap_or(0.0)
}

pub(crate) fn value_as_u32(v: Option<&serde_json::Value>) -> u32 {
    value_as_f64(v) as u32
}

pub(crate) fn value_as_string(v: Option<&serde_json::Value>) -> String {
    v.and_then(|x| {
        x.as_str()
            .map(|s| s.to_string())
            .or_else(|| x.as_f64().map(|n| n.to_string()))
    })
    .unwrap_or_default()
}
